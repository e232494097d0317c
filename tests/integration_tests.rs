//! Integration tests for tokio_formdata

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio_formdata::*;

fn chunked(data: Vec<u8>, size: usize) -> impl Stream<Item = std::io::Result<Bytes>> {
    let chunks: Vec<_> = data
        .chunks(size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

async fn collect<S, E>(reader: Reader<S>) -> Result<Vec<(PartInfo, Bytes)>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    let parts = Arc::new(Mutex::new(Vec::new()));
    let sink = parts.clone();
    reader
        .for_each_part(move |info, body| {
            let sink = sink.clone();
            async move {
                let data = body.bytes().await?;
                sink.lock().unwrap().push((info, data));
                Ok::<_, Error>(())
            }
        })
        .await?;
    let parts = parts.lock().unwrap().clone();
    Ok(parts)
}

#[tokio::test]
async fn test_end_to_end_multipart_form() {
    // Write a form, then read it back
    let mut buffer = Vec::new();
    let boundary = "test-boundary-12345";

    {
        let mut writer = multipart::Writer::new(&mut buffer).unwrap();
        writer.set_boundary(boundary).unwrap();

        writer.write_field("username", "john_doe").await.unwrap();

        let mut file_writer = writer.create_form_file("upload", "test.txt").await.unwrap();
        file_writer
            .write_all(b"This is test file content")
            .await
            .unwrap();

        writer.close().await.unwrap();
    }

    let reader = Reader::from_reader(Cursor::new(buffer), &Boundary::new(boundary).unwrap());
    let parts = collect(reader).await.unwrap();

    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].0.name, "username");
    assert_eq!(parts[0].0.content_type, "text/plain");
    assert_eq!(parts[0].1, Bytes::from_static(b"john_doe"));

    assert_eq!(parts[1].0.name, "upload");
    assert_eq!(parts[1].0.filename.as_deref(), Some("test.txt"));
    assert_eq!(parts[1].0.content_type, "application/octet-stream");
    assert_eq!(parts[1].1, Bytes::from_static(b"This is test file content"));
}

#[tokio::test]
async fn test_scenario_single_field() {
    let body = b"--X\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nhello\r\n--X--\r\n".to_vec();
    let reader = Reader::from_content_type(chunked(body, 4), "multipart/form-data; boundary=X")
        .unwrap();
    let parts = collect(reader).await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].0.name, "a");
    assert_eq!(parts[0].0.content_type, "text/plain");
    assert_eq!(parts[0].0.filename, None);
    assert_eq!(parts[0].1, Bytes::from_static(b"hello"));
}

#[tokio::test]
async fn test_scenario_file_descriptor() {
    let body = b"--X\r\n\
Content-Disposition: form-data; name=\"f\"; filename=\"x.txt\"\r\n\
Content-Type: text/plain\r\n\
\r\n\
data\r\n\
--X--\r\n"
        .to_vec();
    let reader = Reader::from_content_type(chunked(body, 9), "multipart/form-data; boundary=X")
        .unwrap();
    let parts = collect(reader).await.unwrap();
    let info = &parts[0].0;
    assert_eq!(info.filename.as_deref(), Some("x.txt"));
    assert_eq!(info.content_type, "text/plain");
    assert!(!info.params.contains_key("name"));
    assert!(!info.params.contains_key("filename"));
}

#[tokio::test]
async fn test_scenario_missing_name() {
    let body = b"--X\r\n\
Content-Disposition: form-data; name=\"ok\"\r\n\r\nfirst\r\n\
--X\r\n\
Content-Disposition: form-data; filename=\"x.txt\"\r\n\r\nsecond\r\n\
--X--\r\n"
        .to_vec();
    let reader = Reader::from_content_type(chunked(body, 5), "multipart/form-data; boundary=X")
        .unwrap();

    let names = Arc::new(Mutex::new(Vec::new()));
    let sink = names.clone();
    let result = reader
        .for_each_part(move |info, body| {
            let sink = sink.clone();
            async move {
                body.bytes().await?;
                sink.lock().unwrap().push(info.name);
                Ok::<_, Error>(())
            }
        })
        .await;

    assert!(matches!(result, Err(Error::PartHeader(ref m)) if m == "name parameter not found"));
    // The part before the failure stays delivered
    assert_eq!(*names.lock().unwrap(), vec!["ok"]);
}

#[test]
fn test_scenario_boundary_ending_in_space() {
    let result = parse_boundary("multipart/form-data; boundary=\"abc \"");
    assert!(matches!(result, Err(Error::BoundaryFormat(_))));
}

#[test]
fn test_missing_boundary_is_always_not_found() {
    for value in [
        "multipart/form-data",
        "multipart/form-data;",
        "multipart/form-data; charset=utf-8",
        "multipart/form-data; name=\"boundary=x\"",
        "Content-Type: multipart/form-data; a=b; c=\"d\"",
    ] {
        match parse_boundary(value) {
            Err(Error::BoundaryFormat(msg)) => {
                assert_eq!(msg, "boundary parameter not found", "{}", value)
            }
            other => panic!("{}: {:?}", value, other),
        }
    }
}

#[tokio::test]
async fn test_chunking_invariance() {
    let mut buffer = Vec::new();
    let mut writer = multipart::Writer::new(&mut buffer).unwrap();
    writer.set_boundary("chunky").unwrap();
    writer.write_field("a", "\r\n--chunk\r\n-chunky\r\n--chunkX").await.unwrap();
    writer.write_field("b", "").await.unwrap();
    let mut file = writer.create_form_file("c", "c.bin").await.unwrap();
    file.write_all(&[b'\r'; 40]).await.unwrap();
    writer.close().await.unwrap();

    let expected = Form::parse("multipart/form-data; boundary=chunky", &buffer).unwrap();
    assert_eq!(
        expected.value("a"),
        Some("\r\n--chunk\r\n-chunky\r\n--chunkX")
    );
    assert_eq!(expected.value("b"), Some(""));
    assert_eq!(&expected.field("c").unwrap().data[..], &[b'\r'; 40][..]);

    for size in [1, 2, 3, 7, 13, 64, buffer.len()] {
        let reader = Reader::new(chunked(buffer.clone(), size), &Boundary::new("chunky").unwrap());
        let parts = collect(reader).await.unwrap();
        let got: Vec<_> = parts.into_iter().map(|(i, d)| Field { info: i, data: d }).collect();
        assert_eq!(got, expected.fields(), "chunk size {}", size);
    }
}

#[tokio::test]
async fn test_mock_reader_split_delimiter() {
    let mock = tokio_test::io::Builder::new()
        .read(b"--b\r\nContent-Disposition: form-data; name=x\r\n\r\nbody\r")
        .read(b"\n-")
        .read(b"-")
        .read(b"b--")
        .build();
    let reader = Reader::from_reader(mock, &Boundary::new("b").unwrap());
    let parts = collect(reader).await.unwrap();
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].1, Bytes::from_static(b"body"));
}

#[tokio::test]
async fn test_backpressure_bounds_read_ahead() {
    const CHUNKS: usize = 200;
    const CAPACITY: usize = 2;

    let mut body = b"--bp\r\nContent-Disposition: form-data; name=big\r\n\r\n".to_vec();
    let header_len = body.len();
    body.extend(std::iter::repeat(b'z').take(CHUNKS * 100));
    body.extend_from_slice(b"\r\n--bp--\r\n");

    let pulled = Arc::new(AtomicUsize::new(0));
    let counter = pulled.clone();
    let mut chunks = vec![Bytes::copy_from_slice(&body[..header_len])];
    chunks.extend(
        body[header_len..]
            .chunks(100)
            .map(Bytes::copy_from_slice),
    );
    let source = stream::iter(chunks)
        .inspect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .map(Ok::<_, std::io::Error>);

    let limits = Limits::default().with_body_capacity(CAPACITY);
    let reader = Reader::with_limits(source, &Boundary::new("bp").unwrap(), limits);

    let observed = pulled.clone();
    reader
        .for_each_part(move |_, mut body| {
            let observed = observed.clone();
            async move {
                let mut received = 0;
                let mut total = 0;
                while let Some(chunk) = body.chunk().await? {
                    received += 1;
                    total += chunk.len();
                    let ahead = observed.load(Ordering::SeqCst).saturating_sub(received);
                    assert!(ahead <= CAPACITY + 4, "read {} chunks ahead", ahead);
                    tokio::task::yield_now().await;
                }
                assert_eq!(total, CHUNKS * 100);
                Ok::<_, Error>(())
            }
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_early_drop_then_continue() {
    let mut buffer = Vec::new();
    let mut writer = multipart::Writer::new(&mut buffer).unwrap();
    writer.set_boundary("drop").unwrap();
    writer.write_field("skip", &"s".repeat(100_000)).await.unwrap();
    writer.write_field("keep", "kept").await.unwrap();
    writer.close().await.unwrap();

    let limits = Limits::default().with_body_capacity(1);
    let reader = Reader::with_limits(chunked(buffer, 512), &Boundary::new("drop").unwrap(), limits);

    let kept = Arc::new(Mutex::new(None));
    let sink = kept.clone();
    reader
        .for_each_part(move |info, mut body| {
            let sink = sink.clone();
            async move {
                if info.name == "skip" {
                    // take one chunk, abandon the rest
                    body.chunk().await?;
                    return Ok::<_, Error>(());
                }
                *sink.lock().unwrap() = Some(body.bytes().await?);
                Ok::<_, Error>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(*kept.lock().unwrap(), Some(Bytes::from_static(b"kept")));
}

#[tokio::test]
async fn test_large_multipart_data() {
    let mut buffer = Vec::new();
    let boundary = "large-data-boundary";
    let large_content = "A".repeat(1024 * 1024);

    {
        let mut writer = multipart::Writer::new(&mut buffer).unwrap();
        writer.set_boundary(boundary).unwrap();
        writer.write_field("large_field", &large_content).await.unwrap();
        writer.close().await.unwrap();
    }

    let reader = Reader::from_reader(Cursor::new(buffer), &Boundary::new(boundary).unwrap());
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = sizes.clone();
    reader
        .for_each_part(move |_, mut body| {
            let sink = sink.clone();
            async move {
                let mut size = 0;
                while let Some(chunk) = body.chunk().await? {
                    size += chunk.len();
                }
                sink.lock().unwrap().push(size);
                Ok::<_, Error>(())
            }
        })
        .await
        .unwrap();

    assert_eq!(*sizes.lock().unwrap(), vec![1024 * 1024]);
}

#[tokio::test]
async fn test_event_stream_order() {
    let body = b"--e\r\n\
Content-Disposition: form-data; name=one\r\n\r\n1\r\n\
--e\r\n\
Content-Disposition: form-data; name=two\r\n\r\n2\r\n\
--e--"
        .to_vec();
    let reader = Reader::new(chunked(body, 3), &Boundary::new("e").unwrap());
    let events: Vec<Event> = reader.map(|e| e.unwrap()).collect().await;

    let names: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::Header(info) => Some(info.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["one", "two"]);
    assert_eq!(events.last(), Some(&Event::End));
}

#[tokio::test]
async fn test_concurrent_readers() {
    use tokio::task::JoinSet;

    let test_data = {
        let mut buffer = Vec::new();
        let mut writer = multipart::Writer::new(&mut buffer).unwrap();
        writer.set_boundary("concurrent-boundary").unwrap();
        for i in 0..10 {
            writer
                .write_field(&format!("field{}", i), &format!("data{}", i))
                .await
                .unwrap();
        }
        writer.close().await.unwrap();
        buffer
    };

    let mut set = JoinSet::new();
    for _ in 0..10 {
        let data = test_data.clone();
        set.spawn(async move {
            let reader = Reader::new(chunked(data, 17), &Boundary::new("concurrent-boundary").unwrap());
            Form::read(reader).await.map(|form| form.len())
        });
    }

    while let Some(result) = set.join_next().await {
        assert_eq!(result.unwrap().unwrap(), 10);
    }
}

#[tokio::test]
async fn test_bare_lf_is_not_a_line_break() {
    let body = b"--X\nContent-Disposition: form-data; name=a\n\nv\n--X--\n".to_vec();
    let reader = Reader::new(chunked(body, 8), &Boundary::new("X").unwrap());
    let result = collect(reader).await;
    assert!(matches!(result, Err(Error::BoundaryType(_))));
}
