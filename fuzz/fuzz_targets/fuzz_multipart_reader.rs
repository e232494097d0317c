#![no_main]

use bytes::Bytes;
use futures::stream;
use libfuzzer_sys::fuzz_target;
use tokio::runtime::Builder;
use tokio_formdata::{Boundary, Form, Reader};

const CONTENT_TYPE: &str = "multipart/form-data; boundary=boundary";

fuzz_target!(|data: &[u8]| {
    let parsed = Form::parse(CONTENT_TYPE, data);

    // Feeding the same input in small chunks must give the same result
    let rt = Builder::new_current_thread().build().unwrap();
    let streamed = rt.block_on(async {
        let chunks: Vec<_> = data
            .chunks(7)
            .map(|c| Ok::<_, std::io::Error>(Bytes::copy_from_slice(c)))
            .collect();
        let reader = Reader::new(stream::iter(chunks), &Boundary::new("boundary").unwrap());
        Form::read(reader).await
    });

    match (parsed, streamed) {
        (Ok(a), Ok(b)) => assert_eq!(a, b),
        (Err(_), Err(_)) => {}
        (a, b) => panic!("parse {:?} != read {:?}", a.is_ok(), b.is_ok()),
    }
});
