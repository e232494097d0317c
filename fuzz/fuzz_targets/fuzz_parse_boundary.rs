#![no_main]

use libfuzzer_sys::fuzz_target;
use tokio_formdata::boundary::MAX_BOUNDARY_LEN;
use tokio_formdata::parse_boundary;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(boundary) = parse_boundary(s) {
            let b = boundary.as_str();
            assert!(!b.is_empty() && b.len() <= MAX_BOUNDARY_LEN);
            assert!(!b.ends_with(' '));
        }
    }
});
