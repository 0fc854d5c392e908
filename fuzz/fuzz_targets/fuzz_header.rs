#![no_main]

use larder::{HEADER_SIZE, Header};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Only the current header decodes, and it re-encodes to the same bytes
    if let Ok(header) = Header::decode(data) {
        assert_eq!(header, Header::CURRENT);
        assert_eq!(&header.encode()[..], &data[..HEADER_SIZE as usize]);
    }
});
