#![no_main]

use larder::payload;
use larder::{Codec, CompressionLevel, RecordDescriptor, ZstdCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Test 1: raw decompression of arbitrary frames must not panic and
    // never exceeds its limit
    if let Ok(out) = ZstdCodec.decompress(data, 64 * 1024) {
        assert!(out.len() <= 64 * 1024);
    }

    // Test 2: payload decode with a descriptor claiming the input is a
    // compressed record of a small logical size
    let descriptor = RecordDescriptor {
        offset: 8,
        logical_size: 1024,
        stored_size: data.len() as u64,
        compression: CompressionLevel::new(3),
        checksum: 0,
    };
    if let Ok(bytes) = payload::decode(data.to_vec(), &descriptor, &ZstdCodec, 0) {
        assert_eq!(bytes.len(), 1024);
    }

    // Test 3: compress then decompress round-trips
    if !data.is_empty() {
        let compressed = ZstdCodec
            .compress(data, CompressionLevel::new(1))
            .expect("compression of valid input");
        let restored = ZstdCodec.decompress(&compressed, data.len()).expect("own frame decodes");
        assert_eq!(restored, data);
    }
});
