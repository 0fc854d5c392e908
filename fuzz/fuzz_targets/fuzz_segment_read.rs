#![no_main]

use std::sync::{Arc, OnceLock};

use arbitrary::Arbitrary;
use larder::{
    Cache, CacheOptions, CompressionLevel, InlineScheduler, RecordDescriptor, Segment,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    offset: u64,
    logical_size: u64,
    stored_size: u64,
    compression: u8,
    checksum: u32,
    /// Bytes flipped in the file before the read, as (position, mask).
    corruption: Vec<(u16, u8)>,
}

struct Target {
    _dir: tempfile::TempDir,
    cache: Cache,
    segment: Arc<Segment>,
    records: Vec<RecordDescriptor>,
}

// One segment with a raw and a compressed record, shared across runs.
fn target() -> &'static Target {
    static TARGET: OnceLock<Target> = OnceLock::new();
    TARGET.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let options = CacheOptions::new(dir.path()).with_compression_threshold(64);
        let cache = Cache::new(options, Arc::new(InlineScheduler));
        let group = cache.group("fuzz").expect("group");
        let segment = cache.register(&group);
        let records = vec![
            cache.write(&segment, b"raw record".to_vec()).expect("raw write"),
            cache.write(&segment, vec![b'z'; 4096]).expect("compressed write"),
        ];
        Target {
            _dir: dir,
            cache,
            segment,
            records,
        }
    })
}

fuzz_target!(|input: Input| {
    let target = target();

    // Test 1: arbitrary descriptor against an intact file
    let descriptor = RecordDescriptor {
        offset: input.offset,
        logical_size: input.logical_size,
        stored_size: input.stored_size,
        compression: CompressionLevel::new(input.compression),
        checksum: input.checksum,
    };
    if let Ok(bytes) = target.cache.read(&target.segment, &descriptor) {
        // Anything that validates must match the descriptor exactly
        assert_eq!(bytes.len() as u64, descriptor.logical_size);
        assert_eq!(larder::checksum(0, &bytes), descriptor.checksum);
    }

    // Test 2: the real descriptors must still read back
    for record in &target.records {
        target
            .cache
            .read(&target.segment, record)
            .expect("valid record must read");
    }

    // Test 3: corrupt a copy of the file and read through a fresh cache
    if !input.corruption.is_empty() {
        let mut bytes = std::fs::read(target.segment.path()).expect("read segment");
        for (pos, mask) in &input.corruption {
            let pos = usize::from(*pos) % bytes.len();
            bytes[pos] ^= mask;
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Cache::new(CacheOptions::new(dir.path()), Arc::new(InlineScheduler));
        let group = cache.group("fuzz").expect("group");
        std::fs::create_dir_all(group.dir()).expect("group dir");
        std::fs::write(group.path_for(target.segment.id()), &bytes).expect("write copy");

        if let Ok(segment) = cache.attach(&group, target.segment.id()) {
            for record in &target.records {
                let _ = cache.read(&segment, record);
            }
        }
    }
});
