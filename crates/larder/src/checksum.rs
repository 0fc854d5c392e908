//! CRC32 (IEEE 802.3) record checksums.
//!
//! Table-driven, using the reflected polynomial `0xEDB88320`. The seed is the
//! CRC of whatever came before, so checksums chain:
//!
//! ```
//! use larder::checksum;
//!
//! let whole = checksum(0, b"hello world");
//! let chained = checksum(checksum(0, b"hello "), b"world");
//! assert_eq!(whole, chained);
//! ```

/// IEEE 802.3 CRC32 polynomial (reversed).
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// Precomputed lookup table, generated at compile time.
const CRC32_TABLE: [u32; 256] = generate_table();

const fn generate_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLYNOMIAL;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the checksum of `data`, continuing from `seed`.
///
/// A seed of 0 gives the standard CRC32 of `data`.
pub fn checksum(seed: u32, data: &[u8]) -> u32 {
    let mut hasher = Crc32::with_seed(seed);
    hasher.update(data);
    hasher.finalize()
}

/// Incremental CRC32 hasher.
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Starts a hasher as if it had already consumed the bytes whose CRC is `seed`.
    pub fn with_seed(seed: u32) -> Self {
        Self { state: !seed }
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.state ^ u32::from(byte)) & 0xFF) as usize;
            self.state = (self.state >> 8) ^ CRC32_TABLE[index];
        }
    }

    #[must_use]
    pub fn finalize(self) -> u32 {
        !self.state
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}
