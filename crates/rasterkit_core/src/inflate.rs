//! Adapter over the DEFLATE engine.
//!
//! Status codes: `0` success, negative for malformed compressed data,
//! positive when the input ended early or the output space ran out.

use flate2::{Decompress, FlushDecompress, Status};

pub const STATUS_OK: i32 = 0;
pub const STATUS_MALFORMED: i32 = -1;
pub const STATUS_OUTPUT_EXHAUSTED: i32 = 1;
pub const STATUS_INPUT_EXHAUSTED: i32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InflateOutcome {
    /// Decompressed bytes; `data.len()` is the decompressed length.
    pub data: Vec<u8>,
    pub status: i32,
}

impl InflateOutcome {
    #[inline]
    pub const fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Decompresses one raw DEFLATE buffer into another of bounded size.
pub trait Inflate {
    fn inflate(&self, compressed: &[u8], capacity: usize) -> InflateOutcome;
}

/// Raw (headerless) DEFLATE backed by `flate2`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawInflater;

impl Inflate for RawInflater {
    fn inflate(&self, compressed: &[u8], capacity: usize) -> InflateOutcome {
        let mut data = vec![0u8; capacity];
        let mut decoder = Decompress::new(false);
        let result = decoder.decompress(compressed, &mut data, FlushDecompress::Finish);
        data.truncate(decoder.total_out() as usize);

        let status = match result {
            Ok(Status::StreamEnd) => STATUS_OK,
            Ok(Status::Ok | Status::BufError) if data.len() >= capacity => STATUS_OUTPUT_EXHAUSTED,
            Ok(Status::Ok | Status::BufError) => STATUS_INPUT_EXHAUSTED,
            Err(e) => {
                tracing::debug!("inflate failed after {} bytes: {}", decoder.total_in(), e);
                STATUS_MALFORMED
            }
        };

        InflateOutcome { data, status }
    }
}
