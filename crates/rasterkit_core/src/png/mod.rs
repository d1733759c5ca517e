mod filter;
mod parser;
mod resolve;

pub use filter::{defilter, paeth_predictor, FilterType};
pub use parser::{
    walk_chunks, ChunkHeader, ChunkStream, ChunkTag, ChunkType, ColorType, ImageHeader, Palette,
};
pub use resolve::{expand_palette, flip_rows};

use crate::error::{CodecError, Result};
use crate::inflate::Inflate;
use crate::options::DecodeOptions;
use crate::types::RasterImage;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

pub const IHDR: [u8; 4] = *b"IHDR";

pub const IDAT: [u8; 4] = *b"IDAT";

pub const IEND: [u8; 4] = *b"IEND";

pub const PLTE: [u8; 4] = *b"PLTE";

pub const IHDR_LENGTH: u32 = 13;

/// zlib stream header stripped from the first IDAT payload.
pub const ZLIB_HEADER_LEN: usize = 2;

/// Adler-32 trailer stripped from the end of the concatenated IDAT stream.
pub const ZLIB_CHECKSUM_LEN: usize = 4;

pub const MAX_PALETTE_ENTRIES: usize = 256;

const ANCILLARY_BIT: u8 = 0x20;

#[inline]
pub const fn is_critical_chunk(tag: &[u8; 4]) -> bool {
    tag[0] & ANCILLARY_BIT == 0
}

#[inline]
pub const fn is_private_chunk(tag: &[u8; 4]) -> bool {
    tag[1] & ANCILLARY_BIT != 0
}

/// The third letter must be uppercase in every conforming chunk type.
#[inline]
pub const fn is_reserved_bit_set(tag: &[u8; 4]) -> bool {
    tag[2] & ANCILLARY_BIT != 0
}

#[inline]
pub const fn is_safe_to_copy(tag: &[u8; 4]) -> bool {
    tag[3] & ANCILLARY_BIT != 0
}

/// Decodes a complete PNG file held in memory.
///
/// Pipeline: chunk walk → inflate → defilter → palette expansion → flip.
/// Each intermediate buffer is dropped as soon as the next stage has been
/// produced.
pub fn decode(data: &[u8], options: &DecodeOptions, inflater: &dyn Inflate) -> Result<RasterImage> {
    let ChunkStream {
        header,
        palette,
        compressed,
        skipped_chunks,
    } = walk_chunks(data, options)?;

    tracing::debug!(
        width = header.width,
        height = header.height,
        bit_depth = header.bit_depth,
        color_type = ?header.color_type,
        skipped_chunks,
        "walked PNG chunks"
    );

    let capacity = header.filtered_len().ok_or_else(|| {
        CodecError::InvalidFormat("image dimensions overflow".into())
    })?;
    if capacity > options.max_decoded_bytes {
        return Err(CodecError::TooLarge {
            bytes: capacity,
            limit: options.max_decoded_bytes,
        });
    }

    let filtered = inflater.inflate(&compressed, capacity);
    drop(compressed);
    if !filtered.is_ok() {
        return Err(CodecError::Decompression {
            status: filtered.status,
        });
    }
    if filtered.data.len() < capacity {
        return Err(CodecError::Truncated {
            expected: capacity,
            actual: filtered.data.len(),
        });
    }

    let stride = header.pixel_stride();
    let row_bytes = header.row_bytes();
    let mut pixels = defilter(&filtered.data, header.height, row_bytes, stride)?;
    drop(filtered);

    let mut channel_count = header.color_type.channel_count();
    if header.color_type == ColorType::Indexed && options.expand_palette {
        let palette = palette.ok_or_else(|| {
            CodecError::InvalidFormat("indexed image without PLTE chunk".into())
        })?;
        pixels = expand_palette(&pixels, &palette)?;
        channel_count = 3;
    }

    let mut image = RasterImage::new(
        header.width,
        header.height,
        channel_count,
        header.bit_depth,
        pixels,
    )?;
    if options.flip_vertically {
        image.flip_vertical();
    }
    Ok(image)
}
