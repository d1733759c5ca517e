use super::{
    is_critical_chunk, is_private_chunk, is_reserved_bit_set, is_safe_to_copy, IHDR_LENGTH,
    MAX_PALETTE_ENTRIES, PNG_SIGNATURE, ZLIB_CHECKSUM_LEN, ZLIB_HEADER_LEN,
};
use crate::cursor::ByteCursor;
use crate::error::{CodecError, Result};
use crate::options::DecodeOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    Ihdr,
    Plte,
    Idat,
    Iend,
    Other([u8; 4]),
}

impl ChunkType {
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        match bytes {
            b"IHDR" => Self::Ihdr,
            b"PLTE" => Self::Plte,
            b"IDAT" => Self::Idat,
            b"IEND" => Self::Iend,
            _ => Self::Other(*bytes),
        }
    }
}

/// A 4-byte chunk type whose letter case carries property bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    #[inline]
    pub const fn is_critical(&self) -> bool {
        is_critical_chunk(&self.0)
    }

    #[inline]
    pub const fn is_private(&self) -> bool {
        is_private_chunk(&self.0)
    }

    #[inline]
    pub const fn is_safe_to_copy(&self) -> bool {
        is_safe_to_copy(&self.0)
    }

    #[inline]
    pub const fn is_reserved_bit_set(&self) -> bool {
        is_reserved_bit_set(&self.0)
    }

    #[inline]
    pub fn chunk_type(&self) -> ChunkType {
        ChunkType::from_bytes(&self.0)
    }
}

impl std::fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub length: u32,
    pub tag: ChunkTag,
}

impl ChunkHeader {
    pub fn read(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let length = cursor.read_u32_be()?;
        let tag = ChunkTag(cursor.read_tag()?);
        Ok(Self { length, tag })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorType {
    Grayscale,
    Rgb,
    Indexed,
    GrayscaleAlpha,
    Rgba,
}

impl ColorType {
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Grayscale),
            2 => Some(Self::Rgb),
            3 => Some(Self::Indexed),
            4 => Some(Self::GrayscaleAlpha),
            6 => Some(Self::Rgba),
            _ => None,
        }
    }

    #[must_use]
    pub const fn channel_count(&self) -> u8 {
        match self {
            Self::Grayscale | Self::Indexed => 1,
            Self::GrayscaleAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Decoded IHDR payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub compression: u8,
    pub filter: u8,
    pub interlace: u8,
}

impl ImageHeader {
    /// Parses and checks a 13-byte IHDR payload.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() != IHDR_LENGTH as usize {
            return Err(CodecError::InvalidFormat(format!(
                "IHDR length is {}, expected {IHDR_LENGTH}",
                payload.len()
            )));
        }

        let mut cursor = ByteCursor::new(payload);
        let width = cursor.read_u32_be()?;
        let height = cursor.read_u32_be()?;
        let bit_depth = cursor.read_u8()?;
        let color_byte = cursor.read_u8()?;
        let compression = cursor.read_u8()?;
        let filter = cursor.read_u8()?;
        let interlace = cursor.read_u8()?;

        if width == 0 || height == 0 {
            return Err(CodecError::InvalidFormat(format!(
                "empty image ({width}x{height})"
            )));
        }
        if bit_depth < 8 {
            return Err(CodecError::Unsupported(format!(
                "bit depth {bit_depth} (less than 8)"
            )));
        }
        if bit_depth != 8 && bit_depth != 16 {
            return Err(CodecError::Unsupported(format!("bit depth {bit_depth}")));
        }
        let color_type = ColorType::from_byte(color_byte).ok_or_else(|| {
            CodecError::InvalidFormat(format!("unknown color type {color_byte}"))
        })?;
        if color_type == ColorType::Indexed && bit_depth != 8 {
            return Err(CodecError::InvalidFormat(format!(
                "palette image with bit depth {bit_depth}"
            )));
        }
        if compression != 0 {
            return Err(CodecError::InvalidFormat(format!(
                "compression method {compression}"
            )));
        }
        if filter != 0 {
            return Err(CodecError::InvalidFormat(format!("filter method {filter}")));
        }
        match interlace {
            0 => {}
            1 => return Err(CodecError::Unsupported("interlaced images".into())),
            other => {
                return Err(CodecError::InvalidFormat(format!(
                    "interlace method {other}"
                )));
            }
        }

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            compression,
            filter,
            interlace,
        })
    }

    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        (self.bit_depth as usize).div_ceil(8)
    }

    #[inline]
    pub const fn pixel_stride(&self) -> usize {
        self.bytes_per_channel() * self.color_type.channel_count() as usize
    }

    #[inline]
    pub const fn row_bytes(&self) -> usize {
        self.width as usize * self.pixel_stride()
    }

    /// Size of the inflated stream: one filter byte plus a row per scanline.
    pub fn filtered_len(&self) -> Option<usize> {
        self.row_bytes()
            .checked_add(1)?
            .checked_mul(self.height as usize)
    }
}

/// RGB triples from a PLTE chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<[u8; 3]>,
}

impl Palette {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() % 3 != 0 {
            return Err(CodecError::InvalidFormat(format!(
                "PLTE length {} is not a multiple of 3",
                payload.len()
            )));
        }
        if payload.len() / 3 > MAX_PALETTE_ENTRIES {
            return Err(CodecError::InvalidFormat(format!(
                "PLTE has {} entries",
                payload.len() / 3
            )));
        }
        let entries = payload
            .chunks_exact(3)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect();
        Ok(Self { entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn get(&self, index: u8) -> Option<[u8; 3]> {
        self.entries.get(index as usize).copied()
    }
}

/// Everything the walker extracts from the container.
#[derive(Debug, Clone)]
pub struct ChunkStream {
    pub header: ImageHeader,
    pub palette: Option<Palette>,
    /// Concatenated IDAT payloads with the zlib header and checksum removed.
    pub compressed: Vec<u8>,
    pub skipped_chunks: usize,
}

fn check_zlib_header(cmf: u8, flg: u8) -> Result<()> {
    if cmf & 0x0F != 8 {
        return Err(CodecError::InvalidFormat(format!(
            "zlib compression method {}",
            cmf & 0x0F
        )));
    }
    if ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
        return Err(CodecError::InvalidFormat("corrupted zlib header".into()));
    }
    if flg & 0x20 != 0 {
        return Err(CodecError::Unsupported("zlib preset dictionary".into()));
    }
    Ok(())
}

struct ChunkWalker<'a, 'o> {
    cursor: ByteCursor<'a>,
    options: &'o DecodeOptions,
}

impl<'a> ChunkWalker<'a, '_> {
    /// Reads one chunk's payload and trailing CRC.
    fn read_payload(&mut self, header: &ChunkHeader) -> Result<&'a [u8]> {
        let payload = self.cursor.read_bytes(header.length as usize)?;
        let stored = self.cursor.read_u32_be()?;

        if self.options.verify_crc {
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(&header.tag.0);
            hasher.update(payload);
            let computed = hasher.finalize();
            if computed != stored {
                return Err(CodecError::CrcMismatch {
                    tag: header.tag.to_string(),
                    stored,
                    computed,
                });
            }
        }
        Ok(payload)
    }

    fn walk(mut self) -> Result<ChunkStream> {
        let signature = self.cursor.read_bytes(PNG_SIGNATURE.len()).map_err(|_| {
            CodecError::InvalidFormat("not a PNG image or corrupted (too short)".into())
        })?;
        if signature != PNG_SIGNATURE {
            return Err(CodecError::InvalidFormat(
                "not a PNG image or corrupted (signature)".into(),
            ));
        }

        let first = ChunkHeader::read(&mut self.cursor)?;
        if first.tag.chunk_type() != ChunkType::Ihdr {
            return Err(CodecError::InvalidFormat(format!(
                "first chunk is {}, expected IHDR",
                first.tag
            )));
        }
        let header = ImageHeader::parse(self.read_payload(&first)?)?;

        let mut palette: Option<Palette> = None;
        let mut compressed = Vec::new();
        let mut idat_count = 0usize;
        let mut skipped_chunks = 0usize;

        loop {
            if self.cursor.remaining() < 8 {
                return Err(CodecError::MissingTerminator);
            }
            let chunk = ChunkHeader::read(&mut self.cursor)?;

            if !chunk.tag.is_critical() {
                tracing::trace!(
                    private = chunk.tag.is_private(),
                    safe_to_copy = chunk.tag.is_safe_to_copy(),
                    "skipping ancillary chunk {} ({} bytes)",
                    chunk.tag,
                    chunk.length
                );
                self.read_payload(&chunk)?;
                skipped_chunks += 1;
                continue;
            }
            if chunk.tag.is_reserved_bit_set() {
                return Err(CodecError::InvalidFormat(format!(
                    "chunk type {} has the reserved bit set",
                    chunk.tag
                )));
            }

            match chunk.tag.chunk_type() {
                ChunkType::Ihdr => {
                    return Err(CodecError::InvalidFormat("duplicate IHDR chunk".into()));
                }
                ChunkType::Plte => {
                    if palette.is_some() {
                        return Err(CodecError::InvalidFormat("multiple PLTE chunks".into()));
                    }
                    if idat_count > 0 {
                        return Err(CodecError::InvalidFormat("PLTE after IDAT".into()));
                    }
                    if matches!(
                        header.color_type,
                        ColorType::Grayscale | ColorType::GrayscaleAlpha
                    ) {
                        return Err(CodecError::InvalidFormat(format!(
                            "PLTE not allowed for color type {:?}",
                            header.color_type
                        )));
                    }
                    let parsed = Palette::parse(self.read_payload(&chunk)?)?;
                    tracing::debug!("using palette with {} entries", parsed.len());
                    palette = Some(parsed);
                }
                ChunkType::Idat => {
                    let payload = self.read_payload(&chunk)?;
                    if idat_count == 0 {
                        if payload.len() < ZLIB_HEADER_LEN {
                            return Err(CodecError::InvalidFormat(
                                "first IDAT too short for zlib header".into(),
                            ));
                        }
                        check_zlib_header(payload[0], payload[1])?;
                        compressed.extend_from_slice(&payload[ZLIB_HEADER_LEN..]);
                    } else {
                        compressed.extend_from_slice(payload);
                    }
                    idat_count += 1;
                }
                ChunkType::Iend => {
                    self.read_payload(&chunk)?;
                    break;
                }
                ChunkType::Other(_) => {
                    return Err(CodecError::InvalidFormat(format!(
                        "unrecognized critical chunk {}",
                        chunk.tag
                    )));
                }
            }
        }

        if idat_count == 0 {
            return Err(CodecError::InvalidFormat("no IDAT chunk".into()));
        }
        if compressed.len() < ZLIB_CHECKSUM_LEN {
            return Err(CodecError::InvalidFormat(
                "IDAT stream shorter than zlib checksum".into(),
            ));
        }
        compressed.truncate(compressed.len() - ZLIB_CHECKSUM_LEN);

        Ok(ChunkStream {
            header,
            palette,
            compressed,
            skipped_chunks,
        })
    }
}

/// Walks every chunk of a PNG buffer up to IEND.
pub fn walk_chunks(data: &[u8], options: &DecodeOptions) -> Result<ChunkStream> {
    ChunkWalker {
        cursor: ByteCursor::new(data),
        options,
    }
    .walk()
}
