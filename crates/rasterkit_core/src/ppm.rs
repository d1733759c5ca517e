//! Binary PPM (`P6`) import and export.
//!
//! The header is parsed in a single pass: the magic, then width, height and
//! maximum sample value as decimal fields, each terminated by exactly one
//! non-digit byte. Samples are big-endian and gamma-corrected on the way
//! in and out.

use crate::cursor::ByteCursor;
use crate::error::{CodecError, Result};
use crate::options::{DecodeOptions, EncodeOptions};
use crate::types::RasterImage;

pub const PPM_MAGIC: &[u8] = b"P6";

const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpmHeader {
    pub width: u32,
    pub height: u32,
    pub max_value: u16,
}

impl PpmHeader {
    /// Bytes per sample: 1 below 256, 2 otherwise.
    #[inline]
    pub const fn sample_width(&self) -> usize {
        if self.max_value < 256 { 1 } else { 2 }
    }

    pub fn sample_count(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(CHANNELS)
    }

    pub fn parse(cursor: &mut ByteCursor<'_>) -> Result<Self> {
        let magic = cursor
            .read_bytes(PPM_MAGIC.len())
            .map_err(|_| CodecError::InvalidFormat("not a PPM image or corrupted".into()))?;
        if magic != PPM_MAGIC {
            return Err(CodecError::InvalidFormat(
                "not a PPM image or corrupted (magic)".into(),
            ));
        }
        match cursor.read_u8() {
            Ok(b) if b.is_ascii_whitespace() => {}
            _ => {
                return Err(CodecError::InvalidFormat(
                    "PPM magic not followed by whitespace".into(),
                ));
            }
        }

        let width = read_field(cursor, "width")?;
        let height = read_field(cursor, "height")?;
        let max_value = read_field(cursor, "max value")?;

        if width == 0 || height == 0 {
            return Err(CodecError::InvalidFormat(format!(
                "empty image ({width}x{height})"
            )));
        }
        let max_value = u16::try_from(max_value)
            .ok()
            .filter(|&max| max > 0)
            .ok_or_else(|| CodecError::InvalidFormat(format!("max value {max_value}")))?;

        Ok(Self {
            width,
            height,
            max_value,
        })
    }
}

/// Reads digits up to the first non-digit, then consumes that separator.
fn read_field(cursor: &mut ByteCursor<'_>, name: &str) -> Result<u32> {
    let mut value: u32 = 0;
    let mut digits = 0usize;

    while let Some(digit) = cursor.peek_u8().filter(u8::is_ascii_digit) {
        cursor.skip(1)?;
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add(u32::from(digit - b'0')))
            .ok_or_else(|| CodecError::InvalidFormat(format!("{name} overflows")))?;
        digits += 1;
    }

    if digits == 0 {
        return Err(CodecError::InvalidFormat(format!("missing {name}")));
    }
    cursor
        .skip(1)
        .map_err(|_| CodecError::InvalidFormat(format!("header ends after {name}")))?;
    Ok(value)
}

#[inline]
fn gamma_decode(raw: u16, max_value: u16, gamma: f32) -> u8 {
    let normalized = f32::from(raw.min(max_value)) / f32::from(max_value);
    (255.0 * normalized.powf(gamma)).round() as u8
}

#[inline]
fn gamma_encode(normalized: f32, max_value: u16, gamma: f32) -> u16 {
    (normalized.powf(gamma.recip()) * f32::from(max_value)).round() as u16
}

/// Decodes a `P6` image into 3-channel, 8-bit linear samples.
pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<RasterImage> {
    let mut cursor = ByteCursor::new(data);
    let header = PpmHeader::parse(&mut cursor)?;

    let sample_count = header
        .sample_count()
        .ok_or_else(|| CodecError::InvalidFormat("image dimensions overflow".into()))?;
    let needed = sample_count
        .checked_mul(header.sample_width())
        .ok_or_else(|| CodecError::InvalidFormat("image dimensions overflow".into()))?;
    if needed > options.max_decoded_bytes {
        return Err(CodecError::TooLarge {
            bytes: needed,
            limit: options.max_decoded_bytes,
        });
    }
    if cursor.remaining() < needed {
        return Err(CodecError::Truncated {
            expected: needed,
            actual: cursor.remaining(),
        });
    }

    let lut: Vec<u8> = (0..=header.max_value)
        .map(|raw| gamma_decode(raw, header.max_value, options.gamma))
        .collect();
    // samples above max_value clamp to the top entry
    let lookup = |raw: u16| lut[usize::from(raw).min(lut.len() - 1)];
    let pixels: Vec<u8> = if header.sample_width() == 1 {
        cursor
            .read_bytes(needed)?
            .iter()
            .map(|&raw| lookup(u16::from(raw)))
            .collect()
    } else {
        (0..sample_count)
            .map(|_| cursor.read_u16_be().map(lookup))
            .collect::<Result<_>>()?
    };

    tracing::debug!(
        width = header.width,
        height = header.height,
        max_value = header.max_value,
        "decoded PPM"
    );

    let mut image = RasterImage::new(header.width, header.height, CHANNELS as u8, 8, pixels)?;
    if options.flip_vertically {
        image.flip_vertical();
    }
    Ok(image)
}

/// Serializes an image as `P6` with gamma-encoded samples.
///
/// Grey images are replicated to RGB and alpha is dropped.
pub fn encode(image: &RasterImage, options: &EncodeOptions) -> Result<Vec<u8>> {
    let max_value = options.max_value;
    if max_value == 0 {
        return Err(CodecError::Unsupported("PPM max value 0".into()));
    }
    let out_width = if max_value < 256 { 1 } else { 2 };

    let header = format!("P6\n{} {}\n{}\n", image.width(), image.height(), max_value);
    let sample_count = image.width() as usize * image.height() as usize * CHANNELS;
    let mut bytes = Vec::with_capacity(header.len() + sample_count * out_width);
    bytes.extend_from_slice(header.as_bytes());

    let wide = image.bytes_per_channel() == 2;
    let input_max = if wide { f32::from(u16::MAX) } else { 255.0 };
    let narrow_lut: Vec<u16> = (0..=255u8)
        .map(|v| gamma_encode(f32::from(v) / 255.0, max_value, options.gamma))
        .collect();
    let encode_sample = |sample: &[u8]| -> u16 {
        if wide {
            let raw = u16::from_be_bytes([sample[0], sample[1]]);
            gamma_encode(f32::from(raw) / input_max, max_value, options.gamma)
        } else {
            narrow_lut[usize::from(sample[0])]
        }
    };

    let bpc = image.bytes_per_channel();
    let sources: &[usize] = match image.channel_count() {
        1 | 2 => &[0, 0, 0],
        _ => &[0, 1, 2],
    };

    let mut write_row = |row: &[u8]| {
        for pixel in row.chunks_exact(image.pixel_stride()) {
            for &channel in sources {
                let value = encode_sample(&pixel[channel * bpc..(channel + 1) * bpc]);
                if out_width == 1 {
                    bytes.push(value as u8);
                } else {
                    bytes.extend_from_slice(&value.to_be_bytes());
                }
            }
        }
    };

    if options.flip_vertically {
        image.rows().rev().for_each(&mut write_row);
    } else {
        image.rows().for_each(&mut write_row);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn top_down() -> DecodeOptions {
        DecodeOptions::new().without_flip()
    }

    #[test]
    fn test_parse_header() {
        let data = b"P6\n640 480\n255\n";
        let mut cursor = ByteCursor::new(data);
        let header = PpmHeader::parse(&mut cursor).unwrap();
        assert_eq!(header.width, 640);
        assert_eq!(header.height, 480);
        assert_eq!(header.max_value, 255);
        assert_eq!(header.sample_width(), 1);
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_bad_magic() {
        let err = decode(b"P5\n1 1\n255\n\0", &top_down()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        assert!(decode(b"P", &top_down()).is_err());
    }

    #[test]
    fn test_malformed_fields() {
        for data in [
            &b"P6\n 1 255\n"[..],
            b"P6\n1 1\n",
            b"P6\n0 1\n255\n",
            b"P6\n1 1\n0\n",
            b"P6\n1 1\n70000\n",
            b"P6\n99999999999 1\n255\n",
        ] {
            assert!(decode(data, &top_down()).is_err(), "{data:?}");
        }
    }

    #[test]
    fn test_decode_extremes() {
        let data = b"P6\n2 1\n255\n\x00\x00\x00\xff\xff\xff";
        let image = decode(data, &top_down()).unwrap();
        assert_eq!(image.channel_count(), 3);
        assert_eq!(image.data(), &[0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_gamma_decode_midpoint() {
        // (128 / 255)^2.2 * 255 ≈ 56.0
        let data = b"P6\n1 1\n255\n\x80\x80\x80";
        let image = decode(data, &top_down()).unwrap();
        assert_eq!(image.data(), &[56, 56, 56]);
    }

    #[test]
    fn test_decode_sixteen_bit_samples() {
        let mut data = b"P6\n1 1\n65535\n".to_vec();
        data.extend_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF]);
        let image = decode(&data, &top_down()).unwrap();
        assert_eq!(image.data(), &[255, 0, 255]);
    }

    #[test]
    fn test_truncated_samples() {
        let err = decode(b"P6\n2 2\n255\n\x01\x02", &top_down()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::Truncated {
                expected: 12,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_decode_flip() {
        let data = b"P6\n1 2\n255\n\x00\x00\x00\xff\xff\xff";
        let image = decode(data, &DecodeOptions::default()).unwrap();
        assert_eq!(image.data(), &[255, 255, 255, 0, 0, 0]);
    }

    #[test]
    fn test_encode_header_and_depth() {
        let image = RasterImage::new(1, 1, 3, 8, vec![0, 255, 0]).unwrap();
        let bytes = encode(&image, &EncodeOptions::default()).unwrap();
        let header = b"P6\n1 1\n65535\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[0, 0, 0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn test_encode_eight_bit_grey() {
        let image = RasterImage::new(2, 1, 1, 8, vec![0, 255]).unwrap();
        let options = EncodeOptions::new().with_max_value(255);
        let bytes = encode(&image, &options).unwrap();
        assert_eq!(bytes, b"P6\n2 1\n255\n\x00\x00\x00\xff\xff\xff".to_vec());
    }

    #[test]
    fn test_encode_drops_alpha_and_unflips() {
        // stored bottom-to-top: row 0 is the bottom row
        let image = RasterImage::new(1, 2, 4, 8, vec![255, 255, 255, 7, 0, 0, 0, 9]).unwrap();
        let options = EncodeOptions::new().with_max_value(255);
        let bytes = encode(&image, &options).unwrap();
        assert_eq!(&bytes[bytes.len() - 6..], &[0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_encode_row_order_follows_flip() {
        let image = RasterImage::new(1, 2, 1, 8, vec![0, 255]).unwrap();
        let flipped = encode(&image, &EncodeOptions::new().with_max_value(255)).unwrap();
        assert!(flipped.ends_with(&[255, 255, 255, 0, 0, 0]));

        let options = EncodeOptions::new().with_max_value(255).without_flip();
        let in_order = encode(&image, &options).unwrap();
        assert!(in_order.ends_with(&[0, 0, 0, 255, 255, 255]));
    }

    #[test]
    fn test_reimport_is_stable() {
        let data = b"P6\n2 1\n255\n\x10\x80\xc0\x01\xfe\x33";
        let first = decode(data, &DecodeOptions::default()).unwrap();
        let exported = encode(&first, &EncodeOptions::default()).unwrap();
        let second = decode(&exported, &DecodeOptions::default()).unwrap();
        assert_eq!(second, first);
    }
}
