use crate::error::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Bmp,
    Jpeg,
    Tiff,
    Ppm,
}

impl ImageFormat {
    pub const ALL: [Self; 5] = [Self::Png, Self::Bmp, Self::Jpeg, Self::Tiff, Self::Ppm];

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Bmp => "bmp",
            Self::Jpeg => "jpg",
            Self::Tiff => "tiff",
            Self::Ppm => "ppm",
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Bmp => "BMP",
            Self::Jpeg => "JPEG",
            Self::Tiff => "TIFF",
            Self::Ppm => "PPM",
        }
    }

    #[must_use]
    pub const fn header_bytes(&self) -> &'static [u8] {
        match self {
            Self::Png => &crate::png::PNG_SIGNATURE,
            Self::Bmp => b"BM",
            Self::Jpeg => &[0xFF, 0xD8, 0xFF],
            Self::Tiff => b"II*\0",
            Self::Ppm => crate::ppm::PPM_MAGIC,
        }
    }

    #[must_use]
    pub const fn can_decode(&self) -> bool {
        matches!(self, Self::Png | Self::Ppm)
    }

    #[must_use]
    pub const fn can_encode(&self) -> bool {
        matches!(self, Self::Ppm)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "bmp" => Some(Self::Bmp),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "tif" | "tiff" => Some(Self::Tiff),
            "ppm" | "pnm" => Some(Self::Ppm),
            _ => None,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Guesses the format from the leading magic bytes.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"MM\0*") {
            return Some(Self::Tiff);
        }
        Self::ALL
            .into_iter()
            .find(|format| data.starts_with(format.header_bytes()))
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ImageFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s)
            .ok_or_else(|| CodecError::Unsupported(format!("unknown image format '{s}'")))
    }
}

/// A decoded image: one contiguous, row-major pixel buffer.
///
/// Rows are stored bottom-to-top when the decoder was asked to flip
/// (the default), top-to-bottom otherwise. Samples wider than one byte are
/// big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    width: u32,
    height: u32,
    channel_count: u8,
    bit_depth: u8,
    data: Vec<u8>,
}

impl RasterImage {
    pub fn new(
        width: u32,
        height: u32,
        channel_count: u8,
        bit_depth: u8,
        data: Vec<u8>,
    ) -> Result<Self> {
        if !(1..=4).contains(&channel_count) {
            return Err(CodecError::Unsupported(format!(
                "{channel_count} channels per pixel"
            )));
        }
        if bit_depth != 8 && bit_depth != 16 {
            return Err(CodecError::Unsupported(format!(
                "bit depth {bit_depth} in memory"
            )));
        }

        let expected = Self::buffer_len(width, height, channel_count, bit_depth)
            .ok_or_else(|| CodecError::InvalidFormat("image dimensions overflow".into()))?;
        if data.len() != expected {
            return Err(CodecError::InvalidBufferSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            channel_count,
            bit_depth,
            data,
        })
    }

    /// `height * width * channel_count * ceil(bit_depth / 8)`, or `None` on overflow.
    pub fn buffer_len(width: u32, height: u32, channel_count: u8, bit_depth: u8) -> Option<usize> {
        let bytes_per_channel = (bit_depth as usize).div_ceil(8);
        (width as usize)
            .checked_mul(channel_count as usize)?
            .checked_mul(bytes_per_channel)?
            .checked_mul(height as usize)
    }

    #[inline]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub const fn channel_count(&self) -> u8 {
        self.channel_count
    }

    #[inline]
    pub const fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    #[inline]
    pub const fn bytes_per_channel(&self) -> usize {
        (self.bit_depth as usize).div_ceil(8)
    }

    #[inline]
    pub const fn pixel_stride(&self) -> usize {
        self.bytes_per_channel() * self.channel_count as usize
    }

    #[inline]
    pub const fn row_bytes(&self) -> usize {
        self.pixel_stride() * self.width as usize
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let row_bytes = self.row_bytes();
        let start = y as usize * row_bytes;
        Some(&self.data[start..start + row_bytes])
    }

    pub fn rows(&self) -> impl DoubleEndedIterator<Item = &[u8]> + ExactSizeIterator {
        // chunks_exact panics on 0
        self.data.chunks_exact(self.row_bytes().max(1))
    }

    /// Reverses the row order in place.
    pub fn flip_vertical(&mut self) {
        let row_bytes = self.row_bytes();
        crate::png::flip_rows(&mut self.data, row_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(ImageFormat::Png.extension(), "png");
        assert_eq!(ImageFormat::Ppm.extension(), "ppm");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("gif"), None);
        assert_eq!(
            ImageFormat::from_path("out/picture.ppm"),
            Some(ImageFormat::Ppm)
        );
        assert!("webp".parse::<ImageFormat>().is_err());
    }

    #[test]
    fn test_sniff() {
        assert_eq!(
            ImageFormat::sniff(&crate::png::PNG_SIGNATURE),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::sniff(b"P6\n1 1\n255\n"), Some(ImageFormat::Ppm));
        assert_eq!(ImageFormat::sniff(b"BM...."), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::sniff(b"MM\0*"), Some(ImageFormat::Tiff));
        assert_eq!(ImageFormat::sniff(b"P3"), None);
    }

    #[test]
    fn test_capabilities() {
        assert!(ImageFormat::Png.can_decode());
        assert!(!ImageFormat::Png.can_encode());
        assert!(ImageFormat::Ppm.can_encode());
        assert!(!ImageFormat::Tiff.can_decode());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ImageFormat::Ppm), "PPM");
    }

    #[test]
    fn test_new_checks_buffer_len() {
        assert!(RasterImage::new(2, 2, 3, 8, vec![0; 12]).is_ok());
        assert!(matches!(
            RasterImage::new(2, 2, 3, 8, vec![0; 11]),
            Err(CodecError::InvalidBufferSize {
                expected: 12,
                actual: 11
            })
        ));
        assert!(RasterImage::new(1, 1, 3, 16, vec![0; 6]).is_ok());
        assert!(RasterImage::new(1, 1, 5, 8, vec![0; 5]).is_err());
    }

    #[test]
    fn test_geometry() {
        let image = RasterImage::new(3, 2, 4, 16, vec![0; 48]).unwrap();
        assert_eq!(image.bytes_per_channel(), 2);
        assert_eq!(image.pixel_stride(), 8);
        assert_eq!(image.row_bytes(), 24);
        assert_eq!(image.rows().count(), 2);
        assert!(image.row(2).is_none());
    }

    #[test]
    fn test_rows_iterate_both_ways() {
        let image = RasterImage::new(1, 3, 1, 8, vec![1, 2, 3]).unwrap();
        assert_eq!(image.rows().len(), 3);
        let bottom_up: Vec<u8> = image.rows().rev().flatten().copied().collect();
        assert_eq!(bottom_up, vec![3, 2, 1]);
    }

    #[test]
    fn test_flip_vertical_twice_restores() {
        let data: Vec<u8> = (0..18).collect();
        let mut image = RasterImage::new(2, 3, 3, 8, data.clone()).unwrap();
        image.flip_vertical();
        assert_eq!(image.row(0).unwrap(), &data[12..18]);
        image.flip_vertical();
        assert_eq!(image.data(), &data[..]);
    }
}
