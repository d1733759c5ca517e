use crate::error::{CodecError, Result};
use crate::inflate::{Inflate, RawInflater};
use crate::options::{DecodeOptions, EncodeOptions};
use crate::types::{ImageFormat, RasterImage};
use crate::{png, ppm};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A whole file mapped read-only into memory.
pub struct MappedFile {
    mmap: Mmap,
}

impl MappedFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CodecError::io(path, e))?;
        let size = file.metadata().map_err(|e| CodecError::io(path, e))?.len();

        if size == 0 {
            return Err(CodecError::InvalidFormat(format!(
                "{} is empty",
                path.display()
            )));
        }

        // SAFETY: read-only mapping; the file must not be truncated while mapped.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| CodecError::io(path, e))?;
        Ok(Self { mmap })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

/// Decodes an in-memory file of the given format.
pub fn decode(data: &[u8], format: ImageFormat, options: &DecodeOptions) -> Result<RasterImage> {
    decode_with(data, format, options, &RawInflater)
}

/// Like [`decode`], with a caller-supplied inflate engine.
pub fn decode_with(
    data: &[u8],
    format: ImageFormat,
    options: &DecodeOptions,
    inflater: &dyn Inflate,
) -> Result<RasterImage> {
    match format {
        ImageFormat::Png => png::decode(data, options, inflater),
        ImageFormat::Ppm => ppm::decode(data, options),
        other => Err(CodecError::Unsupported(format!("importing {other} images"))),
    }
}

/// Serializes an image into the given format.
pub fn encode(image: &RasterImage, format: ImageFormat, options: &EncodeOptions) -> Result<Vec<u8>> {
    match format {
        ImageFormat::Ppm => ppm::encode(image, options),
        other => Err(CodecError::Unsupported(format!("exporting {other} images"))),
    }
}

/// Reads and decodes the file at `path`.
pub fn import_image(path: impl AsRef<Path>, format: ImageFormat) -> Result<RasterImage> {
    import_image_with(path, format, &DecodeOptions::default())
}

pub fn import_image_with(
    path: impl AsRef<Path>,
    format: ImageFormat,
    options: &DecodeOptions,
) -> Result<RasterImage> {
    let path = path.as_ref();
    if !format.can_decode() {
        return Err(CodecError::Unsupported(format!("importing {format} images")));
    }
    let file = MappedFile::open(path)?;
    tracing::debug!("importing {} ({} bytes) as {}", path.display(), file.len(), format);
    decode(file.as_slice(), format, options)
}

/// Encodes `image` and writes it to `path`.
pub fn export_image(image: &RasterImage, format: ImageFormat, path: impl AsRef<Path>) -> Result<()> {
    export_image_with(image, format, path, &EncodeOptions::default())
}

pub fn export_image_with(
    image: &RasterImage,
    format: ImageFormat,
    path: impl AsRef<Path>,
    options: &EncodeOptions,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode(image, format, options)?;
    std::fs::write(path, &bytes).map_err(|e| CodecError::io(path, e))?;
    tracing::debug!("exported {} ({} bytes) as {}", path.display(), bytes.len(), format);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_import_missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.png");
        let err = import_image(&path, ImageFormat::Png).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.to_string().contains("missing.png"));
    }

    #[test]
    fn test_import_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.ppm");
        std::fs::write(&path, b"").unwrap();
        assert!(import_image(&path, ImageFormat::Ppm).is_err());
    }

    #[test]
    fn test_unsupported_formats() {
        let image = RasterImage::new(1, 1, 3, 8, vec![1, 2, 3]).unwrap();
        for format in [ImageFormat::Png, ImageFormat::Bmp, ImageFormat::Jpeg, ImageFormat::Tiff] {
            let err = encode(&image, format, &EncodeOptions::default()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Capability);
        }
        let err = decode(b"BM", ImageFormat::Bmp, &DecodeOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capability);
    }

    #[test]
    fn test_export_then_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.ppm");
        let image = RasterImage::new(2, 2, 3, 8, vec![0, 64, 128, 255, 1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        export_image(&image, ImageFormat::Ppm, &path).unwrap();

        let imported = import_image(&path, ImageFormat::Ppm).unwrap();
        assert_eq!(imported.width(), 2);
        assert_eq!(imported.height(), 2);
        assert_eq!(imported.channel_count(), 3);

        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"P6\n2 2\n65535\n"));
    }

    #[test]
    fn test_export_to_missing_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("no/such/dir/out.ppm");
        let image = RasterImage::new(1, 1, 3, 8, vec![1, 2, 3]).unwrap();
        let err = export_image(&image, ImageFormat::Ppm, &path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
    }
}
