use humansize::{format_size, BINARY};
use rasterkit_core::{DecodeOptions, ImageFormat, RasterImage};
use serde::Serialize;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// Summary of one decoded image, printed by `rasterkit info`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageReport {
    pub path: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub decoded_bytes: usize,
    /// xxh3 of the pixel buffer, hex
    pub digest: String,
    pub options: DecodeOptions,
}

impl ImageReport {
    pub fn new(path: &Path, format: ImageFormat, image: &RasterImage, options: &DecodeOptions) -> Self {
        Self {
            path: path.display().to_string(),
            format,
            width: image.width(),
            height: image.height(),
            channels: image.channel_count(),
            bit_depth: image.bit_depth(),
            decoded_bytes: image.data().len(),
            digest: format!("{:016x}", xxh3_64(image.data())),
            options: options.clone(),
        }
    }

    pub fn print_human(&self) {
        println!("File:       {}", self.path);
        println!("Format:     {}", self.format);
        println!("Dimensions: {}x{}", self.width, self.height);
        println!("Channels:   {}", self.channels);
        println!("Bit depth:  {}", self.bit_depth);
        println!(
            "Decoded:    {} ({} bytes)",
            format_size(self.decoded_bytes, BINARY),
            self.decoded_bytes
        );
        println!("Digest:     {}", self.digest);
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
