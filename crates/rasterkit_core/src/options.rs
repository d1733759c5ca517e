//! Decoder and encoder settings.

use serde::{Deserialize, Serialize};

/// Exponent shared by PPM import (decode) and export (encode).
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Upper bound on the inflated scanline stream, 1 GiB.
pub const DEFAULT_MAX_DECODED_BYTES: usize = 1 << 30;

/// Options for importing an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Store rows bottom-to-top
    pub flip_vertically: bool,
    /// Replace palette indices by their RGB triples
    pub expand_palette: bool,
    /// Check the CRC-32 of every PNG chunk
    pub verify_crc: bool,
    /// Gamma exponent applied to PPM samples
    pub gamma: f32,
    /// Refuse images whose inflated data would exceed this size
    pub max_decoded_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            flip_vertically: true,
            expand_palette: true,
            verify_crc: false,
            gamma: DEFAULT_GAMMA,
            max_decoded_bytes: DEFAULT_MAX_DECODED_BYTES,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps rows in file order (top-to-bottom)
    pub fn without_flip(mut self) -> Self {
        self.flip_vertically = false;
        self
    }

    /// Keeps raw palette indices
    pub fn without_palette_expansion(mut self) -> Self {
        self.expand_palette = false;
        self
    }

    pub fn with_crc_check(mut self, verify: bool) -> Self {
        self.verify_crc = verify;
        self
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_max_decoded_bytes(mut self, limit: usize) -> Self {
        self.max_decoded_bytes = limit;
        self
    }
}

/// Options for exporting an image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeOptions {
    /// Gamma exponent; samples are raised to `1 / gamma`
    pub gamma: f32,
    /// Maximum sample value written to the header (255 → 8-bit, otherwise 16-bit)
    pub max_value: u16,
    /// Input rows are bottom-to-top and must be reversed on output
    pub flip_vertically: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            gamma: DEFAULT_GAMMA,
            max_value: u16::MAX,
            flip_vertically: true,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_max_value(mut self, max_value: u16) -> Self {
        self.max_value = max_value;
        self
    }

    pub fn without_flip(mut self) -> Self {
        self.flip_vertically = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let decode = DecodeOptions::default();
        assert!(decode.flip_vertically);
        assert!(decode.expand_palette);
        assert!(!decode.verify_crc);
        assert_eq!(decode.gamma, 2.2);

        let encode = EncodeOptions::default();
        assert_eq!(encode.max_value, 65535);
        assert!(encode.flip_vertically);
    }

    #[test]
    fn test_builders() {
        let decode = DecodeOptions::new()
            .without_flip()
            .with_crc_check(true)
            .with_max_decoded_bytes(64);
        assert!(!decode.flip_vertically);
        assert!(decode.verify_crc);
        assert_eq!(decode.max_decoded_bytes, 64);

        let encode = EncodeOptions::new().with_max_value(255).with_gamma(1.0);
        assert_eq!(encode.max_value, 255);
        assert_eq!(encode.gamma, 1.0);
    }
}
