//! Raster image import/export: a PNG decoder (chunk walker, inflate,
//! scanline defilter, palette expansion) and a PPM codec, both producing
//! a single in-memory [`RasterImage`].

pub mod cursor;
mod error;
pub mod inflate;
pub mod io;
pub mod options;
pub mod png;
pub mod ppm;
mod types;

pub use error::{CodecError, ErrorKind, Result};
pub use inflate::{Inflate, InflateOutcome, RawInflater};
pub use io::{
    decode, encode, export_image, export_image_with, import_image, import_image_with,
};
pub use options::{DecodeOptions, EncodeOptions};
pub use types::{ImageFormat, RasterImage};
