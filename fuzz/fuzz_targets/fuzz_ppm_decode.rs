#![no_main]

use libfuzzer_sys::fuzz_target;
use rasterkit_core::{decode, encode, DecodeOptions, EncodeOptions, ImageFormat};

fuzz_target!(|data: &[u8]| {
    let options = DecodeOptions::new().with_max_decoded_bytes(1 << 24);
    if let Ok(image) = decode(data, ImageFormat::Ppm, &options) {
        let _ = encode(&image, ImageFormat::Ppm, &EncodeOptions::default());
    }
});
