#![no_main]

use libfuzzer_sys::fuzz_target;
use rasterkit_core::{decode, DecodeOptions, ImageFormat};

fuzz_target!(|data: &[u8]| {
    let options = DecodeOptions::new()
        .with_crc_check(data.first().is_some_and(|b| b & 1 == 1))
        .with_max_decoded_bytes(1 << 24);
    if let Ok(image) = decode(data, ImageFormat::Png, &options) {
        assert_eq!(
            image.data().len(),
            image.row_bytes() * image.height() as usize
        );
    }
});
