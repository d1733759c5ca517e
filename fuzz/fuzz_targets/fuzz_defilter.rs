#![no_main]

use libfuzzer_sys::fuzz_target;
use rasterkit_core::png::defilter;

fuzz_target!(|data: &[u8]| {
    let Some((&shape, rest)) = data.split_first() else {
        return;
    };
    let stride = usize::from(shape % 8) + 1;
    let row_bytes = stride * (usize::from(shape >> 3) + 1);
    let height = (rest.len() / (row_bytes + 1)) as u32;
    if let Ok(out) = defilter(rest, height, row_bytes, stride) {
        assert_eq!(out.len(), row_bytes * height as usize);
    }
});
