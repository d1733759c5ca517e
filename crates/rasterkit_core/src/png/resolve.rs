use super::parser::Palette;
use crate::error::{CodecError, Result};

/// Replaces each palette index with its RGB triple.
pub fn expand_palette(indices: &[u8], palette: &Palette) -> Result<Vec<u8>> {
    let mut rgb = Vec::with_capacity(indices.len() * 3);
    for &index in indices {
        let entry = palette.get(index).ok_or_else(|| {
            CodecError::InvalidFormat(format!(
                "palette index {index} out of range ({} entries)",
                palette.len()
            ))
        })?;
        rgb.extend_from_slice(&entry);
    }
    Ok(rgb)
}

/// Swaps row `i` with row `rows - 1 - i` through a single scratch row.
pub fn flip_rows(buffer: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = buffer.len() / row_bytes;
    let mut scratch = vec![0u8; row_bytes];

    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (upper, lower) = buffer.split_at_mut(bottom * row_bytes);
        let top_row = &mut upper[top * row_bytes..(top + 1) * row_bytes];
        let bottom_row = &mut lower[..row_bytes];

        scratch.copy_from_slice(top_row);
        top_row.copy_from_slice(bottom_row);
        bottom_row.copy_from_slice(&scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expand_palette() {
        let palette = Palette::parse(&[10, 20, 30, 40, 50, 60]).unwrap();
        let rgb = expand_palette(&[1, 0, 1], &palette).unwrap();
        assert_eq!(rgb, vec![40, 50, 60, 10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn test_expand_palette_out_of_range() {
        let palette = Palette::parse(&[10, 20, 30]).unwrap();
        assert!(expand_palette(&[0, 1], &palette).is_err());
    }

    #[test]
    fn test_flip_odd_rows() {
        let mut buffer = vec![1, 1, 2, 2, 3, 3];
        flip_rows(&mut buffer, 2);
        assert_eq!(buffer, vec![3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn test_flip_single_row() {
        let mut buffer = vec![1, 2, 3];
        flip_rows(&mut buffer, 3);
        assert_eq!(buffer, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn prop_flip_is_involution(
            row_bytes in 1usize..16,
            rows in 0usize..12,
            fill in any::<u8>(),
        ) {
            let original: Vec<u8> = (0..row_bytes * rows)
                .map(|i| (i as u8).wrapping_mul(31).wrapping_add(fill))
                .collect();
            let mut buffer = original.clone();
            flip_rows(&mut buffer, row_bytes);
            flip_rows(&mut buffer, row_bytes);
            prop_assert_eq!(buffer, original);
        }
    }
}
