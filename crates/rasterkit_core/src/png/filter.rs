//! Per-scanline predictive filters.
//!
//! Reconstruction is strictly sequential: Up, Average and Paeth read the
//! previous row's reconstructed output, not its raw bytes. The first row
//! is reconstructed against an all-zero prior row.

use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl FilterType {
    pub const ALL: [Self; 5] = [Self::None, Self::Sub, Self::Up, Self::Average, Self::Paeth];

    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Sub),
            2 => Some(Self::Up),
            3 => Some(Self::Average),
            4 => Some(Self::Paeth),
            _ => None,
        }
    }

    /// Undoes this filter for one row.
    ///
    /// `prior` is the previous reconstructed row (all zeros for the first
    /// row) and must be as long as `raw`.
    pub fn reconstruct(self, prior: &[u8], raw: &[u8], stride: usize) -> Vec<u8> {
        debug_assert_eq!(prior.len(), raw.len());
        match self {
            Self::None => raw.to_vec(),
            Self::Sub => unfilter_sub(raw, stride),
            Self::Up => unfilter_up(prior, raw),
            Self::Average => unfilter_average(prior, raw, stride),
            Self::Paeth => unfilter_paeth(prior, raw, stride),
        }
    }

    /// Applies this filter to one row, the inverse of [`FilterType::reconstruct`].
    pub fn apply(self, prior: &[u8], row: &[u8], stride: usize) -> Vec<u8> {
        debug_assert_eq!(prior.len(), row.len());
        let left = |i: usize| if i >= stride { row[i - stride] } else { 0 };
        let up_left = |i: usize| if i >= stride { prior[i - stride] } else { 0 };

        row.iter()
            .enumerate()
            .map(|(i, &byte)| {
                let prediction = match self {
                    Self::None => 0,
                    Self::Sub => left(i),
                    Self::Up => prior[i],
                    Self::Average => average(left(i), prior[i]),
                    Self::Paeth => paeth_predictor(left(i), prior[i], up_left(i)),
                };
                byte.wrapping_sub(prediction)
            })
            .collect()
    }
}

impl TryFrom<u8> for FilterType {
    type Error = u8;

    fn try_from(byte: u8) -> std::result::Result<Self, u8> {
        Self::from_byte(byte).ok_or(byte)
    }
}

/// Picks whichever of left, up and upper-left is closest to
/// `left + up - up_left`. Ties go to left, then up.
#[inline]
pub fn paeth_predictor(left: u8, up: u8, up_left: u8) -> u8 {
    let a = i16::from(left);
    let b = i16::from(up);
    let c = i16::from(up_left);

    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        up
    } else {
        up_left
    }
}

#[inline]
fn average(left: u8, up: u8) -> u8 {
    ((u16::from(left) + u16::from(up)) >> 1) as u8
}

fn unfilter_sub(raw: &[u8], stride: usize) -> Vec<u8> {
    let mut out = raw.to_vec();
    for i in stride..out.len() {
        out[i] = out[i].wrapping_add(out[i - stride]);
    }
    out
}

fn unfilter_up(prior: &[u8], raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .zip(prior)
        .map(|(&r, &up)| r.wrapping_add(up))
        .collect()
}

fn unfilter_average(prior: &[u8], raw: &[u8], stride: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, (&r, &up)) in raw.iter().zip(prior).enumerate() {
        let left = if i >= stride { out[i - stride] } else { 0 };
        out.push(r.wrapping_add(average(left, up)));
    }
    out
}

fn unfilter_paeth(prior: &[u8], raw: &[u8], stride: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    for (i, (&r, &up)) in raw.iter().zip(prior).enumerate() {
        let (left, up_left) = if i >= stride {
            (out[i - stride], prior[i - stride])
        } else {
            (0, 0)
        };
        out.push(r.wrapping_add(paeth_predictor(left, up, up_left)));
    }
    out
}

/// Reconstructs `height` scanlines of `1 + row_bytes` bytes each into a
/// flat `height * row_bytes` pixel buffer.
pub fn defilter(filtered: &[u8], height: u32, row_bytes: usize, stride: usize) -> Result<Vec<u8>> {
    let scanline_len = row_bytes + 1;
    let expected = scanline_len
        .checked_mul(height as usize)
        .ok_or_else(|| CodecError::InvalidFormat("image dimensions overflow".into()))?;
    if filtered.len() < expected {
        return Err(CodecError::Truncated {
            expected,
            actual: filtered.len(),
        });
    }

    let zero_row = vec![0u8; row_bytes];
    let mut output = Vec::with_capacity(row_bytes * height as usize);

    for (y, scanline) in filtered[..expected].chunks_exact(scanline_len).enumerate() {
        let filter = FilterType::try_from(scanline[0]).map_err(|filter| {
            CodecError::UnrecognizedFilter {
                filter,
                scanline: y as u32,
            }
        })?;
        let prior = if y == 0 {
            &zero_row[..]
        } else {
            &output[(y - 1) * row_bytes..y * row_bytes]
        };
        let row = filter.reconstruct(prior, &scanline[1..], stride);
        output.extend_from_slice(&row);
    }

    Ok(output)
}
