//! Typed decoding of frame rows.

use smallvec::SmallVec;

use super::Frame;
use crate::{Error, Result};

/// A record that can be read out of a frame row.
///
/// `COLUMNS` names the cells the record needs; `from_row` receives them
/// in that order regardless of the frame's own column order.
pub trait FromRow: Sized {
    const COLUMNS: &'static [&'static str];

    fn from_row(cells: &[Option<&str>]) -> Result<Self>;
}

/// Decode every row of `frame` as `T`.
pub fn decode<T: FromRow>(frame: &Frame) -> Result<Vec<T>> {
    let indices = T::COLUMNS
        .iter()
        .map(|c| frame.column_index(*c))
        .collect::<Result<SmallVec<[usize; 9]>>>()?;
    frame
        .iter()
        .map(|r| {
            let cells: SmallVec<[Option<&str>; 9]> =
                indices.iter().map(|&i| r[i].as_deref()).collect();
            T::from_row(&cells)
        })
        .collect()
}

/// Fetch a cell that must not be null.
pub(crate) fn required(cells: &[Option<&str>], index: usize, column: &str) -> Result<String> {
    cells
        .get(index)
        .copied()
        .flatten()
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidFrame(format!("null in required column '{column}'")))
}

/// Fetch a nullable cell.
pub(crate) fn optional(cells: &[Option<&str>], index: usize) -> Option<String> {
    cells.get(index).copied().flatten().map(str::to_string)
}
