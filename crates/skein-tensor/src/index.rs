//! Index descriptors and their application to array views

use ndarray::{ArrayViewD, Axis, Slice};

use crate::error::{Result, TensorError};

/// One entry of an indexing expression, applied to one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Index {
    /// Selects a single position and drops the axis. Negative values count
    /// from the end.
    Scalar(isize),
    /// Selects `start..end` with the given stride. Negative bounds count from
    /// the end, `end: None` means the end of the axis. A negative stride walks
    /// the selected range backwards.
    Range {
        /// First position, inclusive
        start: isize,
        /// Last position, exclusive
        end: Option<isize>,
        /// Step between positions, never zero
        stride: isize,
    },
    /// Selects the whole axis
    Span,
}

impl Index {
    /// `start..end` with unit stride
    pub fn range(start: isize, end: isize) -> Self {
        Index::Range { start, end: Some(end), stride: 1 }
    }

    /// `start..end` with an explicit stride
    pub fn range_step(start: isize, end: isize, stride: isize) -> Self {
        Index::Range { start, end: Some(end), stride }
    }
}

impl From<isize> for Index {
    fn from(position: isize) -> Self {
        Index::Scalar(position)
    }
}

impl From<std::ops::Range<isize>> for Index {
    fn from(range: std::ops::Range<isize>) -> Self {
        Index::range(range.start, range.end)
    }
}

impl From<std::ops::RangeFull> for Index {
    fn from(_: std::ops::RangeFull) -> Self {
        Index::Span
    }
}

/// Resolves a possibly negative position against an axis of length `len`.
/// `inclusive_end` admits `len` itself, as range bounds do.
fn resolve(position: isize, len: usize, dim: usize, inclusive_end: bool) -> Result<usize> {
    let resolved = if position < 0 { position + len as isize } else { position };
    let limit = if inclusive_end { len as isize } else { len as isize - 1 };
    if resolved < 0 || resolved > limit {
        return Err(TensorError::out_of_bounds(
            "INDEX_OUT_OF_BOUNDS",
            format!("Index {} is out of range for axis {} of size {}", position, dim, len),
            position,
            dim,
            len,
            "tensor indexing",
        ));
    }
    Ok(resolved as usize)
}

/// Applies `indices` to `view`, one entry per leading axis. Axes without an
/// entry are kept whole.
pub(crate) fn select<'a, T>(view: ArrayViewD<'a, T>, indices: &[Index]) -> Result<ArrayViewD<'a, T>> {
    if indices.len() > view.ndim() {
        return Err(TensorError::invalid_shape(
            "INDEX_TOO_MANY_INDICES",
            format!(
                "{} indices given for a tensor with {} dimensions",
                indices.len(),
                view.ndim()
            ),
            format!("{:?}", view.shape()),
            "tensor indexing",
            "Pass at most one index per dimension",
        ));
    }

    let mut view = view;
    let mut axis = 0;
    for (dim, index) in indices.iter().enumerate() {
        let len = view.len_of(Axis(axis));
        match *index {
            Index::Scalar(position) => {
                let position = resolve(position, len, dim, false)?;
                view = view.index_axis_move(Axis(axis), position);
            }
            Index::Range { start, end, stride } => {
                if stride == 0 {
                    return Err(TensorError::invalid_shape(
                        "INDEX_ZERO_STRIDE",
                        "Range stride cannot be zero",
                        format!("{:?}", view.shape()),
                        "tensor indexing",
                        "Use a positive or negative stride",
                    ));
                }
                let start = resolve(start, len, dim, true)?;
                let end = match end {
                    Some(end) => resolve(end, len, dim, true)?,
                    None => len,
                };
                let end = end.max(start);
                view.slice_axis_inplace(
                    Axis(axis),
                    Slice::new(start as isize, Some(end as isize), stride),
                );
                axis += 1;
            }
            Index::Span => axis += 1,
        }
    }
    Ok(view)
}
