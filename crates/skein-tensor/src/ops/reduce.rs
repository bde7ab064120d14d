//! Reductions over one or more axes of a typed array

use ndarray::{ArrayD, ArrayView1, Axis};

use crate::dtype::{Element, Primitive};
use crate::error::{Result, TensorError};

/// Axis reductions. The result keeps the element type of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    /// Sum of the elements (wrapping for integers, OR for bool)
    Sum,
    /// Smallest element, NaN propagates
    Min,
    /// Largest element, NaN propagates
    Max,
    /// One if any element is non-zero
    Any,
    /// One if every element is non-zero
    All,
}

impl ReduceOp {
    /// Operation name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ReduceOp::Sum => "sum",
            ReduceOp::Min => "amin",
            ReduceOp::Max => "amax",
            ReduceOp::Any => "any",
            ReduceOp::All => "all",
        }
    }

    fn reduce_lane<T: Element>(self, lane: ArrayView1<'_, T>) -> Option<T> {
        match self {
            ReduceOp::Sum => Some(lane.iter().fold(T::zero(), |acc, &x| acc.elem_add(x))),
            ReduceOp::Any => Some(T::from_bool(lane.iter().any(|x| x.is_nonzero()))),
            ReduceOp::All => Some(T::from_bool(lane.iter().all(|x| x.is_nonzero()))),
            ReduceOp::Min => lane.iter().copied().reduce(|acc, x| extremum(acc, x, |a, b| a < b)),
            ReduceOp::Max => lane.iter().copied().reduce(|acc, x| extremum(acc, x, |a, b| a > b)),
        }
    }
}

fn is_nan<T: PartialOrd>(value: &T) -> bool {
    value.partial_cmp(value).is_none()
}

/// Picks `x` over `acc` when `better` holds. NaN wins from either side.
pub(crate) fn extremum<T: PartialOrd>(acc: T, x: T, better: fn(&T, &T) -> bool) -> T {
    if is_nan(&acc) {
        acc
    } else if is_nan(&x) || better(&x, &acc) {
        x
    } else {
        acc
    }
}

/// Checks `axes` against `ndim` and returns them sorted ascending. An empty
/// list selects every axis.
pub fn normalize_axes(op: &str, axes: &[usize], ndim: usize) -> Result<Vec<usize>> {
    if axes.is_empty() {
        return Ok((0..ndim).collect());
    }
    let mut sorted = axes.to_vec();
    sorted.sort_unstable();
    for (i, &axis) in sorted.iter().enumerate() {
        if axis >= ndim {
            return Err(TensorError::out_of_bounds(
                "REDUCE_AXIS_OUT_OF_RANGE",
                format!("Axis {} does not exist in a tensor with {} dimensions", axis, ndim),
                axis as isize,
                axis,
                ndim,
                op,
            ));
        }
        if i > 0 && sorted[i - 1] == axis {
            return Err(TensorError::invalid_shape(
                "REDUCE_DUPLICATE_AXIS",
                format!("Axis {} is listed more than once", axis),
                format!("{:?}", axes),
                op,
                "List each axis at most once",
            ));
        }
    }
    Ok(sorted)
}

/// Reduces `array` over `axes` (every axis when empty). With `keep_dims` the
/// reduced axes stay in the result with length one.
pub fn apply<T: Element>(op: ReduceOp, array: &ArrayD<T>, axes: &[usize], keep_dims: bool) -> Result<ArrayD<T>> {
    let axes = normalize_axes(op.name(), axes, array.ndim())?;

    let mut result = array.clone();
    let mut empty_lane = false;
    for &axis in axes.iter().rev() {
        result = result.map_axis(Axis(axis), |lane| {
            op.reduce_lane(lane).unwrap_or_else(|| {
                empty_lane = true;
                T::zero()
            })
        });
    }
    if empty_lane {
        return Err(TensorError::invalid_shape(
            "REDUCE_EMPTY_AXIS",
            format!("{} has no identity and the reduced axis is empty", op.name()),
            format!("{:?}", array.shape()),
            op.name(),
            "Reduce over non-empty axes or use sum/any/all",
        ));
    }

    if keep_dims {
        for &axis in &axes {
            result.insert_axis_inplace(Axis(axis));
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2, Array};

    #[test]
    fn test_sum_all_axes() {
        let x = arr2(&[[1i32, 2, 3], [4, 5, 6]]).into_dyn();
        let total = apply(ReduceOp::Sum, &x, &[], false).unwrap();
        assert_eq!(total, arr0(21).into_dyn());
        let kept = apply(ReduceOp::Sum, &x, &[], true).unwrap();
        assert_eq!(kept.shape(), &[1, 1]);
    }

    #[test]
    fn test_single_axis() {
        let x = arr2(&[[1.0f32, 5.0, 3.0], [4.0, 2.0, 6.0]]).into_dyn();
        assert_eq!(apply(ReduceOp::Max, &x, &[0], false).unwrap(), arr1(&[4.0, 5.0, 6.0]).into_dyn());
        assert_eq!(apply(ReduceOp::Min, &x, &[1], false).unwrap(), arr1(&[1.0, 2.0]).into_dyn());
        let kept = apply(ReduceOp::Sum, &x, &[1], true).unwrap();
        assert_eq!(kept, arr2(&[[9.0], [12.0]]).into_dyn());
    }

    #[test]
    fn test_multiple_axes() {
        let x = Array::from_shape_vec((2, 3, 4), (0..24u32).collect()).unwrap().into_dyn();
        let reduced = apply(ReduceOp::Sum, &x, &[2, 0], false).unwrap();
        assert_eq!(reduced, arr1(&[60u32, 92, 124]).into_dyn());
        let kept = apply(ReduceOp::Sum, &x, &[0, 2], true).unwrap();
        assert_eq!(kept.shape(), &[1, 3, 1]);
    }

    #[test]
    fn test_any_all() {
        let x = arr2(&[[0i32, 0], [0, 7]]).into_dyn();
        assert_eq!(apply(ReduceOp::Any, &x, &[1], false).unwrap(), arr1(&[0, 1]).into_dyn());
        assert_eq!(apply(ReduceOp::All, &x, &[], false).unwrap(), arr0(0).into_dyn());
        let empty = Array::<bool, _>::from_elem((0,), true).into_dyn();
        assert_eq!(apply(ReduceOp::All, &empty, &[], false).unwrap(), arr0(true).into_dyn());
    }

    #[test]
    fn test_nan_propagates() {
        let x = arr1(&[1.0f64, f64::NAN, -3.0]).into_dyn();
        assert!(apply(ReduceOp::Min, &x, &[], false).unwrap()[[]].is_nan());
        assert!(apply(ReduceOp::Max, &x, &[], false).unwrap()[[]].is_nan());
    }

    #[test]
    fn test_invalid_axes() {
        let x = arr1(&[1i32, 2]).into_dyn();
        assert!(matches!(
            apply(ReduceOp::Sum, &x, &[1], false),
            Err(TensorError::OutOfBounds { .. })
        ));
        assert!(apply(ReduceOp::Sum, &arr2(&[[1i32]]).into_dyn(), &[0, 0], false).is_err());
        let empty = Array::<f32, _>::zeros((0,)).into_dyn();
        assert_eq!(
            apply(ReduceOp::Max, &empty, &[], false).unwrap_err().code(),
            "REDUCE_EMPTY_AXIS"
        );
    }
}
