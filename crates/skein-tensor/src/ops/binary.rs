//! Binary elementwise operations on typed arrays

use ndarray::{ArrayD, ArrayViewD, IxDyn, Zip};

use crate::dtype::{Element, Primitive};
use crate::error::{Result, TensorError};
use crate::ops::reduce::extremum;
use crate::shape::Shape;

/// Elementwise binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `lhs + rhs`
    Add,
    /// `lhs - rhs`
    Sub,
    /// `lhs * rhs`
    Mul,
    /// `lhs / rhs`
    Div,
    /// `lhs == rhs`
    Eq,
    /// `lhs != rhs`
    Neq,
    /// `lhs < rhs`
    Lt,
    /// `lhs <= rhs`
    Le,
    /// `lhs > rhs`
    Gt,
    /// `lhs >= rhs`
    Ge,
    /// Elementwise minimum
    Minimum,
    /// Elementwise maximum
    Maximum,
}

impl BinaryOp {
    /// Operation name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Eq => "eq",
            BinaryOp::Neq => "neq",
            BinaryOp::Lt => "lessThan",
            BinaryOp::Le => "lessThanEqual",
            BinaryOp::Gt => "greaterThan",
            BinaryOp::Ge => "greaterThanEqual",
            BinaryOp::Minimum => "minimum",
            BinaryOp::Maximum => "maximum",
        }
    }

    /// Applies the operator to one pair of elements. `None` signals a zero
    /// divisor for a type that cannot represent the quotient.
    pub fn apply_scalar<T: Element>(self, a: T, b: T) -> Option<T> {
        Some(match self {
            BinaryOp::Add => a.elem_add(b),
            BinaryOp::Sub => a.elem_sub(b),
            BinaryOp::Mul => a.elem_mul(b),
            BinaryOp::Div => return a.elem_div(b),
            BinaryOp::Eq => T::from_bool(a == b),
            BinaryOp::Neq => T::from_bool(a != b),
            BinaryOp::Lt => T::from_bool(a < b),
            BinaryOp::Le => T::from_bool(a <= b),
            BinaryOp::Gt => T::from_bool(a > b),
            BinaryOp::Ge => T::from_bool(a >= b),
            BinaryOp::Minimum => extremum(a, b, |x, y| x < y),
            BinaryOp::Maximum => extremum(a, b, |x, y| x > y),
        })
    }
}

/// Resolves the output shape of `lhs op rhs`
pub fn result_shape(op: BinaryOp, lhs: &[usize], rhs: &[usize], allow_broadcast: bool) -> Result<Shape> {
    if lhs == rhs {
        return Ok(Shape::from_slice(lhs));
    }
    if !allow_broadcast {
        return Err(TensorError::incompatible_shapes(
            "TENSOR_BINARY_SHAPE_MISMATCH",
            "Operands must have identical shapes when broadcasting is disabled",
            op.name(),
            format!("{:?}", lhs),
            format!("{:?}", rhs),
            "Reshape the operands or enable allow_broadcast",
        ));
    }
    Shape::from_slice(lhs).broadcast_shape(&Shape::from_slice(rhs))
}

fn broadcast_view<'a, T>(op: BinaryOp, array: &'a ArrayD<T>, shape: &Shape) -> Result<ArrayViewD<'a, T>> {
    array.broadcast(IxDyn(shape.dims())).ok_or_else(|| {
        TensorError::incompatible_shapes(
            "TENSOR_BROADCAST_INCOMPATIBLE",
            format!("Cannot broadcast operand to the result shape {}", shape),
            op.name(),
            format!("{:?}", array.shape()),
            shape.to_string(),
            "Ensure shapes follow broadcasting rules",
        )
    })
}

fn combine<T: Element>(op: BinaryOp, lhs: ArrayViewD<'_, T>, rhs: ArrayViewD<'_, T>) -> Result<ArrayD<T>> {
    let mut divided_by_zero = false;
    let result = Zip::from(lhs).and(rhs).map_collect(|&a, &b| {
        op.apply_scalar(a, b).unwrap_or_else(|| {
            divided_by_zero = true;
            T::zero()
        })
    });
    if divided_by_zero {
        return Err(TensorError::division_by_zero(op.name(), T::DTYPE));
    }
    Ok(result)
}

/// Evaluates `lhs op rhs` into a new array, broadcasting when allowed
pub fn apply<T: Element>(op: BinaryOp, lhs: &ArrayD<T>, rhs: &ArrayD<T>, allow_broadcast: bool) -> Result<ArrayD<T>> {
    let shape = result_shape(op, lhs.shape(), rhs.shape(), allow_broadcast)?;
    let lhs = broadcast_view(op, lhs, &shape)?;
    let rhs = broadcast_view(op, rhs, &shape)?;
    combine(op, lhs, rhs)
}

/// Evaluates `target = target op rhs`. `rhs` must broadcast to the shape of
/// `target`; `target` is left untouched when the operation fails.
pub fn apply_in_place<T: Element>(op: BinaryOp, target: &mut ArrayD<T>, rhs: &ArrayD<T>) -> Result<()> {
    let shape = Shape::from_slice(target.shape());
    let rhs = broadcast_view(op, rhs, &shape)?;
    let result = combine(op, target.view(), rhs)?;
    *target = result;
    Ok(())
}

/// Overwrites `target` with `source` broadcast to the shape of `target`
pub fn assign<T: Element>(target: &mut ArrayD<T>, source: &ArrayD<T>) -> Result<()> {
    let shape = Shape::from_slice(target.shape());
    let source = array_view_for_assign(source, &shape)?;
    target.assign(&source);
    Ok(())
}

fn array_view_for_assign<'a, T>(source: &'a ArrayD<T>, shape: &Shape) -> Result<ArrayViewD<'a, T>> {
    source.broadcast(IxDyn(shape.dims())).ok_or_else(|| {
        TensorError::incompatible_shapes(
            "TENSOR_ASSIGN_SHAPE_MISMATCH",
            "Source cannot be broadcast to the shape of the destination",
            "assign",
            shape.to_string(),
            format!("{:?}", source.shape()),
            "Assign from a tensor with the same shape or a broadcastable one",
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};

    #[test]
    fn test_add_same_shape() {
        let a = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let b = arr2(&[[5.0f32, 6.0], [7.0, 8.0]]).into_dyn();
        let c = apply(BinaryOp::Add, &a, &b, true).unwrap();
        assert_eq!(c, arr2(&[[6.0f32, 8.0], [10.0, 12.0]]).into_dyn());
    }

    #[test]
    fn test_comparisons_keep_element_type() {
        let a = arr1(&[-1i32, 0, 5]).into_dyn();
        let b = arr1(&[0i32, 0, 2]).into_dyn();
        assert_eq!(apply(BinaryOp::Lt, &a, &b, true).unwrap(), arr1(&[1, 0, 0]).into_dyn());
        assert_eq!(apply(BinaryOp::Ge, &a, &b, true).unwrap(), arr1(&[0, 1, 1]).into_dyn());
        assert_eq!(apply(BinaryOp::Maximum, &a, &b, true).unwrap(), arr1(&[0, 0, 5]).into_dyn());
    }

    #[test]
    fn test_minimum_maximum_propagate_nan_from_either_side() {
        let a = arr1(&[f64::NAN, 1.0, 2.0]).into_dyn();
        let b = arr1(&[1.0, f64::NAN, 3.0]).into_dyn();
        for op in [BinaryOp::Minimum, BinaryOp::Maximum] {
            let ab = apply(op, &a, &b, true).unwrap();
            let ba = apply(op, &b, &a, true).unwrap();
            assert!(ab[[0]].is_nan() && ab[[1]].is_nan());
            assert!(ba[[0]].is_nan() && ba[[1]].is_nan());
            assert_eq!(ab[[2]], ba[[2]]);
        }
        assert_eq!(apply(BinaryOp::Minimum, &a, &b, true).unwrap()[[2]], 2.0);
        assert_eq!(apply(BinaryOp::Maximum, &a, &b, true).unwrap()[[2]], 3.0);
    }

    #[test]
    fn test_broadcast_row() {
        let a = arr2(&[[1u32, 2, 3], [4, 5, 6]]).into_dyn();
        let b = arr1(&[10u32, 20, 30]).into_dyn();
        let c = apply(BinaryOp::Mul, &a, &b, true).unwrap();
        assert_eq!(c, arr2(&[[10, 40, 90], [40, 100, 180]]).into_dyn());
        assert!(apply(BinaryOp::Mul, &a, &b, false).is_err());
    }

    #[test]
    fn test_integer_division_by_zero() {
        let a = arr1(&[4i32, 6]).into_dyn();
        let b = arr1(&[2i32, 0]).into_dyn();
        let err = apply(BinaryOp::Div, &a, &b, true).unwrap_err();
        assert_eq!(err.code(), "TENSOR_DIVISION_BY_ZERO");

        let x = arr1(&[1.0f64]).into_dyn();
        let zero = arr1(&[0.0f64]).into_dyn();
        assert!(apply(BinaryOp::Div, &x, &zero, true).unwrap()[[0]].is_infinite());
    }

    #[test]
    fn test_in_place_is_atomic() {
        let mut target = arr1(&[8u32, 9]).into_dyn();
        let divisor = arr1(&[2u32, 0]).into_dyn();
        assert!(apply_in_place(BinaryOp::Div, &mut target, &divisor).is_err());
        assert_eq!(target, arr1(&[8u32, 9]).into_dyn());

        apply_in_place(BinaryOp::Sub, &mut target, &arr0(1u32).into_dyn()).unwrap();
        assert_eq!(target, arr1(&[7u32, 8]).into_dyn());
    }

    #[test]
    fn test_assign_broadcasts_source() {
        let mut target = arr2(&[[0i32, 0], [0, 0]]).into_dyn();
        assign(&mut target, &arr1(&[1i32, 2]).into_dyn()).unwrap();
        assert_eq!(target, arr2(&[[1, 2], [1, 2]]).into_dyn());
        assert!(assign(&mut target, &arr1(&[1i32, 2, 3]).into_dyn()).is_err());
    }
}
