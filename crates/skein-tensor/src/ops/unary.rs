//! Unary elementwise operations on typed arrays

use ndarray::ArrayD;

use crate::dtype::{DType, Element, Primitive};
use crate::error::{Result, TensorError};

/// Elementwise unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// `-x`
    Negative,
    /// `|x|`
    Absolute,
    /// One where the element is zero, zero elsewhere
    LogicalNot,
    /// `e^x`
    Exp,
    /// Natural logarithm
    Log,
    /// Square root
    Sqrt,
    /// Sine
    Sin,
    /// Cosine
    Cos,
    /// Hyperbolic tangent
    Tanh,
    /// Round toward negative infinity
    Floor,
    /// Round toward positive infinity
    Ceil,
    /// Round to nearest, ties to even
    Rint,
    /// `1 / (1 + e^-x)`
    Sigmoid,
}

impl UnaryOp {
    /// Operation name used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Negative => "negative",
            UnaryOp::Absolute => "absolute",
            UnaryOp::LogicalNot => "logicalNot",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Rint => "rint",
            UnaryOp::Sigmoid => "sigmoid",
        }
    }

    /// Returns whether the operator is only defined for floating point types
    pub fn requires_float(self) -> bool {
        matches!(
            self,
            UnaryOp::Exp
                | UnaryOp::Log
                | UnaryOp::Sqrt
                | UnaryOp::Sin
                | UnaryOp::Cos
                | UnaryOp::Tanh
                | UnaryOp::Sigmoid
        )
    }

    /// Returns whether the operator accepts elements of `dtype`
    pub fn supports(self, dtype: DType) -> bool {
        match self {
            UnaryOp::Negative => dtype == DType::I32 || dtype.is_float(),
            op if op.requires_float() => dtype.is_float(),
            _ => true,
        }
    }

    fn apply_scalar<T: Element>(self, value: T) -> T {
        match self {
            // Unsupported types are rejected before any element is visited.
            UnaryOp::Negative => value.elem_neg().unwrap_or(value),
            UnaryOp::Absolute => value.elem_abs(),
            UnaryOp::LogicalNot => T::from_bool(!value.is_nonzero()),
            UnaryOp::Exp => map_f64(value, f64::exp),
            UnaryOp::Log => map_f64(value, f64::ln),
            UnaryOp::Sqrt => map_f64(value, f64::sqrt),
            UnaryOp::Sin => map_f64(value, f64::sin),
            UnaryOp::Cos => map_f64(value, f64::cos),
            UnaryOp::Tanh => map_f64(value, f64::tanh),
            UnaryOp::Sigmoid => map_f64(value, |x| 1.0 / (1.0 + (-x).exp())),
            UnaryOp::Floor if T::DTYPE.is_float() => map_f64(value, f64::floor),
            UnaryOp::Ceil if T::DTYPE.is_float() => map_f64(value, f64::ceil),
            UnaryOp::Rint if T::DTYPE.is_float() => map_f64(value, round_half_even),
            UnaryOp::Floor | UnaryOp::Ceil | UnaryOp::Rint => value,
        }
    }
}

fn map_f64<T: Element>(value: T, f: impl Fn(f64) -> f64) -> T {
    T::from_f64(f(value.to_f64()))
}

fn round_half_even(x: f64) -> f64 {
    let rounded = x.round();
    if (x - x.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - x.signum()
    } else {
        rounded
    }
}

/// Evaluates `op` over every element of `array` into a new array
pub fn apply<T: Element>(op: UnaryOp, array: &ArrayD<T>) -> Result<ArrayD<T>> {
    if !op.supports(T::DTYPE) {
        let suggestion = if op.requires_float() {
            "Convert the tensor to float32 or float64 with astype()"
        } else {
            "Convert the tensor to a signed type with astype()"
        };
        return Err(TensorError::unsupported_type(
            "TENSOR_UNARY_UNSUPPORTED_DTYPE",
            format!("{} is not defined for {}", op.name(), T::DTYPE),
            op.name(),
            &[T::DTYPE],
            suggestion,
        ));
    }
    Ok(array.mapv(|value| op.apply_scalar(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    #[test]
    fn test_float_functions() {
        let x = arr1(&[0.0f64, 1.0, 4.0]).into_dyn();
        let roots = apply(UnaryOp::Sqrt, &x).unwrap();
        assert_relative_eq!(roots[[2]], 2.0);
        let e = apply(UnaryOp::Exp, &x).unwrap();
        assert_relative_eq!(e[[1]], std::f64::consts::E);
        let s = apply(UnaryOp::Sigmoid, &arr1(&[0.0f32]).into_dyn()).unwrap();
        assert_relative_eq!(s[[0]], 0.5);
    }

    #[test]
    fn test_float_only_ops_reject_integers() {
        let x = arr1(&[1i32, 2]).into_dyn();
        let err = apply(UnaryOp::Log, &x).unwrap_err();
        assert!(err.is_type_error());
        assert_eq!(err.code(), "TENSOR_UNARY_UNSUPPORTED_DTYPE");
    }

    #[test]
    fn test_negative_support() {
        let x = arr1(&[1i32, -2, i32::MIN]).into_dyn();
        assert_eq!(apply(UnaryOp::Negative, &x).unwrap(), arr1(&[-1, 2, i32::MIN]).into_dyn());
        assert!(apply(UnaryOp::Negative, &arr1(&[1u32]).into_dyn()).is_err());
        assert!(apply(UnaryOp::Negative, &arr1(&[true]).into_dyn()).is_err());
    }

    #[test]
    fn test_rounding() {
        let x = arr1(&[0.5f64, 1.5, 2.5, -0.5, -1.7, 2.2]).into_dyn();
        assert_eq!(
            apply(UnaryOp::Rint, &x).unwrap(),
            arr1(&[0.0, 2.0, 2.0, -0.0, -2.0, 2.0]).into_dyn()
        );
        assert_eq!(apply(UnaryOp::Floor, &x).unwrap()[[4]], -2.0);
        assert_eq!(apply(UnaryOp::Ceil, &x).unwrap()[[5]], 3.0);
        let ints = arr1(&[3u32, 4]).into_dyn();
        assert_eq!(apply(UnaryOp::Floor, &ints).unwrap(), ints);
    }

    #[test]
    fn test_logical_not_and_abs() {
        let x = arr1(&[0i32, -3, 5]).into_dyn();
        assert_eq!(apply(UnaryOp::LogicalNot, &x).unwrap(), arr1(&[1, 0, 0]).into_dyn());
        assert_eq!(apply(UnaryOp::Absolute, &x).unwrap(), arr1(&[0, 3, 5]).into_dyn());
        let b = arr1(&[true, false]).into_dyn();
        assert_eq!(apply(UnaryOp::LogicalNot, &b).unwrap(), arr1(&[false, true]).into_dyn());
    }
}
