//! Element type tags and the mapping between Rust element types and `DType`

use std::fmt;
use std::str::FromStr;

use ndarray::ArrayD;
use num_traits::{AsPrimitive, Float, One, WrappingAdd, WrappingMul, WrappingSub, Zero};
use serde::{Deserialize, Serialize};

use crate::erased::ErasedArray;
use crate::error::{Result, TensorError};

mod private {
    pub trait Sealed {}
}

/// Per-element arithmetic with the semantics every dispatch path relies on.
///
/// Integers wrap on overflow and report a zero divisor through `None`. Floats
/// follow IEEE-754. Booleans behave like 0/1 integers converted back to bool.
pub trait Primitive: Copy + PartialOrd + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Additive identity
    fn zero() -> Self;
    /// Multiplicative identity
    fn one() -> Self;
    /// Lossless widening to `f64` (bool maps to 0.0/1.0)
    fn to_f64(self) -> f64;
    /// Narrowing from `f64`; integers saturate and NaN becomes zero
    fn from_f64(value: f64) -> Self;
    /// Element addition
    fn elem_add(self, rhs: Self) -> Self;
    /// Element subtraction
    fn elem_sub(self, rhs: Self) -> Self;
    /// Element multiplication
    fn elem_mul(self, rhs: Self) -> Self;
    /// Element division, `None` when the divisor is zero and the type has no
    /// representation for the result
    fn elem_div(self, rhs: Self) -> Option<Self>;
    /// Negation, `None` for types without a signed representation
    fn elem_neg(self) -> Option<Self>;
    /// Absolute value
    fn elem_abs(self) -> Self;
    /// Whether the value counts as true
    fn is_nonzero(self) -> bool;

    /// One for `true`, zero for `false`
    fn from_bool(value: bool) -> Self {
        if value {
            Self::one()
        } else {
            Self::zero()
        }
    }
}

impl Primitive for bool {
    fn zero() -> Self {
        false
    }

    fn one() -> Self {
        true
    }

    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }

    fn from_f64(value: f64) -> Self {
        value != 0.0 && !value.is_nan()
    }

    fn elem_add(self, rhs: Self) -> Self {
        self || rhs
    }

    fn elem_sub(self, rhs: Self) -> Self {
        self != rhs
    }

    fn elem_mul(self, rhs: Self) -> Self {
        self && rhs
    }

    fn elem_div(self, rhs: Self) -> Option<Self> {
        rhs.then_some(self)
    }

    fn elem_neg(self) -> Option<Self> {
        None
    }

    fn elem_abs(self) -> Self {
        self
    }

    fn is_nonzero(self) -> bool {
        self
    }
}

impl Primitive for i32 {
    fn zero() -> Self {
        Zero::zero()
    }

    fn one() -> Self {
        One::one()
    }

    fn to_f64(self) -> f64 {
        self.as_()
    }

    fn from_f64(value: f64) -> Self {
        value.as_()
    }

    fn elem_add(self, rhs: Self) -> Self {
        WrappingAdd::wrapping_add(&self, &rhs)
    }

    fn elem_sub(self, rhs: Self) -> Self {
        WrappingSub::wrapping_sub(&self, &rhs)
    }

    fn elem_mul(self, rhs: Self) -> Self {
        WrappingMul::wrapping_mul(&self, &rhs)
    }

    fn elem_div(self, rhs: Self) -> Option<Self> {
        (rhs != 0).then(|| self.wrapping_div(rhs))
    }

    fn elem_neg(self) -> Option<Self> {
        Some(self.wrapping_neg())
    }

    fn elem_abs(self) -> Self {
        self.wrapping_abs()
    }

    fn is_nonzero(self) -> bool {
        self != 0
    }
}

impl Primitive for u32 {
    fn zero() -> Self {
        Zero::zero()
    }

    fn one() -> Self {
        One::one()
    }

    fn to_f64(self) -> f64 {
        self.as_()
    }

    fn from_f64(value: f64) -> Self {
        value.as_()
    }

    fn elem_add(self, rhs: Self) -> Self {
        WrappingAdd::wrapping_add(&self, &rhs)
    }

    fn elem_sub(self, rhs: Self) -> Self {
        WrappingSub::wrapping_sub(&self, &rhs)
    }

    fn elem_mul(self, rhs: Self) -> Self {
        WrappingMul::wrapping_mul(&self, &rhs)
    }

    fn elem_div(self, rhs: Self) -> Option<Self> {
        self.checked_div(rhs)
    }

    fn elem_neg(self) -> Option<Self> {
        None
    }

    fn elem_abs(self) -> Self {
        self
    }

    fn is_nonzero(self) -> bool {
        self != 0
    }
}

macro_rules! impl_float_primitive {
    ($($t:ty),*) => {
        $(
            impl Primitive for $t {
                fn zero() -> Self {
                    Zero::zero()
                }

                fn one() -> Self {
                    One::one()
                }

                fn to_f64(self) -> f64 {
                    self.as_()
                }

                fn from_f64(value: f64) -> Self {
                    value.as_()
                }

                fn elem_add(self, rhs: Self) -> Self {
                    self + rhs
                }

                fn elem_sub(self, rhs: Self) -> Self {
                    self - rhs
                }

                fn elem_mul(self, rhs: Self) -> Self {
                    self * rhs
                }

                fn elem_div(self, rhs: Self) -> Option<Self> {
                    Some(self / rhs)
                }

                fn elem_neg(self) -> Option<Self> {
                    Some(-self)
                }

                fn elem_abs(self) -> Self {
                    Float::abs(self)
                }

                fn is_nonzero(self) -> bool {
                    self != 0.0
                }
            }
        )*
    };
}

impl_float_primitive!(f32, f64);

/// A Rust type that can be stored in a tensor.
///
/// Implemented exactly for the types listed by `for_each_element_type!`;
/// the trait is sealed.
pub trait Element:
    Primitive + bytemuck::NoUninit + bytemuck::CheckedBitPattern + private::Sealed
{
    /// The runtime tag for this type
    const DTYPE: DType;

    /// Moves a typed array into the erased container
    fn wrap(array: ArrayD<Self>) -> ErasedArray;

    /// Borrows the payload when `erased` holds this type
    fn downcast_ref(erased: &ErasedArray) -> Option<&ArrayD<Self>>;

    /// Mutably borrows the payload when `erased` holds this type
    fn downcast_mut(erased: &mut ErasedArray) -> Option<&mut ArrayD<Self>>;

    /// Takes the payload out, handing the container back on a type mismatch
    fn downcast_owned(erased: ErasedArray) -> std::result::Result<ArrayD<Self>, ErasedArray>;

    /// Tags a single value
    fn into_scalar(self) -> Scalar;
}

macro_rules! define_element_types {
    ([] $(($variant:ident, $ty:ty, $name:literal, $doc:literal)),* $(,)?) => {
        /// Runtime tag identifying the element type of an array
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum DType {
            $(#[doc = $doc] $variant,)*
        }

        impl DType {
            /// Every supported element type
            pub const ALL: &'static [DType] = &[$(DType::$variant),*];

            /// Canonical name used in diagnostics and configuration
            pub const fn name(self) -> &'static str {
                match self {
                    $(DType::$variant => $name,)*
                }
            }

            /// Size of one element in bytes
            pub const fn size_in_bytes(self) -> usize {
                match self {
                    $(DType::$variant => std::mem::size_of::<$ty>(),)*
                }
            }
        }

        /// A single tagged value of any supported element type
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum Scalar {
            $(#[doc = $doc] $variant($ty),)*
        }

        impl Scalar {
            /// The element type of the stored value
            pub fn dtype(&self) -> DType {
                match self {
                    $(Scalar::$variant(_) => DType::$variant,)*
                }
            }

            /// The value widened to `f64`
            pub fn to_f64(&self) -> f64 {
                match *self {
                    $(Scalar::$variant(value) => Primitive::to_f64(value),)*
                }
            }

            /// Native-endian byte representation of the value
            pub fn to_ne_bytes(&self) -> Vec<u8> {
                match self {
                    $(Scalar::$variant(value) => {
                        bytemuck::cast_slice::<$ty, u8>(std::slice::from_ref(value)).to_vec()
                    })*
                }
            }
        }

        impl fmt::Display for Scalar {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Scalar::$variant(value) => fmt::Display::fmt(value, f),)*
                }
            }
        }

        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }

            impl private::Sealed for $ty {}

            impl Element for $ty {
                const DTYPE: DType = DType::$variant;

                fn wrap(array: ArrayD<Self>) -> ErasedArray {
                    ErasedArray::$variant(array)
                }

                fn downcast_ref(erased: &ErasedArray) -> Option<&ArrayD<Self>> {
                    match erased {
                        ErasedArray::$variant(array) => Some(array),
                        _ => None,
                    }
                }

                fn downcast_mut(erased: &mut ErasedArray) -> Option<&mut ArrayD<Self>> {
                    match erased {
                        ErasedArray::$variant(array) => Some(array),
                        _ => None,
                    }
                }

                fn downcast_owned(erased: ErasedArray) -> std::result::Result<ArrayD<Self>, ErasedArray> {
                    match erased {
                        ErasedArray::$variant(array) => Ok(array),
                        other => Err(other),
                    }
                }

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }
            }
        )*
    };
}

for_each_element_type!(define_element_types);

impl DType {
    /// Returns whether this is a floating point type
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Returns whether this is an integer type
    pub fn is_integer(self) -> bool {
        matches!(self, DType::I32 | DType::U32)
    }

    /// Returns whether this is the boolean type
    pub fn is_bool(self) -> bool {
        self == DType::Bool
    }

    /// Returns the tag of a Rust element type
    pub fn of<T: Element>() -> Self {
        T::DTYPE
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DType {
    type Err = TensorError;

    fn from_str(s: &str) -> Result<Self> {
        let alias = match s {
            "b8" => Some(DType::Bool),
            "s32" | "i32" => Some(DType::I32),
            "u32" => Some(DType::U32),
            "f32" => Some(DType::F32),
            "f64" => Some(DType::F64),
            _ => None,
        };
        alias
            .or_else(|| DType::ALL.iter().copied().find(|dtype| dtype.name() == s))
            .ok_or_else(|| TensorError::UnsupportedType {
                code: "DTYPE_UNKNOWN_NAME",
                message: format!("'{}' does not name a supported element type", s),
                operation: "dtype parsing".to_string(),
                dtypes: s.to_string(),
                suggestion: "Use one of bool, int32, uint32, float32, float64".to_string(),
            })
    }
}

impl TryFrom<String> for DType {
    type Error = TensorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DType> for String {
    fn from(dtype: DType) -> Self {
        dtype.name().to_string()
    }
}

impl Scalar {
    /// Converts the value to element type `T` through an `f64` pivot
    pub fn cast<T: Element>(&self) -> T {
        T::from_f64(self.to_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_round_trip() {
        assert_eq!(DType::of::<bool>(), DType::Bool);
        assert_eq!(DType::of::<i32>(), DType::I32);
        assert_eq!(DType::of::<u32>(), DType::U32);
        assert_eq!(DType::of::<f32>(), DType::F32);
        assert_eq!(DType::of::<f64>(), DType::F64);
        assert_eq!(DType::ALL.len(), 5);
        for dtype in DType::ALL {
            assert_eq!(dtype.name().parse::<DType>().unwrap(), *dtype);
        }
    }

    #[test]
    fn test_sizes_and_names() {
        assert_eq!(DType::Bool.size_in_bytes(), 1);
        assert_eq!(DType::I32.size_in_bytes(), 4);
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::F32.to_string(), "float32");
        assert_eq!("s32".parse::<DType>().unwrap(), DType::I32);
        assert!("f16".parse::<DType>().unwrap_err().is_type_error());
    }

    #[test]
    fn test_integer_edge_arithmetic() {
        assert_eq!(i32::MAX.elem_add(1), i32::MIN);
        assert_eq!(0u32.elem_sub(1), u32::MAX);
        assert_eq!(i32::MIN.elem_div(-1), Some(i32::MIN));
        assert_eq!(7i32.elem_div(0), None);
        assert_eq!(7u32.elem_div(0), None);
        assert_eq!((-7i32).elem_div(2), Some(-3));
        assert_eq!(5u32.elem_neg(), None);
    }

    #[test]
    fn test_bool_arithmetic() {
        assert!(true.elem_add(false));
        assert!(!true.elem_sub(true));
        assert!(false.elem_sub(true));
        assert!(!true.elem_mul(false));
        assert_eq!(true.elem_div(false), None);
        assert_eq!(false.elem_div(true), Some(false));
    }

    #[test]
    fn test_scalar_cast_saturates() {
        assert_eq!(Scalar::from(3.9f64).cast::<i32>(), 3);
        assert_eq!(Scalar::from(-1.0f32).cast::<u32>(), 0);
        assert_eq!(Scalar::from(f64::NAN).cast::<i32>(), 0);
        assert!(Scalar::from(2u32).cast::<bool>());
        assert_eq!(Scalar::from(true).cast::<f32>(), 1.0);
        assert_eq!(Scalar::from(7i32).to_ne_bytes(), 7i32.to_ne_bytes().to_vec());
    }

    #[test]
    fn test_dtype_serde_uses_names() {
        #[derive(Serialize, Deserialize)]
        struct Holder {
            dtype: DType,
        }
        let holder: Holder = toml::from_str("dtype = \"uint32\"").unwrap();
        assert_eq!(holder.dtype, DType::U32);
        let text = toml::to_string(&Holder { dtype: DType::F64 }).unwrap();
        assert!(text.contains("float64"));
    }
}
