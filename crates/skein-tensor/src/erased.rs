//! Type-erased storage for an `ndarray` value of any supported element type
//!
//! `ErasedArray` is a closed sum type: one variant per element type, each
//! owning an `ArrayD<T>`. Recovering the typed array is a checked match that
//! fails with `TensorError::TypeMismatch` instead of yielding an invalid view.

use ndarray::{ArrayD, IxDyn};

use crate::dtype::{DType, Element, Primitive};
use crate::error::{Result, TensorError};

macro_rules! define_erased_array {
    ([] $(($variant:ident, $ty:ty, $name:literal, $doc:literal)),* $(,)?) => {
        /// An `ndarray` array holding one of the supported element types
        #[derive(Debug, Clone, PartialEq)]
        pub enum ErasedArray {
            $(#[doc = $doc] $variant(ArrayD<$ty>),)*
        }
    };
}

for_each_element_type!(define_erased_array);

impl ErasedArray {
    /// Moves a typed array into the container
    pub fn wrap<T: Element>(array: ArrayD<T>) -> Self {
        T::wrap(array)
    }

    /// Builds an array of `dtype` filled with `value` converted to that type
    pub fn from_elem(dtype: DType, dims: &[usize], value: f64) -> Self {
        dispatch_dtype!(dtype, T => Self::wrap(ArrayD::from_elem(IxDyn(dims), T::from_f64(value))))
    }

    /// The element type of the stored array
    pub fn dtype(&self) -> DType {
        dispatch_erased!(self, array => dtype_of(array))
    }

    /// Dimensions of the stored array
    pub fn shape(&self) -> &[usize] {
        dispatch_erased!(self, array => array.shape())
    }

    /// Number of dimensions
    pub fn ndim(&self) -> usize {
        dispatch_erased!(self, array => array.ndim())
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        dispatch_erased!(self, array => array.len())
    }

    /// Returns whether the array holds no elements
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the typed array, failing when `T` is not the stored type
    pub fn downcast_ref<T: Element>(&self) -> Result<&ArrayD<T>> {
        match T::downcast_ref(self) {
            Some(array) => Ok(array),
            None => Err(TensorError::type_mismatch(T::DTYPE, self.dtype(), "downcast_ref")),
        }
    }

    /// Mutably borrows the typed array, failing when `T` is not the stored type
    pub fn downcast_mut<T: Element>(&mut self) -> Result<&mut ArrayD<T>> {
        let actual = self.dtype();
        T::downcast_mut(self)
            .ok_or_else(|| TensorError::type_mismatch(T::DTYPE, actual, "downcast_mut"))
    }

    /// Takes the typed array out, failing when `T` is not the stored type
    pub fn into_typed<T: Element>(self) -> Result<ArrayD<T>> {
        T::downcast_owned(self)
            .map_err(|erased| TensorError::type_mismatch(T::DTYPE, erased.dtype(), "into_typed"))
    }

    /// Converts every element to `dtype` through an `f64` pivot
    pub fn cast(&self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            return self.clone();
        }
        dispatch_erased!(self, array => cast_array(array, dtype))
    }
}

fn dtype_of<T: Element>(_array: &ArrayD<T>) -> DType {
    T::DTYPE
}

fn cast_array<S: Element>(array: &ArrayD<S>, dtype: DType) -> ErasedArray {
    dispatch_dtype!(dtype, T => ErasedArray::wrap(array.mapv(|value| T::from_f64(value.to_f64()))))
}

impl<T: Element> From<ArrayD<T>> for ErasedArray {
    fn from(array: ArrayD<T>) -> Self {
        T::wrap(array)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr2};

    #[test]
    fn test_wrap_then_downcast_aliases_storage() {
        let array = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn();
        let erased = ErasedArray::wrap(array.clone());
        assert_eq!(erased.dtype(), DType::F32);
        assert_eq!(erased.shape(), &[2, 2]);

        let typed = erased.downcast_ref::<f32>().unwrap();
        assert_eq!(typed, &array);
        let erased_ptr = match &erased {
            ErasedArray::F32(inner) => inner.as_ptr(),
            _ => unreachable!(),
        };
        assert_eq!(typed.as_ptr(), erased_ptr);
    }

    #[test]
    fn test_downcast_mismatch_is_an_error() {
        let erased = ErasedArray::wrap(arr0(7i32).into_dyn());
        let err = erased.downcast_ref::<f32>().unwrap_err();
        match err {
            TensorError::TypeMismatch { expected, actual, .. } => {
                assert_eq!(expected, DType::F32);
                assert_eq!(actual, DType::I32);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(erased.clone().into_typed::<u32>().is_err());
        assert_eq!(erased.into_typed::<i32>().unwrap()[[]], 7);
    }

    #[test]
    fn test_downcast_mut_writes_through() {
        let mut erased = ErasedArray::wrap(arr2(&[[1u32, 2]]).into_dyn());
        erased.downcast_mut::<u32>().unwrap()[[0, 1]] = 9;
        assert_eq!(erased.downcast_ref::<u32>().unwrap()[[0, 1]], 9);
        assert!(erased.downcast_mut::<bool>().is_err());
    }

    #[test]
    fn test_cast_between_types() {
        let erased = ErasedArray::wrap(arr2(&[[-1.5f64, 0.0], [2.7, 300.0]]).into_dyn());
        let ints = erased.cast(DType::I32);
        assert_eq!(ints.downcast_ref::<i32>().unwrap(), &arr2(&[[-1, 0], [2, 300]]).into_dyn());
        let bools = erased.cast(DType::Bool);
        assert_eq!(
            bools.downcast_ref::<bool>().unwrap(),
            &arr2(&[[true, false], [true, true]]).into_dyn()
        );
    }

    #[test]
    fn test_from_elem() {
        let erased = ErasedArray::from_elem(DType::U32, &[3], 4.0);
        assert_eq!(erased.len(), 3);
        assert_eq!(erased.downcast_ref::<u32>().unwrap().sum(), 12);
    }
}
