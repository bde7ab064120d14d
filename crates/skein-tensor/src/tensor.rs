//! The tensor handle exposed to the host framework

use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::sync::Arc;

use ndarray::{Array1, ArrayD, IxDyn};
use tracing::trace;

use crate::adapter::{
    AdapterContext, Location, StorageType, Stream, TensorAdapter, TensorBackendType,
};
use crate::config::DisplayConfig;
use crate::dtype::{DType, Element, Scalar};
use crate::erased::ErasedArray;
use crate::error::{Result, TensorError};
use crate::index::{self, Index};
use crate::ops::{binary, reduce, unary, BinaryOp, ReduceOp, UnaryOp};
use crate::shape::{Shape, Strides};

/// A type-erased `ndarray` value with its cached shape and element type.
///
/// Storage is reference counted. `Clone` and `shallow_copy` share it, and every
/// mutation detaches a private copy first when the storage is shared, so a
/// write through one handle is never visible through another. Shape and
/// element type are fixed for the lifetime of the handle.
#[derive(Clone)]
pub struct TensorHandle {
    storage: Arc<ErasedArray>,
    shape: Shape,
    dtype: DType,
    context: Option<AdapterContext>,
}

impl TensorHandle {
    /// Wraps a typed array
    pub fn new<T: Element>(array: ArrayD<T>) -> Self {
        Self::from_erased(ErasedArray::wrap(array))
    }

    /// Wraps an already erased array
    pub fn from_erased(erased: ErasedArray) -> Self {
        let shape = Shape::from_slice(erased.shape());
        let dtype = erased.dtype();
        trace!(dtype = %dtype, shape = %shape, "created tensor handle");
        Self {
            storage: Arc::new(erased),
            shape,
            dtype,
            context: None,
        }
    }

    /// Builds a tensor from native-endian element bytes in row-major order
    pub fn from_host(shape: impl Into<Shape>, dtype: DType, bytes: &[u8], location: Location) -> Result<Self> {
        if location == Location::Device {
            return Err(TensorError::not_implemented(
                "TENSOR_DEVICE_UNSUPPORTED",
                "from_host with device memory",
            ));
        }

        let shape = shape.into();
        shape.validate()?;
        let expected = shape.numel().checked_mul(dtype.size_in_bytes()).ok_or_else(|| {
            TensorError::invalid_shape(
                "SHAPE_TOO_LARGE",
                "Buffer size overflows usize",
                shape.to_string(),
                "from_host",
                "Use smaller dimensions",
            )
        })?;
        if bytes.len() != expected {
            return Err(TensorError::invalid_buffer(
                "TENSOR_HOST_BUFFER_SIZE",
                format!("A {} tensor of shape {} needs {} bytes", dtype, shape, expected),
                expected,
                bytes.len(),
                "from_host",
            ));
        }

        let erased = dispatch_dtype!(dtype, T => ErasedArray::wrap(read_elements::<T>(&shape, bytes)?));
        Ok(Self::from_erased(erased))
    }

    /// Sparse tensors are not supported by the ndarray backend
    pub fn sparse(
        _shape: impl Into<Shape>,
        _values: &TensorHandle,
        _row_indices: &TensorHandle,
        _col_indices: &TensorHandle,
        storage_type: StorageType,
    ) -> Result<Self> {
        Err(TensorError::not_implemented(
            "TENSOR_SPARSE_UNSUPPORTED",
            format!("sparse tensor creation ({:?})", storage_type),
        ))
    }

    /// A float32 vector with no elements
    pub fn empty() -> Self {
        Self::new(ArrayD::<f32>::zeros(IxDyn(&[0])))
    }

    /// Borrows the typed array
    pub fn array<T: Element>(&self) -> Result<&ArrayD<T>> {
        self.storage.downcast_ref()
    }

    /// Borrows the erased array
    pub fn erased(&self) -> &ErasedArray {
        &self.storage
    }

    /// Copies the elements out as `T`, which must be the stored type
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        Ok(self.array::<T>()?.iter().copied().collect())
    }

    /// Number of handles sharing this handle's storage
    pub fn storage_refcount(&self) -> usize {
        Arc::strong_count(&self.storage)
    }

    /// Returns whether both handles point at the same storage
    pub fn shares_storage_with(&self, other: &TensorHandle) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    fn storage_mut(&mut self) -> &mut ErasedArray {
        if Arc::strong_count(&self.storage) > 1 {
            trace!(dtype = %self.dtype, shape = %self.shape, "detaching shared storage before mutation");
        }
        Arc::make_mut(&mut self.storage)
    }

    /// Evaluates `self op rhs`. Both operands must have the same element type.
    pub fn binary(&self, op: BinaryOp, rhs: &TensorHandle, allow_broadcast: bool) -> Result<Self> {
        let erased = dispatch_erased_pair!(
            self.storage.as_ref(),
            rhs.storage.as_ref(),
            (a, b) => ErasedArray::wrap(binary::apply(op, a, b, allow_broadcast)?),
            _ => return Err(TensorError::mixed_types(op.name(), self.dtype, rhs.dtype))
        );
        Ok(Self::from_erased(erased))
    }

    /// Evaluates `op` on every element
    pub fn unary(&self, op: UnaryOp) -> Result<Self> {
        let erased = dispatch_erased!(self.storage.as_ref(), array => ErasedArray::wrap(unary::apply(op, array)?));
        Ok(Self::from_erased(erased))
    }

    /// Reduces over `axes`, every axis when empty
    pub fn reduce(&self, op: ReduceOp, axes: &[usize], keep_dims: bool) -> Result<Self> {
        let erased = dispatch_erased!(
            self.storage.as_ref(),
            array => ErasedArray::wrap(reduce::apply(op, array, axes, keep_dims)?)
        );
        Ok(Self::from_erased(erased))
    }

    /// `self < rhs` as ones and zeros of the operands' type
    pub fn lt(&self, rhs: &TensorHandle) -> Result<Self> {
        self.binary(BinaryOp::Lt, rhs, true)
    }

    /// `self <= rhs` as ones and zeros of the operands' type
    pub fn le(&self, rhs: &TensorHandle) -> Result<Self> {
        self.binary(BinaryOp::Le, rhs, true)
    }

    /// `self > rhs` as ones and zeros of the operands' type
    pub fn gt(&self, rhs: &TensorHandle) -> Result<Self> {
        self.binary(BinaryOp::Gt, rhs, true)
    }

    /// `self >= rhs` as ones and zeros of the operands' type
    pub fn ge(&self, rhs: &TensorHandle) -> Result<Self> {
        self.binary(BinaryOp::Ge, rhs, true)
    }

    /// Renders the tensor with the given display settings
    pub fn render(&self, options: &DisplayConfig) -> String {
        if self.shape.is_scalar() {
            return dispatch_erased!(self.storage.as_ref(), array => {
                array.iter().next().map(ToString::to_string).unwrap_or_default()
            });
        }
        if self.shape.numel() > options.max_elements {
            return format!("TensorHandle(shape={}, dtype={})", self.shape, self.dtype);
        }
        let precision = options.precision.filter(|_| self.dtype.is_float());
        dispatch_erased!(self.storage.as_ref(), array => match precision {
            Some(precision) => format!("{:.*}", precision, array),
            None => format!("{}", array),
        })
    }
}

fn read_elements<T: Element>(shape: &Shape, bytes: &[u8]) -> Result<ArrayD<T>> {
    let values = bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::checked::try_pod_read_unaligned::<T>)
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| {
            TensorError::invalid_buffer(
                "TENSOR_HOST_INVALID_ELEMENT",
                format!("Buffer holds a byte pattern that is not a valid {}: {}", T::DTYPE, e),
                bytes.len(),
                bytes.len(),
                "from_host",
            )
        })?;
    ArrayD::from_shape_vec(IxDyn(shape.dims()), values).map_err(|e| {
        TensorError::invalid_shape(
            "TENSOR_HOST_SHAPE",
            e.to_string(),
            shape.to_string(),
            "from_host",
            "Check that the shape matches the buffer",
        )
    })
}

fn write_elements<T: Element>(array: &ArrayD<T>, out: &mut [u8]) {
    // Logical iteration order is row-major whatever the memory layout.
    for (chunk, value) in out.chunks_exact_mut(std::mem::size_of::<T>()).zip(array.iter()) {
        chunk.copy_from_slice(bytemuck::bytes_of(value));
    }
}

impl TensorAdapter for TensorHandle {
    fn shape(&self) -> &Shape {
        &self.shape
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn copy(&self) -> Self {
        trace!(dtype = %self.dtype, shape = %self.shape, "deep copy");
        Self {
            storage: Arc::new(self.storage.as_ref().clone()),
            shape: self.shape.clone(),
            dtype: self.dtype,
            context: self.context.clone(),
        }
    }

    fn shallow_copy(&self) -> Self {
        self.clone()
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Dense
    }

    fn location(&self) -> Location {
        Location::Host
    }

    fn is_contiguous(&self) -> bool {
        dispatch_erased!(self.storage.as_ref(), array => array.is_standard_layout())
    }

    fn strides(&self) -> Strides {
        Strides::new(dispatch_erased!(self.storage.as_ref(), array => array.strides().to_vec()))
    }

    fn backend_type(&self) -> TensorBackendType {
        TensorBackendType::Ndarray
    }

    fn stream(&self) -> Stream {
        Stream::synchronous()
    }

    fn is_locked(&self) -> bool {
        false
    }

    fn unlock(&mut self) {}

    fn scalar(&self) -> Result<Scalar> {
        let first = dispatch_erased!(
            self.storage.as_ref(),
            array => array.iter().next().copied().map(Element::into_scalar)
        );
        first.ok_or_else(|| {
            TensorError::invalid_shape(
                "TENSOR_SCALAR_EMPTY",
                "Cannot read a scalar from a tensor with no elements",
                self.shape.to_string(),
                "scalar",
                "Check numel() before reading a scalar",
            )
        })
    }

    fn scalar_bytes(&self, out: &mut [u8]) -> Result<()> {
        let bytes = self.scalar()?.to_ne_bytes();
        if out.len() != bytes.len() {
            return Err(TensorError::invalid_buffer(
                "TENSOR_SCALAR_BUFFER_SIZE",
                format!("A {} scalar needs {} bytes", self.dtype, bytes.len()),
                bytes.len(),
                out.len(),
                "scalar_bytes",
            ));
        }
        out.copy_from_slice(&bytes);
        Ok(())
    }

    fn host(&self, out: &mut [u8]) -> Result<()> {
        let expected = self.shape.numel() * self.dtype.size_in_bytes();
        if out.len() != expected {
            return Err(TensorError::invalid_buffer(
                "TENSOR_HOST_BUFFER_SIZE",
                format!("A {} tensor of shape {} needs {} bytes", self.dtype, self.shape, expected),
                expected,
                out.len(),
                "host",
            ));
        }
        dispatch_erased!(self.storage.as_ref(), array => write_elements(array, out));
        Ok(())
    }

    fn device(&self) -> Result<*const u8> {
        Err(TensorError::not_implemented("TENSOR_DEVICE_UNSUPPORTED", "device"))
    }

    fn assign(&mut self, source: &Self) -> Result<()> {
        let expected = self.dtype;
        let converted = source.storage.cast(expected);
        dispatch_erased_pair!(
            self.storage_mut(),
            &converted,
            (target, source) => binary::assign(target, source),
            _ => Err(TensorError::type_mismatch(expected, converted.dtype(), "assign"))
        )
    }

    fn assign_scalar(&mut self, value: Scalar) -> Result<()> {
        dispatch_erased!(self.storage_mut(), array => array.fill(value.cast()));
        Ok(())
    }

    fn in_place(&mut self, op: BinaryOp, rhs: &Self) -> Result<()> {
        let (lhs_dtype, rhs_dtype) = (self.dtype, rhs.dtype);
        if lhs_dtype != rhs_dtype {
            return Err(TensorError::mixed_types(op.name(), lhs_dtype, rhs_dtype));
        }
        dispatch_erased_pair!(
            self.storage_mut(),
            rhs.storage.as_ref(),
            (target, operand) => binary::apply_in_place(op, target, operand),
            _ => Err(TensorError::mixed_types(op.name(), lhs_dtype, rhs_dtype))
        )
    }

    fn in_place_scalar(&mut self, op: BinaryOp, value: Scalar) -> Result<()> {
        let dtype = self.dtype;
        let operand = ErasedArray::from_elem(dtype, &[], value.to_f64());
        dispatch_erased_pair!(
            self.storage_mut(),
            &operand,
            (target, operand) => binary::apply_in_place(op, target, operand),
            _ => Err(TensorError::type_mismatch(dtype, operand.dtype(), op.name()))
        )
    }

    fn astype(&self, dtype: DType) -> Self {
        Self::from_erased(self.storage.cast(dtype))
    }

    fn index(&self, indices: &[Index]) -> Result<Self> {
        let erased = dispatch_erased!(
            self.storage.as_ref(),
            array => ErasedArray::wrap(index::select(array.view(), indices)?.to_owned())
        );
        Ok(Self::from_erased(erased))
    }

    fn flatten(&self) -> Self {
        Self::from_erased(dispatch_erased!(
            self.storage.as_ref(),
            array => ErasedArray::wrap(array.iter().copied().collect::<Array1<_>>().into_dyn())
        ))
    }

    fn flat(&self, index: Index) -> Result<Self> {
        self.flatten().index(&[index])
    }

    fn as_contiguous(&self) -> Self {
        if self.is_contiguous() {
            return self.shallow_copy();
        }
        Self::from_erased(dispatch_erased!(
            self.storage.as_ref(),
            array => ErasedArray::wrap(array.as_standard_layout().into_owned())
        ))
    }

    fn set_context(&mut self, context: Option<AdapterContext>) {
        self.context = context;
    }

    fn context(&self) -> Option<&AdapterContext> {
        self.context.as_ref()
    }
}

impl Add for &TensorHandle {
    type Output = Result<TensorHandle>;

    fn add(self, rhs: Self) -> Self::Output {
        self.binary(BinaryOp::Add, rhs, true)
    }
}

impl Sub for &TensorHandle {
    type Output = Result<TensorHandle>;

    fn sub(self, rhs: Self) -> Self::Output {
        self.binary(BinaryOp::Sub, rhs, true)
    }
}

impl Mul for &TensorHandle {
    type Output = Result<TensorHandle>;

    fn mul(self, rhs: Self) -> Self::Output {
        self.binary(BinaryOp::Mul, rhs, true)
    }
}

impl Div for &TensorHandle {
    type Output = Result<TensorHandle>;

    fn div(self, rhs: Self) -> Self::Output {
        self.binary(BinaryOp::Div, rhs, true)
    }
}

impl<T: Element> From<ArrayD<T>> for TensorHandle {
    fn from(array: ArrayD<T>) -> Self {
        Self::new(array)
    }
}

impl fmt::Debug for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorHandle")
            .field("dtype", &self.dtype)
            .field("shape", &self.shape)
            .field("storage_refcount", &self.storage_refcount())
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl fmt::Display for TensorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(&DisplayConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr1, arr2};

    #[test]
    fn test_handle_caches_shape_and_dtype() {
        let t = TensorHandle::new(arr2(&[[1u32, 2, 3], [4, 5, 6]]).into_dyn());
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.dtype(), DType::U32);
        assert_eq!(t.numel(), 6);
        assert!(!t.is_sparse());
        assert_eq!(t.location(), Location::Host);
        assert_eq!(t.backend_type(), TensorBackendType::Ndarray);
    }

    #[test]
    fn test_copy_on_write() {
        let mut a = TensorHandle::new(arr1(&[1i32, 2, 3]).into_dyn());
        let b = a.shallow_copy();
        assert!(a.shares_storage_with(&b));
        assert_eq!(a.storage_refcount(), 2);

        a.in_place_add_scalar(10i32).unwrap();
        assert!(!a.shares_storage_with(&b));
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![11, 12, 13]);
        assert_eq!(b.to_vec::<i32>().unwrap(), vec![1, 2, 3]);

        let c = b.copy();
        assert!(!c.shares_storage_with(&b));
    }

    #[test]
    fn test_unshared_mutation_keeps_storage() {
        let mut a = TensorHandle::new(arr1(&[1.0f64, 2.0]).into_dyn());
        let before = a.array::<f64>().unwrap().as_ptr();
        a.in_place_mul_scalar(2.0f64).unwrap();
        assert_eq!(a.array::<f64>().unwrap().as_ptr(), before);
        assert_eq!(a.to_vec::<f64>().unwrap(), vec![2.0, 4.0]);
    }

    #[test]
    fn test_from_host_validates_buffer() {
        let bytes: Vec<u8> = [1.5f32, 2.5].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let t = TensorHandle::from_host([2], DType::F32, &bytes, Location::Host).unwrap();
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.5, 2.5]);

        let err = TensorHandle::from_host([3], DType::F32, &bytes, Location::Host).unwrap_err();
        assert!(matches!(err, TensorError::InvalidBuffer { expected: 12, actual: 8, .. }));

        let err = TensorHandle::from_host([2], DType::Bool, &[1, 2], Location::Host).unwrap_err();
        assert_eq!(err.code(), "TENSOR_HOST_INVALID_ELEMENT");

        let err = TensorHandle::from_host([2], DType::F32, &bytes, Location::Device).unwrap_err();
        assert!(matches!(err, TensorError::NotImplemented { .. }));
    }

    #[test]
    fn test_host_egress() {
        let t = TensorHandle::new(arr2(&[[1i32, 2], [3, 4]]).into_dyn());
        let mut out = vec![0u8; 16];
        t.host(&mut out).unwrap();
        let expected: Vec<u8> = [1i32, 2, 3, 4].iter().flat_map(|v| v.to_ne_bytes()).collect();
        assert_eq!(out, expected);
        assert!(t.host(&mut [0u8; 15]).is_err());
    }

    #[test]
    fn test_scalar_egress() {
        let t = TensorHandle::new(arr1(&[7u32, 8]).into_dyn());
        assert_eq!(t.scalar().unwrap(), Scalar::U32(7));
        let mut out = [0u8; 4];
        t.scalar_bytes(&mut out).unwrap();
        assert_eq!(out, 7u32.to_ne_bytes());
        assert!(t.scalar_bytes(&mut [0u8; 8]).is_err());
        assert!(TensorHandle::empty().scalar().is_err());
    }

    #[test]
    fn test_binary_mixed_types_fail() {
        let a = TensorHandle::new(arr1(&[1i32]).into_dyn());
        let b = TensorHandle::new(arr1(&[1.0f32]).into_dyn());
        let err = a.lt(&b).unwrap_err();
        assert!(matches!(err, TensorError::UnsupportedType { .. }));
        let message = err.to_string();
        assert!(message.contains("int32"));
        assert!(message.contains("float32"));
    }

    #[test]
    fn test_operators() {
        let a = TensorHandle::new(arr1(&[6.0f32, 8.0]).into_dyn());
        let b = TensorHandle::new(arr1(&[2.0f32, 4.0]).into_dyn());
        assert_eq!((&a / &b).unwrap().to_vec::<f32>().unwrap(), vec![3.0, 2.0]);
        assert_eq!((&a - &b).unwrap().to_vec::<f32>().unwrap(), vec![4.0, 4.0]);
        assert_eq!(a.ge(&b).unwrap().to_vec::<f32>().unwrap(), vec![1.0, 1.0]);
    }

    #[test]
    fn test_in_place_failures_leave_values() {
        let mut a = TensorHandle::new(arr1(&[4u32, 5]).into_dyn());
        assert!(a.in_place_div_scalar(0u32).is_err());
        assert_eq!(a.to_vec::<u32>().unwrap(), vec![4, 5]);

        let wide = TensorHandle::new(arr2(&[[1u32, 1], [1, 1]]).into_dyn());
        assert!(a.in_place_add(&wide).is_err());
        assert_eq!(a.shape().dims(), &[2]);

        let floats = TensorHandle::new(arr1(&[1.0f32, 1.0]).into_dyn());
        assert!(a.in_place_add(&floats).unwrap_err().is_type_error());
    }

    #[test]
    fn test_assign_converts_source() {
        let mut a = TensorHandle::new(arr1(&[0i32, 0, 0]).into_dyn());
        a.assign(&TensorHandle::new(arr1(&[1.9f64, -2.5, 3.0]).into_dyn())).unwrap();
        assert_eq!(a.dtype(), DType::I32);
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![1, -2, 3]);

        a.assign_scalar(Scalar::F64(9.7)).unwrap();
        assert_eq!(a.to_vec::<i32>().unwrap(), vec![9, 9, 9]);
    }

    #[test]
    fn test_index_and_flatten() {
        let t = TensorHandle::new(arr2(&[[1i32, 2, 3], [4, 5, 6]]).into_dyn());
        let col = t.index(&[Index::Span, Index::Scalar(-1)]).unwrap();
        assert_eq!(col.to_vec::<i32>().unwrap(), vec![3, 6]);

        let flat = t.flatten();
        assert_eq!(flat.shape().dims(), &[6]);
        assert_eq!(t.flat(Index::Scalar(4)).unwrap().scalar().unwrap(), Scalar::I32(5));
        assert!(t.flat(Index::Scalar(6)).is_err());
    }

    #[test]
    fn test_strides_and_contiguity() {
        let t = TensorHandle::new(arr2(&[[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn());
        assert!(t.is_contiguous());
        assert_eq!(t.strides().as_slice(), &[3, 1]);

        let transposed = TensorHandle::new(t.array::<f32>().unwrap().clone().reversed_axes());
        assert!(!transposed.is_contiguous());
        let contiguous = transposed.as_contiguous();
        assert!(contiguous.is_contiguous());
        assert_eq!(contiguous.to_vec::<f32>().unwrap(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_display() {
        assert_eq!(TensorHandle::new(arr0(3.5f32).into_dyn()).to_string(), "3.5");
        assert_eq!(TensorHandle::new(arr0(true).into_dyn()).to_string(), "true");
        assert_eq!(TensorHandle::new(arr1(&[1i32, 2]).into_dyn()).to_string(), "[1, 2]");

        let t = TensorHandle::new(arr1(&[1.0f64, 2.0]).into_dyn());
        let options = DisplayConfig { max_elements: 1, precision: None };
        assert_eq!(t.render(&options), "TensorHandle(shape=(2), dtype=float64)");
        let options = DisplayConfig { max_elements: 10, precision: Some(2) };
        assert_eq!(t.render(&options), "[1.00, 2.00]");
    }

    #[test]
    fn test_context_and_unsupported() {
        let mut t = TensorHandle::empty();
        let context: AdapterContext = Arc::new(42usize);
        t.set_context(Some(context));
        assert_eq!(t.context().and_then(|c| c.downcast_ref::<usize>()), Some(&42));
        assert!(t.device().is_err());
        assert!(!t.is_locked());
        let e = TensorHandle::empty();
        assert!(TensorHandle::sparse([2, 2], &e, &e, &e, StorageType::Csr).is_err());
    }
}
