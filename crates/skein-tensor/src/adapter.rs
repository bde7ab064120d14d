//! The contract between the host tensor framework and a backend
//!
//! `TensorAdapter` is what the framework calls on a single tensor, and
//! `TensorBackend` covers creation and the operations that produce new
//! tensors. Both are implemented by this crate for `ndarray`.

use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

use crate::dtype::{DType, Scalar};
use crate::error::Result;
use crate::index::Index;
use crate::ops::{BinaryOp, ReduceOp, UnaryOp};
use crate::shape::{Shape, Strides};

/// Where the elements of a tensor live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Host memory
    Host,
    /// Accelerator memory
    Device,
}

/// Storage layout of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// Every element is stored
    Dense,
    /// Compressed sparse row
    Csr,
    /// Compressed sparse column
    Csc,
    /// Coordinate list
    Coo,
}

/// Identifies the implementation behind a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TensorBackendType {
    /// `ndarray` on the host
    Ndarray,
}

impl Display for TensorBackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorBackendType::Ndarray => write!(f, "ndarray"),
        }
    }
}

/// An execution stream. Evaluation is eager, so the stream has no pending work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stream {
    id: usize,
}

impl Stream {
    /// The stream every host tensor runs on
    pub fn synchronous() -> Self {
        Self { id: 0 }
    }

    /// Stream identifier
    pub fn id(&self) -> usize {
        self.id
    }

    /// Waits for queued work, of which there is none
    pub fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Opaque data the host framework can attach to a tensor
pub type AdapterContext = Arc<dyn Any + Send + Sync>;

/// Operations the host framework performs on one tensor
pub trait TensorAdapter: Debug + Display + Send + Sync + Sized {
    /// Dimensions of the tensor
    fn shape(&self) -> &Shape;

    /// Element type of the tensor
    fn dtype(&self) -> DType;

    /// Number of dimensions
    fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    /// Number of elements
    fn numel(&self) -> usize {
        self.shape().numel()
    }

    /// Deep copy with independent storage
    fn copy(&self) -> Self;

    /// New handle on the same storage
    fn shallow_copy(&self) -> Self;

    /// Deep copy through the adapter interface
    fn clone_adapter(&self) -> Self {
        self.copy()
    }

    /// Storage layout
    fn storage_type(&self) -> StorageType;

    /// Returns whether the tensor uses a sparse layout
    fn is_sparse(&self) -> bool {
        self.storage_type() != StorageType::Dense
    }

    /// Where the elements live
    fn location(&self) -> Location;

    /// Returns whether the elements are laid out in row-major order
    fn is_contiguous(&self) -> bool;

    /// Element strides of each axis
    fn strides(&self) -> Strides;

    /// Implementation behind the tensor
    fn backend_type(&self) -> TensorBackendType;

    /// Stream the tensor is computed on
    fn stream(&self) -> Stream;

    /// Returns whether the storage is pinned by an outstanding device pointer
    fn is_locked(&self) -> bool;

    /// Releases a pin taken by `device`
    fn unlock(&mut self);

    /// First element in row-major order
    fn scalar(&self) -> Result<Scalar>;

    /// Writes the bytes of the first element into `out`
    fn scalar_bytes(&self, out: &mut [u8]) -> Result<()>;

    /// Writes every element into `out` in row-major order, native-endian
    fn host(&self, out: &mut [u8]) -> Result<()>;

    /// Pointer to device memory holding the elements
    fn device(&self) -> Result<*const u8>;

    /// Overwrites the elements with `source`, converted to this tensor's type
    fn assign(&mut self, source: &Self) -> Result<()>;

    /// Fills every element with `value`
    fn assign_scalar(&mut self, value: Scalar) -> Result<()>;

    /// `self = self op rhs`, keeping the shape and type of `self`
    fn in_place(&mut self, op: BinaryOp, rhs: &Self) -> Result<()>;

    /// `self = self op value`, with `value` converted to this tensor's type
    fn in_place_scalar(&mut self, op: BinaryOp, value: Scalar) -> Result<()>;

    /// `self += rhs`
    fn in_place_add(&mut self, rhs: &Self) -> Result<()> {
        self.in_place(BinaryOp::Add, rhs)
    }

    /// `self -= rhs`
    fn in_place_sub(&mut self, rhs: &Self) -> Result<()> {
        self.in_place(BinaryOp::Sub, rhs)
    }

    /// `self *= rhs`
    fn in_place_mul(&mut self, rhs: &Self) -> Result<()> {
        self.in_place(BinaryOp::Mul, rhs)
    }

    /// `self /= rhs`
    fn in_place_div(&mut self, rhs: &Self) -> Result<()> {
        self.in_place(BinaryOp::Div, rhs)
    }

    /// `self += value`
    fn in_place_add_scalar<S: Into<Scalar>>(&mut self, value: S) -> Result<()> {
        self.in_place_scalar(BinaryOp::Add, value.into())
    }

    /// `self -= value`
    fn in_place_sub_scalar<S: Into<Scalar>>(&mut self, value: S) -> Result<()> {
        self.in_place_scalar(BinaryOp::Sub, value.into())
    }

    /// `self *= value`
    fn in_place_mul_scalar<S: Into<Scalar>>(&mut self, value: S) -> Result<()> {
        self.in_place_scalar(BinaryOp::Mul, value.into())
    }

    /// `self /= value`
    fn in_place_div_scalar<S: Into<Scalar>>(&mut self, value: S) -> Result<()> {
        self.in_place_scalar(BinaryOp::Div, value.into())
    }

    /// Converts every element to `dtype`
    fn astype(&self, dtype: DType) -> Self;

    /// Selects a sub-tensor, one entry per leading axis
    fn index(&self, indices: &[Index]) -> Result<Self>;

    /// Row-major one-dimensional copy
    fn flatten(&self) -> Self;

    /// Indexes the flattened tensor
    fn flat(&self, index: Index) -> Result<Self>;

    /// Returns a tensor with row-major layout, sharing storage when this one
    /// already has it
    fn as_contiguous(&self) -> Self;

    /// Attaches host framework data
    fn set_context(&mut self, context: Option<AdapterContext>);

    /// Host framework data attached with `set_context`
    fn context(&self) -> Option<&AdapterContext>;
}

/// Creation and computation entry points of a backend
pub trait TensorBackend: Debug + Send + Sync {
    /// Tensor type produced by the backend
    type Tensor: TensorAdapter;

    /// Implementation identifier
    fn backend_type(&self) -> TensorBackendType;

    /// Forces pending computation of `tensor`
    fn eval(&self, tensor: &Self::Tensor) -> Result<()>;

    /// Returns whether tensors of `dtype` can be created
    fn supports_dtype(&self, dtype: DType) -> bool;

    /// Reseeds the random generator
    fn set_seed(&self, seed: u64);

    /// Uniform samples in `[0, 1)`
    fn rand(&self, shape: &Shape, dtype: DType) -> Result<Self::Tensor>;

    /// Standard normal samples
    fn randn(&self, shape: &Shape, dtype: DType) -> Result<Self::Tensor>;

    /// Zero-dimensional tensor holding `value` converted to `dtype`
    fn from_scalar(&self, value: Scalar, dtype: DType) -> Result<Self::Tensor>;

    /// Tensor of `shape` with every element set to `value`
    fn full(&self, shape: &Shape, value: Scalar, dtype: DType) -> Result<Self::Tensor>;

    /// Ones on the main diagonal, zeros elsewhere
    fn identity(&self, shape: &Shape, dtype: DType) -> Result<Self::Tensor>;

    /// Positions along `seq_dim`, repeated over the other axes
    fn arange(&self, shape: &Shape, seq_dim: usize, dtype: DType) -> Result<Self::Tensor>;

    /// Same elements in a new shape
    fn reshape(&self, tensor: &Self::Tensor, shape: &Shape) -> Result<Self::Tensor>;

    /// Permutes the axes; an empty permutation reverses them
    fn transpose(&self, tensor: &Self::Tensor, axes: &[usize]) -> Result<Self::Tensor>;

    /// Elementwise unary operation
    fn unary(&self, op: UnaryOp, tensor: &Self::Tensor) -> Result<Self::Tensor>;

    /// Elementwise binary operation
    fn binary(&self, op: BinaryOp, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;

    /// Reduction over `axes` (every axis when empty)
    fn reduce(&self, op: ReduceOp, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor>;

    /// Writes a rendering of `tensor` to the log
    fn print(&self, tensor: &Self::Tensor);

    /// Matrix product
    fn matmul(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;

    /// Sorted copy along `axis`
    fn sort(&self, tensor: &Self::Tensor, axis: usize, descending: bool) -> Result<Self::Tensor>;

    /// The `k` largest elements along `axis`
    fn topk(&self, tensor: &Self::Tensor, k: usize, axis: usize) -> Result<Self::Tensor>;

    /// Pads each axis with `(before, after)` zeros
    fn pad(&self, tensor: &Self::Tensor, padding: &[(usize, usize)]) -> Result<Self::Tensor>;

    /// Joins tensors along `axis`
    fn concatenate(&self, tensors: &[&Self::Tensor], axis: usize) -> Result<Self::Tensor>;

    /// Picks from `x` where `condition` is non-zero and from `y` elsewhere
    fn where_(&self, condition: &Self::Tensor, x: &Self::Tensor, y: &Self::Tensor) -> Result<Self::Tensor>;

    /// Median over `axes`
    fn median(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor>;

    /// Variance over `axes`
    fn var(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor>;

    /// Standard deviation over `axes`
    fn std(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor>;

    /// Euclidean norm of all elements
    fn norm(&self, tensor: &Self::Tensor) -> Result<Self::Tensor>;

    /// Memory manager statistics
    fn mem_mgr_info(&self) -> Result<String>;

    /// Toggles per-step memory manager logging
    fn set_mem_step_logging(&self, enabled: bool) -> Result<()>;

    /// `-x`
    fn negative(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Negative, tensor)
    }

    /// `|x|`
    fn absolute(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Absolute, tensor)
    }

    /// One where the element is zero
    fn logical_not(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::LogicalNot, tensor)
    }

    /// `e^x`
    fn exp(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Exp, tensor)
    }

    /// Natural logarithm
    fn log(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Log, tensor)
    }

    /// Square root
    fn sqrt(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Sqrt, tensor)
    }

    /// Sine
    fn sin(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Sin, tensor)
    }

    /// Cosine
    fn cos(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Cos, tensor)
    }

    /// Hyperbolic tangent
    fn tanh(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Tanh, tensor)
    }

    /// Round down
    fn floor(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Floor, tensor)
    }

    /// Round up
    fn ceil(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Ceil, tensor)
    }

    /// Round to nearest, ties to even
    fn rint(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Rint, tensor)
    }

    /// Logistic function
    fn sigmoid(&self, tensor: &Self::Tensor) -> Result<Self::Tensor> {
        self.unary(UnaryOp::Sigmoid, tensor)
    }

    /// `lhs + rhs`
    fn add(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Add, lhs, rhs)
    }

    /// `lhs - rhs`
    fn sub(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Sub, lhs, rhs)
    }

    /// `lhs * rhs`
    fn mul(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Mul, lhs, rhs)
    }

    /// `lhs / rhs`
    fn div(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Div, lhs, rhs)
    }

    /// `lhs == rhs`
    fn eq(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Eq, lhs, rhs)
    }

    /// `lhs != rhs`
    fn neq(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Neq, lhs, rhs)
    }

    /// `lhs < rhs`
    fn less_than(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Lt, lhs, rhs)
    }

    /// `lhs <= rhs`
    fn less_than_equal(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Le, lhs, rhs)
    }

    /// `lhs > rhs`
    fn greater_than(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Gt, lhs, rhs)
    }

    /// `lhs >= rhs`
    fn greater_than_equal(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Ge, lhs, rhs)
    }

    /// Elementwise minimum
    fn minimum(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Minimum, lhs, rhs)
    }

    /// Elementwise maximum
    fn maximum(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.binary(BinaryOp::Maximum, lhs, rhs)
    }

    /// Sum over `axes`
    fn sum(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor> {
        self.reduce(ReduceOp::Sum, tensor, axes, keep_dims)
    }

    /// Minimum over `axes`
    fn amin(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor> {
        self.reduce(ReduceOp::Min, tensor, axes, keep_dims)
    }

    /// Maximum over `axes`
    fn amax(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor> {
        self.reduce(ReduceOp::Max, tensor, axes, keep_dims)
    }

    /// Whether any element over `axes` is non-zero
    fn any(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor> {
        self.reduce(ReduceOp::Any, tensor, axes, keep_dims)
    }

    /// Whether every element over `axes` is non-zero
    fn all(&self, tensor: &Self::Tensor, axes: &[usize], keep_dims: bool) -> Result<Self::Tensor> {
        self.reduce(ReduceOp::All, tensor, axes, keep_dims)
    }
}
