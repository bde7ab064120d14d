//! The ndarray implementation of `TensorBackend`

use std::f64::consts::TAU;
use std::fmt;

use ndarray::{ArrayD, IxDyn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::adapter::{TensorAdapter, TensorBackend, TensorBackendType};
use crate::config::{BackendConfig, DisplayConfig};
use crate::dtype::{DType, Element, Primitive, Scalar};
use crate::erased::ErasedArray;
use crate::error::{Result, TensorError};
use crate::ops::{BinaryOp, ReduceOp, UnaryOp};
use crate::shape::Shape;
use crate::tensor::TensorHandle;

/// Eager host backend over `ndarray`
pub struct NdBackend {
    allow_broadcast: bool,
    display: DisplayConfig,
    rng: Mutex<StdRng>,
}

impl NdBackend {
    /// Creates a backend with default settings and an entropy-seeded generator
    pub fn new() -> Self {
        Self::from_config(&BackendConfig::default())
    }

    /// Creates a backend from configuration
    pub fn from_config(config: &BackendConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            allow_broadcast: config.allow_broadcast,
            display: config.display.clone(),
            rng: Mutex::new(rng),
        }
    }

    /// Whether binary operators broadcast
    pub fn allow_broadcast(&self) -> bool {
        self.allow_broadcast
    }

    fn not_implemented(&self, operation: &str) -> TensorError {
        debug!(operation, "operation not implemented by the ndarray backend");
        TensorError::not_implemented("BACKEND_NOT_IMPLEMENTED", operation)
    }

    fn require_float(operation: &str, dtype: DType) -> Result<()> {
        if dtype.is_float() {
            return Ok(());
        }
        Err(TensorError::unsupported_type(
            "BACKEND_RANDOM_DTYPE",
            format!("{} only produces floating point tensors, got {}", operation, dtype),
            operation,
            &[dtype],
            "Request float32 or float64",
        ))
    }

    fn sample(&self, shape: &Shape, dtype: DType, mut draw: impl FnMut(&mut StdRng) -> f64) -> Result<TensorHandle> {
        shape.validate()?;
        let mut guard = self.rng.lock();
        let rng: &mut StdRng = &mut guard;
        let dims = IxDyn(shape.dims());
        let erased = dispatch_dtype!(dtype, T => {
            ErasedArray::wrap(ArrayD::from_shape_simple_fn(dims, || T::from_f64(draw(&mut *rng))))
        });
        Ok(TensorHandle::from_erased(erased))
    }
}

impl Default for NdBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NdBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NdBackend")
            .field("allow_broadcast", &self.allow_broadcast)
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

fn identity_array<T: Element>(dims: &[usize]) -> ArrayD<T> {
    ArrayD::from_shape_fn(IxDyn(dims), |index| T::from_bool(index[0] == index[1]))
}

fn arange_array<T: Element>(dims: &[usize], seq_dim: usize) -> ArrayD<T> {
    ArrayD::from_shape_fn(IxDyn(dims), |index| T::from_f64(index[seq_dim] as f64))
}

fn reshape_array<T: Element>(array: &ArrayD<T>, shape: &Shape) -> Result<ArrayD<T>> {
    ArrayD::from_shape_vec(IxDyn(shape.dims()), array.iter().copied().collect()).map_err(|e| {
        TensorError::invalid_shape(
            "BACKEND_RESHAPE_FAILED",
            e.to_string(),
            shape.to_string(),
            "reshape",
            "Ensure the new shape has the same number of elements",
        )
    })
}

fn check_permutation(axes: &[usize], ndim: usize) -> Result<()> {
    let mut seen = vec![false; ndim];
    let valid = axes.len() == ndim
        && axes.iter().all(|&axis| {
            axis < ndim && !std::mem::replace(&mut seen[axis], true)
        });
    if valid {
        return Ok(());
    }
    Err(TensorError::invalid_shape(
        "BACKEND_INVALID_PERMUTATION",
        format!("{:?} is not a permutation of the {} axes", axes, ndim),
        format!("{:?}", axes),
        "transpose",
        "List every axis exactly once",
    ))
}

impl TensorBackend for NdBackend {
    type Tensor = TensorHandle;

    fn backend_type(&self) -> TensorBackendType {
        TensorBackendType::Ndarray
    }

    fn eval(&self, tensor: &TensorHandle) -> Result<()> {
        debug!(dtype = %tensor.dtype(), shape = %tensor.shape(), "eval");
        Ok(())
    }

    fn supports_dtype(&self, dtype: DType) -> bool {
        DType::ALL.contains(&dtype)
    }

    fn set_seed(&self, seed: u64) {
        debug!(seed, "reseeding random generator");
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }

    fn rand(&self, shape: &Shape, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, shape = %shape, "rand");
        Self::require_float("rand", dtype)?;
        if dtype == DType::F32 {
            // Narrowing an f64 sample can round up to 1.0.
            return self.sample(shape, dtype, |rng| f64::from(rng.gen::<f32>()));
        }
        self.sample(shape, dtype, |rng| rng.gen::<f64>())
    }

    fn randn(&self, shape: &Shape, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, shape = %shape, "randn");
        Self::require_float("randn", dtype)?;
        self.sample(shape, dtype, |rng| {
            // Box-Muller; 1 - u keeps the logarithm finite.
            let u1 = 1.0 - rng.gen::<f64>();
            let u2 = rng.gen::<f64>();
            (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
        })
    }

    fn from_scalar(&self, value: Scalar, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, value = %value, "from_scalar");
        Ok(TensorHandle::from_erased(ErasedArray::from_elem(dtype, &[], value.to_f64())))
    }

    fn full(&self, shape: &Shape, value: Scalar, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, shape = %shape, value = %value, "full");
        shape.validate()?;
        Ok(TensorHandle::from_erased(ErasedArray::from_elem(dtype, shape.dims(), value.to_f64())))
    }

    fn identity(&self, shape: &Shape, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, shape = %shape, "identity");
        if shape.ndim() != 2 {
            return Err(TensorError::invalid_shape(
                "BACKEND_IDENTITY_RANK",
                format!("identity needs a two-dimensional shape, got {} dimensions", shape.ndim()),
                shape.to_string(),
                "identity",
                "Pass a shape of the form (rows, cols)",
            ));
        }
        shape.validate()?;
        let erased = dispatch_dtype!(dtype, T => ErasedArray::wrap(identity_array::<T>(shape.dims())));
        Ok(TensorHandle::from_erased(erased))
    }

    fn arange(&self, shape: &Shape, seq_dim: usize, dtype: DType) -> Result<TensorHandle> {
        debug!(dtype = %dtype, shape = %shape, seq_dim, "arange");
        if seq_dim >= shape.ndim() {
            return Err(TensorError::out_of_bounds(
                "BACKEND_ARANGE_AXIS",
                format!("Axis {} does not exist in shape {}", seq_dim, shape),
                seq_dim as isize,
                seq_dim,
                shape.ndim(),
                "arange",
            ));
        }
        shape.validate()?;
        let erased = dispatch_dtype!(dtype, T => ErasedArray::wrap(arange_array::<T>(shape.dims(), seq_dim)));
        Ok(TensorHandle::from_erased(erased))
    }

    fn reshape(&self, tensor: &TensorHandle, shape: &Shape) -> Result<TensorHandle> {
        debug!(dtype = %tensor.dtype(), from = %tensor.shape(), to = %shape, "reshape");
        shape.validate()?;
        if shape.numel() != tensor.numel() {
            return Err(TensorError::invalid_shape(
                "BACKEND_RESHAPE_SIZE",
                format!(
                    "Cannot reshape {} elements into shape {} with {} elements",
                    tensor.numel(),
                    shape,
                    shape.numel()
                ),
                shape.to_string(),
                "reshape",
                "Ensure the new shape has the same number of elements",
            ));
        }
        let erased = dispatch_erased!(tensor.erased(), array => ErasedArray::wrap(reshape_array(array, shape)?));
        Ok(TensorHandle::from_erased(erased))
    }

    fn transpose(&self, tensor: &TensorHandle, axes: &[usize]) -> Result<TensorHandle> {
        debug!(dtype = %tensor.dtype(), shape = %tensor.shape(), ?axes, "transpose");
        if axes.is_empty() {
            let erased = dispatch_erased!(tensor.erased(), array => ErasedArray::wrap(array.clone().reversed_axes()));
            return Ok(TensorHandle::from_erased(erased));
        }
        check_permutation(axes, tensor.ndim())?;
        let erased = dispatch_erased!(
            tensor.erased(),
            array => ErasedArray::wrap(array.clone().permuted_axes(IxDyn(axes)))
        );
        Ok(TensorHandle::from_erased(erased))
    }

    fn unary(&self, op: UnaryOp, tensor: &TensorHandle) -> Result<TensorHandle> {
        debug!(op = op.name(), dtype = %tensor.dtype(), "dispatching unary operation");
        tensor.unary(op)
    }

    fn binary(&self, op: BinaryOp, lhs: &TensorHandle, rhs: &TensorHandle) -> Result<TensorHandle> {
        debug!(
            op = op.name(),
            lhs = %lhs.dtype(),
            rhs = %rhs.dtype(),
            "dispatching binary operation"
        );
        lhs.binary(op, rhs, self.allow_broadcast)
    }

    fn reduce(&self, op: ReduceOp, tensor: &TensorHandle, axes: &[usize], keep_dims: bool) -> Result<TensorHandle> {
        debug!(op = op.name(), dtype = %tensor.dtype(), ?axes, keep_dims, "dispatching reduction");
        tensor.reduce(op, axes, keep_dims)
    }

    fn print(&self, tensor: &TensorHandle) {
        info!("{}", tensor.render(&self.display));
    }

    fn matmul(&self, _lhs: &TensorHandle, _rhs: &TensorHandle) -> Result<TensorHandle> {
        Err(self.not_implemented("matmul"))
    }

    fn sort(&self, _tensor: &TensorHandle, _axis: usize, _descending: bool) -> Result<TensorHandle> {
        Err(self.not_implemented("sort"))
    }

    fn topk(&self, _tensor: &TensorHandle, _k: usize, _axis: usize) -> Result<TensorHandle> {
        Err(self.not_implemented("topk"))
    }

    fn pad(&self, _tensor: &TensorHandle, _padding: &[(usize, usize)]) -> Result<TensorHandle> {
        Err(self.not_implemented("pad"))
    }

    fn concatenate(&self, _tensors: &[&TensorHandle], _axis: usize) -> Result<TensorHandle> {
        Err(self.not_implemented("concatenate"))
    }

    fn where_(&self, _condition: &TensorHandle, _x: &TensorHandle, _y: &TensorHandle) -> Result<TensorHandle> {
        Err(self.not_implemented("where"))
    }

    fn median(&self, _tensor: &TensorHandle, _axes: &[usize], _keep_dims: bool) -> Result<TensorHandle> {
        Err(self.not_implemented("median"))
    }

    fn var(&self, _tensor: &TensorHandle, _axes: &[usize], _keep_dims: bool) -> Result<TensorHandle> {
        Err(self.not_implemented("var"))
    }

    fn std(&self, _tensor: &TensorHandle, _axes: &[usize], _keep_dims: bool) -> Result<TensorHandle> {
        Err(self.not_implemented("std"))
    }

    fn norm(&self, _tensor: &TensorHandle) -> Result<TensorHandle> {
        Err(self.not_implemented("norm"))
    }

    fn mem_mgr_info(&self) -> Result<String> {
        Err(self.not_implemented("mem_mgr_info"))
    }

    fn set_mem_step_logging(&self, _enabled: bool) -> Result<()> {
        Err(self.not_implemented("set_mem_step_logging"))
    }
}
