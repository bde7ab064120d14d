//! Skein Tensor: a type-erased `ndarray` backend for the Skein tensor framework
//!
//! The framework talks to tensors through `TensorAdapter` and `TensorBackend`
//! without knowing their element type. This crate implements both on top of
//! `ndarray::ArrayD<T>`, recovering the element type at runtime through a
//! closed set of tags.
//!
//! # Features
//!
//! - **Runtime element types**: `bool`, `int32`, `uint32`, `float32` and `float64`,
//!   dispatched from a single type list
//! - **Checked downcasts**: a mismatched type is an error, never a reinterpreted buffer
//! - **Copy-on-write handles**: shallow copies share storage until one of them mutates
//! - **Broadcasting**: NumPy rules for binary operators
//!
//! # Example
//!
//! ```rust
//! use skein_tensor::prelude::*;
//! use ndarray::arr2;
//!
//! let ctx = BackendContext::default();
//! let a = TensorHandle::new(arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).into_dyn());
//! let b = TensorHandle::new(arr2(&[[5.0f32, 6.0], [7.0, 8.0]]).into_dyn());
//!
//! let sum = ctx.backend().add(&a, &b)?;
//! assert_eq!(sum.dtype(), DType::F32);
//! assert_eq!(sum.to_vec::<f32>()?, vec![6.0, 8.0, 10.0, 12.0]);
//! # Ok::<(), skein_tensor::TensorError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

#[macro_use]
mod macros;

pub mod adapter;
pub mod backend;
pub mod config;
pub mod context;
pub mod dtype;
pub mod erased;
pub mod error;
pub mod index;
pub mod ops;
pub mod shape;
pub mod tensor;

// Re-export main types
pub use adapter::{
    AdapterContext, Location, StorageType, Stream, TensorAdapter, TensorBackend,
    TensorBackendType,
};
pub use backend::NdBackend;
pub use config::{BackendConfig, DisplayConfig};
pub use context::BackendContext;
pub use dtype::{DType, Element, Primitive, Scalar};
pub use erased::ErasedArray;
pub use error::{Result, TensorError};
pub use index::Index;
pub use ops::{BinaryOp, ReduceOp, UnaryOp};
pub use shape::{Shape, Strides};
pub use tensor::TensorHandle;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        BackendConfig, BackendContext, DType, Index, Location, NdBackend, Result, Scalar,
        Shape, TensorAdapter, TensorBackend, TensorError, TensorHandle,
    };
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
