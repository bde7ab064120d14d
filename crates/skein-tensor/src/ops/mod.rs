//! Elementwise and reduction kernels over typed `ndarray` arrays
//!
//! Kernels are generic over `T: Element`; callers holding an `ErasedArray`
//! reach them through the dispatch macros.

pub mod binary;
pub mod reduce;
pub mod unary;

pub use binary::BinaryOp;
pub use reduce::ReduceOp;
pub use unary::UnaryOp;
