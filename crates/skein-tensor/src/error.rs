//! Error type shared by every tensor and backend operation

use thiserror::Error;

use crate::dtype::DType;

/// Errors that can occur during tensor operations
#[derive(Error, Debug)]
pub enum TensorError {
    /// The operation is part of the backend contract but has no implementation
    #[error("Not implemented [{code}]: {operation} is not implemented by the {backend} backend\nSuggestion: {suggestion}")]
    NotImplemented {
        /// Error code for programmatic handling
        code: &'static str,
        /// The operation that was requested
        operation: String,
        /// Name of the backend that rejected it
        backend: String,
        /// Suggested fix for the error
        suggestion: String,
    },

    /// An element type, or a combination of element types, is not supported
    #[error("Unsupported type [{code}]: {message}\nOperation: {operation}\nData types: {dtypes}\nSuggestion: {suggestion}")]
    UnsupportedType {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
        /// The operation that failed
        operation: String,
        /// Names of the offending element types
        dtypes: String,
        /// Suggested fix for the error
        suggestion: String,
    },

    /// A typed view was requested for an array holding a different element type
    #[error("Type mismatch [{code}]: expected {expected}, found {actual}\nOperation: {operation}")]
    TypeMismatch {
        /// Error code for programmatic handling
        code: &'static str,
        /// The element type the caller asked for
        expected: DType,
        /// The element type actually stored
        actual: DType,
        /// The operation that failed
        operation: String,
    },

    /// Tensors have incompatible shapes for the operation
    #[error("Shape compatibility error [{code}]: {message}\nOperation: {operation}\nLeft shape: {left_shape}\nRight shape: {right_shape}\nSuggestion: {suggestion}")]
    IncompatibleShapes {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
        /// The operation that failed
        operation: String,
        /// String representation of the left tensor shape
        left_shape: String,
        /// String representation of the right tensor shape
        right_shape: String,
        /// Suggested fix for the error
        suggestion: String,
    },

    /// The shape is invalid for the operation
    #[error("Invalid shape [{code}]: {message}\nShape: {shape}\nOperation: {operation}\nSuggestion: {suggestion}")]
    InvalidShape {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
        /// String representation of the invalid shape
        shape: String,
        /// The operation that failed
        operation: String,
        /// Suggested fix for the error
        suggestion: String,
    },

    /// Index is out of bounds for the given dimension
    #[error("Index out of bounds [{code}]: {message}\nIndex: {index}, Dimension: {dim}, Size: {size}\nOperation: {operation}")]
    OutOfBounds {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
        /// The index that was out of bounds
        index: isize,
        /// The dimension where the index was applied
        dim: usize,
        /// The size of that dimension
        size: usize,
        /// The operation that failed
        operation: String,
    },

    /// A caller-supplied byte buffer has the wrong size or content
    #[error("Invalid buffer [{code}]: {message}\nExpected: {expected} bytes, Actual: {actual} bytes\nOperation: {operation}")]
    InvalidBuffer {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
        /// Number of bytes the operation needs
        expected: usize,
        /// Number of bytes supplied
        actual: usize,
        /// The operation that failed
        operation: String,
    },

    /// Integer or boolean division with a zero divisor
    #[error("Division by zero [{code}]: {operation} on {dtype} has a zero divisor")]
    DivisionByZero {
        /// Error code for programmatic handling
        code: &'static str,
        /// The operation that failed
        operation: String,
        /// Element type of the operands
        dtype: DType,
    },

    /// Backend configuration could not be loaded or is invalid
    #[error("Configuration error [{code}]: {message}")]
    Config {
        /// Error code for programmatic handling
        code: &'static str,
        /// Human-readable error message
        message: String,
    },
}

/// Convenient result type for tensor operations
pub type Result<T> = std::result::Result<T, TensorError>;

impl TensorError {
    /// Create a not implemented error for `operation`
    pub fn not_implemented<S: Into<String>>(code: &'static str, operation: S) -> Self {
        Self::NotImplemented {
            code,
            operation: operation.into(),
            backend: "ndarray".to_string(),
            suggestion: "Use an operation the ndarray backend implements or switch backends".to_string(),
        }
    }

    /// Create an unsupported type error
    pub fn unsupported_type<S1, S2, S3>(
        code: &'static str,
        message: S1,
        operation: S2,
        dtypes: &[DType],
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        let dtypes = dtypes
            .iter()
            .map(|dtype| dtype.name())
            .collect::<Vec<_>>()
            .join(", ");
        Self::UnsupportedType {
            code,
            message: message.into(),
            operation: operation.into(),
            dtypes,
            suggestion: suggestion.into(),
        }
    }

    /// Create the error for a binary operation between two different element types
    pub fn mixed_types(operation: &str, lhs: DType, rhs: DType) -> Self {
        Self::unsupported_type(
            "TENSOR_MIXED_DTYPES",
            format!(
                "{} is only defined for operands of the same type, got {} and {}",
                operation, lhs, rhs
            ),
            operation,
            &[lhs, rhs],
            "Convert one operand with astype() so both share an element type",
        )
    }

    /// Create a type mismatch error
    pub fn type_mismatch<S: Into<String>>(expected: DType, actual: DType, operation: S) -> Self {
        Self::TypeMismatch {
            code: "TENSOR_TYPE_MISMATCH",
            expected,
            actual,
            operation: operation.into(),
        }
    }

    /// Create an incompatible shapes error
    pub fn incompatible_shapes<S1, S2, S3, S4, S5>(
        code: &'static str,
        message: S1,
        operation: S2,
        left_shape: S3,
        right_shape: S4,
        suggestion: S5,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
        S5: Into<String>,
    {
        Self::IncompatibleShapes {
            code,
            message: message.into(),
            operation: operation.into(),
            left_shape: left_shape.into(),
            right_shape: right_shape.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid shape error
    pub fn invalid_shape<S1, S2, S3, S4>(
        code: &'static str,
        message: S1,
        shape: S2,
        operation: S3,
        suggestion: S4,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
    {
        Self::InvalidShape {
            code,
            message: message.into(),
            shape: shape.into(),
            operation: operation.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an out of bounds error
    pub fn out_of_bounds<S1, S2>(
        code: &'static str,
        message: S1,
        index: isize,
        dim: usize,
        size: usize,
        operation: S2,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::OutOfBounds {
            code,
            message: message.into(),
            index,
            dim,
            size,
            operation: operation.into(),
        }
    }

    /// Create an invalid buffer error
    pub fn invalid_buffer<S1, S2>(
        code: &'static str,
        message: S1,
        expected: usize,
        actual: usize,
        operation: S2,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::InvalidBuffer {
            code,
            message: message.into(),
            expected,
            actual,
            operation: operation.into(),
        }
    }

    /// Create a division by zero error
    pub fn division_by_zero<S: Into<String>>(operation: S, dtype: DType) -> Self {
        Self::DivisionByZero {
            code: "TENSOR_DIVISION_BY_ZERO",
            operation: operation.into(),
            dtype,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(code: &'static str, message: S) -> Self {
        Self::Config {
            code,
            message: message.into(),
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotImplemented { code, .. } => code,
            Self::UnsupportedType { code, .. } => code,
            Self::TypeMismatch { code, .. } => code,
            Self::IncompatibleShapes { code, .. } => code,
            Self::InvalidShape { code, .. } => code,
            Self::OutOfBounds { code, .. } => code,
            Self::InvalidBuffer { code, .. } => code,
            Self::DivisionByZero { code, .. } => code,
            Self::Config { code, .. } => code,
        }
    }

    /// Check if this is a shape-related error
    pub fn is_shape_error(&self) -> bool {
        matches!(
            self,
            Self::IncompatibleShapes { .. } | Self::InvalidShape { .. } | Self::OutOfBounds { .. }
        )
    }

    /// Check if this is an element-type error
    pub fn is_type_error(&self) -> bool {
        matches!(self, Self::UnsupportedType { .. } | Self::TypeMismatch { .. })
    }
}
