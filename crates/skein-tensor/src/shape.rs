//! Shape and stride types for tensor dimensions

use std::fmt;
use std::ops::Index;

use crate::error::{Result, TensorError};

/// Represents the shape of a tensor
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Creates a new shape from a vector of dimensions
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Creates a shape from a slice of dimensions
    pub fn from_slice(dims: &[usize]) -> Self {
        Self { dims: dims.to_vec() }
    }

    /// Creates a scalar shape (0 dimensions)
    pub fn scalar() -> Self {
        Self { dims: vec![] }
    }

    /// Creates a 1D shape
    pub fn vector(size: usize) -> Self {
        Self { dims: vec![size] }
    }

    /// Creates a 2D shape
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self { dims: vec![rows, cols] }
    }

    /// Returns the number of dimensions (rank)
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Returns the dimensions as a slice
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Returns the total number of elements
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns whether this is a scalar (0-dimensional)
    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    /// Checks if this shape is compatible with another for broadcasting
    pub fn is_broadcast_compatible(&self, other: &Shape) -> bool {
        let min_ndim = self.ndim().min(other.ndim());
        let self_offset = self.ndim() - min_ndim;
        let other_offset = other.ndim() - min_ndim;

        (0..min_ndim).all(|i| {
            let self_dim = self.dims[self_offset + i];
            let other_dim = other.dims[other_offset + i];
            self_dim == other_dim || self_dim == 1 || other_dim == 1
        })
    }

    /// Returns the broadcasted shape of two shapes
    pub fn broadcast_shape(&self, other: &Shape) -> Result<Shape> {
        if !self.is_broadcast_compatible(other) {
            return Err(TensorError::incompatible_shapes(
                "SHAPE_BROADCAST_INCOMPATIBLE",
                "Shapes are not compatible for broadcasting",
                "shape broadcasting",
                self.to_string(),
                other.to_string(),
                "Ensure shapes follow broadcasting rules",
            ));
        }

        let max_ndim = self.ndim().max(other.ndim());
        let self_offset = max_ndim - self.ndim();
        let other_offset = max_ndim - other.ndim();

        let dims = (0..max_ndim)
            .map(|i| {
                let self_dim = if i >= self_offset { self.dims[i - self_offset] } else { 1 };
                let other_dim = if i >= other_offset { other.dims[i - other_offset] } else { 1 };
                // A size-1 axis stretches to the other side, including to zero.
                if self_dim == 1 {
                    other_dim
                } else {
                    self_dim
                }
            })
            .collect();

        Ok(Shape::new(dims))
    }

    /// Checks that the element count fits in `usize` and that the non-zero
    /// axis lengths multiply to at most `isize::MAX`, as ndarray requires
    pub fn validate(&self) -> Result<()> {
        let too_large = |message: &str| {
            TensorError::invalid_shape(
                "SHAPE_TOO_LARGE",
                message,
                self.to_string(),
                "shape validation",
                "Use smaller dimensions to avoid overflow",
            )
        };
        self.dims
            .iter()
            .try_fold(1usize, |total, &dim| total.checked_mul(dim))
            .ok_or_else(|| too_large("Shape element count overflows usize"))?;
        self.dims
            .iter()
            .filter(|&&dim| dim != 0)
            .try_fold(1usize, |total, &dim| total.checked_mul(dim))
            .filter(|&product| product <= isize::MAX as usize)
            .map(|_| ())
            .ok_or_else(|| too_large("Product of the non-zero axis lengths overflows isize"))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, dim) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", dim)?;
        }
        write!(f, ")")
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.dims[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Self::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Self::from_slice(dims)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Self { dims: dims.to_vec() }
    }
}

/// Represents the strides of a tensor, counted in elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Strides {
    strides: Vec<isize>,
}

impl Strides {
    /// Creates new strides from a vector
    pub fn new(strides: Vec<isize>) -> Self {
        Self { strides }
    }

    /// Returns the strides as a slice
    pub fn as_slice(&self) -> &[isize] {
        &self.strides
    }

    /// Returns the number of dimensions
    pub fn ndim(&self) -> usize {
        self.strides.len()
    }
}

impl Index<usize> for Strides {
    type Output = isize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.strides[index]
    }
}

impl fmt::Display for Strides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, stride) in self.strides.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", stride)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_creation() {
        let shape = Shape::vector(10);
        assert_eq!(shape.ndim(), 1);
        assert_eq!(shape.numel(), 10);

        let shape = Shape::matrix(3, 4);
        assert_eq!(shape.ndim(), 2);
        assert_eq!(shape.numel(), 12);

        let shape = Shape::scalar();
        assert!(shape.is_scalar());
        assert_eq!(shape.numel(), 1);
    }

    #[test]
    fn test_broadcasting() {
        let shape1 = Shape::from_slice(&[1, 3, 1]);
        let shape2 = Shape::from_slice(&[5, 1, 4]);

        assert!(shape1.is_broadcast_compatible(&shape2));

        let broadcast = shape1.broadcast_shape(&shape2).unwrap();
        assert_eq!(broadcast.dims(), &[5, 3, 4]);

        let stretched = Shape::vector(1).broadcast_shape(&Shape::matrix(2, 0)).unwrap();
        assert_eq!(stretched.dims(), &[2, 0]);

        let err = Shape::vector(3).broadcast_shape(&Shape::vector(4)).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_strides() {
        let strides = Strides::new(vec![4, 1]);
        assert_eq!(strides.as_slice(), &[4, 1]);
        assert_eq!(strides.ndim(), 2);
        assert_eq!(strides[0], 4);
    }

    #[test]
    fn test_validate_rejects_oversized_shapes() {
        assert!(Shape::matrix(1 << 20, 1 << 20).validate().is_ok());
        assert!(Shape::new(vec![0, 3]).validate().is_ok());

        let err = Shape::new(vec![1 << 33, 1 << 33]).validate().unwrap_err();
        assert_eq!(err.code(), "SHAPE_TOO_LARGE");

        // No elements, but ndarray still bounds the non-zero axes.
        let err = Shape::new(vec![0, 1 << 40, 1 << 40]).validate().unwrap_err();
        assert_eq!(err.code(), "SHAPE_TOO_LARGE");
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::matrix(2, 3).to_string(), "(2, 3)");
        assert_eq!(Strides::new(vec![3, 1]).to_string(), "[3, 1]");
    }
}
