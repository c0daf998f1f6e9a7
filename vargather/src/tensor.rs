//! Minimal host tensor: a shape plus contiguous row-major data.

use crate::error::{GatherError, Result};
use crate::types::Element;
use std::collections::BTreeMap;

/// Dimensions of a tensor, outermost first.
pub type Shape = Vec<usize>;

/// Named tensors. Iteration order is the sorted key order, so every rank
/// walks the same keys in the same order without negotiating it.
pub type TensorMap<T> = BTreeMap<String, Tensor<T>>;

/// Number of elements described by `shape`. A 0-d shape holds one element.
pub fn numel(shape: &[usize]) -> usize {
    shape.iter().product()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    shape: Shape,
    data: Vec<T>,
}

impl<T: Element> Tensor<T> {
    /// Build a tensor, checking that `data` fills `shape` exactly.
    pub fn new(shape: impl Into<Shape>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        let expected = numel(&shape);
        if expected != data.len() {
            return Err(GatherError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A 1-D tensor over `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    pub fn zeros(shape: impl Into<Shape>) -> Self {
        let shape = shape.into();
        let data = vec![T::default(); numel(&shape)];
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Every dimension after the first. Empty for 0-d and 1-D tensors.
    pub fn trailing_dims(&self) -> &[usize] {
        self.shape.get(1..).unwrap_or(&[])
    }

    /// Reinterpret the data under a new shape with the same element count.
    pub fn reshape(self, shape: impl Into<Shape>) -> Result<Self> {
        Self::new(shape, self.data)
    }
}
