//! Structural encoding between tensor maps, numeric buffers, opaque values
//! and the flat byte form that crosses the collective.

use crate::error::{GatherError, Result};
use crate::tensor::{Shape, Tensor, TensorMap, numel};
use crate::types::Element;

/// A tensor map flattened into one contiguous buffer.
///
/// `keys[i]` owns the `numel(shapes[i])` elements that follow the segments of
/// `keys[..i]` in `buffer`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedTensor<T> {
    pub keys: Vec<String>,
    pub shapes: Vec<Shape>,
    pub buffer: Vec<T>,
}

/// Concatenate every tensor of `map`, in sorted key order.
pub fn flatten<T: Element>(map: &TensorMap<T>) -> FlattenedTensor<T> {
    let total = map.values().map(Tensor::numel).sum();
    let mut keys = Vec::with_capacity(map.len());
    let mut shapes = Vec::with_capacity(map.len());
    let mut buffer = Vec::with_capacity(total);
    for (key, tensor) in map {
        keys.push(key.clone());
        shapes.push(tensor.shape().to_vec());
        buffer.extend_from_slice(tensor.data());
    }
    FlattenedTensor {
        keys,
        shapes,
        buffer,
    }
}

/// Slice `buffer` back into the tensors described by `keys` and `shapes`.
pub fn unflatten<T: Element>(
    keys: &[String],
    shapes: &[Shape],
    buffer: &[T],
) -> Result<TensorMap<T>> {
    if keys.len() != shapes.len() {
        return Err(GatherError::MetadataMismatch {
            keys: keys.len(),
            shapes: shapes.len(),
        });
    }
    let expected: usize = shapes.iter().map(|s| numel(s)).sum();
    if expected != buffer.len() {
        return Err(GatherError::ShapeMismatch {
            expected,
            actual: buffer.len(),
        });
    }

    let mut map = TensorMap::new();
    let mut start = 0;
    for (key, shape) in keys.iter().zip(shapes) {
        let end = start + numel(shape);
        let tensor = Tensor::new(shape.clone(), buffer[start..end].to_vec())?;
        if map.insert(key.clone(), tensor).is_some() {
            return Err(GatherError::SerializationFailure(format!(
                "duplicate key {key:?} in flattened metadata"
            )));
        }
        start = end;
    }
    Ok(map)
}

/// Little-endian byte form of a numeric slice.
pub fn elements_to_bytes<T: Element>(elements: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(elements.len() * T::DTYPE.size_in_bytes());
    for &e in elements {
        e.write_le(&mut out);
    }
    out
}

/// Inverse of [`elements_to_bytes`].
pub fn elements_from_bytes<T: Element>(bytes: &[u8]) -> Result<Vec<T>> {
    let elem_size = T::DTYPE.size_in_bytes();
    if bytes.len() % elem_size != 0 {
        return Err(GatherError::SerializationFailure(format!(
            "{} bytes is not a whole number of {} elements",
            bytes.len(),
            T::DTYPE
        )));
    }
    Ok(bytes.chunks_exact(elem_size).map(T::read_le).collect())
}

/// A value that can ride through a gather as raw bytes.
///
/// Callers implement this for their own result types; the gather never
/// inspects the bytes.
pub trait Opaque: Sized {
    fn to_bytes(&self) -> Result<Vec<u8>>;
    fn from_bytes(bytes: &[u8]) -> Result<Self>;
}

pub fn encode_opaque<V: Opaque>(value: &V) -> Result<Vec<u8>> {
    value.to_bytes()
}

pub fn decode_opaque<V: Opaque>(bytes: &[u8]) -> Result<V> {
    V::from_bytes(bytes)
}

impl Opaque for Vec<u8> {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl Opaque for String {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| GatherError::SerializationFailure(e.to_string()))
    }
}

macro_rules! impl_opaque_le {
    ($($ty:ty),*) => {
        $(
            impl Opaque for $ty {
                fn to_bytes(&self) -> Result<Vec<u8>> {
                    Ok(self.to_le_bytes().to_vec())
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self> {
                    let raw = bytes.try_into().map_err(|_| {
                        GatherError::SerializationFailure(format!(
                            "expected {} bytes for {}, got {}",
                            std::mem::size_of::<$ty>(),
                            stringify!($ty),
                            bytes.len()
                        ))
                    })?;
                    Ok(<$ty>::from_le_bytes(raw))
                }
            }
        )*
    };
}

impl_opaque_le!(u64, i64);

macro_rules! impl_opaque_rkyv {
    ($($ty:ty),*) => {
        $(
            impl Opaque for $ty {
                fn to_bytes(&self) -> Result<Vec<u8>> {
                    rkyv::to_bytes::<rkyv::rancor::Error>(self)
                        .map(|bytes| bytes.to_vec())
                        .map_err(|e| GatherError::SerializationFailure(e.to_string()))
                }

                fn from_bytes(bytes: &[u8]) -> Result<Self> {
                    // Received buffers carry no alignment guarantee.
                    let mut aligned: rkyv::util::AlignedVec = rkyv::util::AlignedVec::with_capacity(bytes.len());
                    aligned.extend_from_slice(bytes);
                    rkyv::from_bytes::<$ty, rkyv::rancor::Error>(&aligned)
                        .map_err(|e| GatherError::SerializationFailure(e.to_string()))
                }
            }
        )*
    };
}

impl_opaque_rkyv!(Vec<String>, Vec<Vec<u64>>, Vec<u64>, Vec<i64>);

/// Shapes travel as `u64` so the wire form does not depend on pointer width.
pub(crate) fn shapes_to_wire(shapes: &[Shape]) -> Vec<Vec<u64>> {
    shapes
        .iter()
        .map(|s| s.iter().map(|&d| d as u64).collect())
        .collect()
}

pub(crate) fn shapes_from_wire(shapes: Vec<Vec<u64>>) -> Result<Vec<Shape>> {
    shapes
        .into_iter()
        .map(|s| {
            s.into_iter()
                .map(|d| {
                    usize::try_from(d).map_err(|_| {
                        GatherError::SerializationFailure(format!(
                            "dimension {d} does not fit in usize"
                        ))
                    })
                })
                .collect()
        })
        .collect()
}
