use crate::codec::{Opaque, decode_opaque, encode_opaque};
use crate::error::{GatherError, Result};
use crate::tensor::{Tensor, TensorMap};
use crate::types::Element;
use std::fmt;

/// One rank's contribution to a gather.
///
/// Every rank of a given call must pass the same variant.
#[derive(Debug, Clone, PartialEq)]
pub enum GatherPayload<T> {
    /// Already-serialized bytes, typically from [`Opaque`].
    Raw(Vec<u8>),
    /// A tensor whose leading dimension may differ between ranks.
    Tensor(Tensor<T>),
    /// Named tensors with per-rank keys and shapes.
    Structured(TensorMap<T>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Raw,
    Tensor,
    Structured,
}

impl PayloadKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Tensor => "tensor",
            Self::Structured => "structured",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<T: Element> GatherPayload<T> {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Raw(_) => PayloadKind::Raw,
            Self::Tensor(_) => PayloadKind::Tensor,
            Self::Structured(_) => PayloadKind::Structured,
        }
    }

    /// Serialize `value` into a `Raw` payload.
    pub fn opaque<V: Opaque>(value: &V) -> Result<Self> {
        Ok(Self::Raw(encode_opaque(value)?))
    }

    /// Decode a `Raw` payload produced by [`opaque`](Self::opaque).
    pub fn decode_raw<V: Opaque>(&self) -> Result<V> {
        match self {
            Self::Raw(bytes) => decode_opaque(bytes),
            other => Err(GatherError::SerializationFailure(format!(
                "expected a raw payload, found {}",
                other.kind()
            ))),
        }
    }

    pub fn into_tensor(self) -> Option<Tensor<T>> {
        match self {
            Self::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_structured(self) -> Option<TensorMap<T>> {
        match self {
            Self::Structured(map) => Some(map),
            _ => None,
        }
    }
}

impl<T> From<Vec<u8>> for GatherPayload<T> {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Raw(bytes)
    }
}

impl<T> From<Tensor<T>> for GatherPayload<T> {
    fn from(tensor: Tensor<T>) -> Self {
        Self::Tensor(tensor)
    }
}

impl<T> From<TensorMap<T>> for GatherPayload<T> {
    fn from(map: TensorMap<T>) -> Self {
        Self::Structured(map)
    }
}
