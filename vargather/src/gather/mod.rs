//! Variable-length all-gather and its typed front-ends.

mod padded;
mod typed;

pub use padded::all_gather_padded;
pub use typed::{
    all_gather, all_gather_elements, all_gather_opaque, all_gather_structured, all_gather_tensor,
};

use crate::codec::Opaque;
use crate::error::Result;
use crate::payload::GatherPayload;
use crate::tensor::{Tensor, TensorMap};
use crate::types::Element;
use crate::world::WorldContext;

impl WorldContext {
    /// See [`all_gather_padded`](padded::all_gather_padded).
    pub async fn all_gather_padded(&self, local: &[u8], elem_size: usize) -> Result<Vec<Vec<u8>>> {
        padded::all_gather_padded(self, local, elem_size).await
    }

    /// Gather a 1-D buffer of any length from every rank.
    pub async fn all_gather_elements<T: Element>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        typed::all_gather_elements(self, local).await
    }

    /// Gather a tensor whose leading dimension may vary by rank.
    pub async fn all_gather_tensor<T: Element>(&self, local: &Tensor<T>) -> Result<Vec<Tensor<T>>> {
        typed::all_gather_tensor(self, local).await
    }

    /// Gather a map of named tensors.
    pub async fn all_gather_structured<T: Element>(
        &self,
        local: &TensorMap<T>,
    ) -> Result<Vec<TensorMap<T>>> {
        typed::all_gather_structured(self, local).await
    }

    pub async fn all_gather_opaque<V: Opaque + Clone>(&self, value: &V) -> Result<Vec<V>> {
        typed::all_gather_opaque(self, value).await
    }

    pub async fn all_gather<T: Element>(
        &self,
        payload: &GatherPayload<T>,
    ) -> Result<Vec<GatherPayload<T>>> {
        typed::all_gather(self, payload).await
    }
}
