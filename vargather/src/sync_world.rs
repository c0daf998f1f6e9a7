use crate::codec::Opaque;
use crate::config::WorldConfig;
use crate::error::{GatherError, Result};
use crate::payload::GatherPayload;
use crate::tensor::{Tensor, TensorMap};
use crate::types::{Element, Rank};
use crate::world::WorldContext;

/// Blocking wrapper around [`WorldContext`].
///
/// Owns a `tokio::runtime::Runtime` and calls `block_on()` for each operation.
/// Must not be used from inside an async context.
pub struct SyncWorld {
    inner: WorldContext,
    rt: tokio::runtime::Runtime,
}

fn new_runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().map_err(|e| GatherError::transport(format!("tokio runtime: {e}")))
}

impl SyncWorld {
    /// Blocking [`WorldContext::init`].
    pub fn init(config: WorldConfig) -> Result<Self> {
        let rt = new_runtime()?;
        let inner = rt.block_on(WorldContext::init(config))?;
        Ok(Self { inner, rt })
    }

    /// Wrap an existing context with a new runtime.
    pub fn from_context(inner: WorldContext) -> Result<Self> {
        Ok(Self {
            inner,
            rt: new_runtime()?,
        })
    }

    /// An in-process group, one runtime per rank. Drive each from its own thread.
    pub fn local_group(world_size: u32) -> Result<Vec<Self>> {
        WorldContext::local_group(world_size)?
            .into_iter()
            .map(Self::from_context)
            .collect()
    }

    pub fn rank(&self) -> Rank {
        self.inner.rank()
    }

    pub fn world_size(&self) -> u32 {
        self.inner.world_size()
    }

    pub fn is_primary(&self) -> bool {
        self.inner.is_primary()
    }

    pub fn context(&self) -> &WorldContext {
        &self.inner
    }

    pub fn shard<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.inner.shard(items)
    }

    pub fn all_gather_padded(&self, local: &[u8], elem_size: usize) -> Result<Vec<Vec<u8>>> {
        self.rt.block_on(self.inner.all_gather_padded(local, elem_size))
    }

    pub fn all_gather_elements<T: Element>(&self, local: &[T]) -> Result<Vec<Vec<T>>> {
        self.rt.block_on(self.inner.all_gather_elements(local))
    }

    pub fn all_gather_tensor<T: Element>(&self, local: &Tensor<T>) -> Result<Vec<Tensor<T>>> {
        self.rt.block_on(self.inner.all_gather_tensor(local))
    }

    pub fn all_gather_structured<T: Element>(
        &self,
        local: &TensorMap<T>,
    ) -> Result<Vec<TensorMap<T>>> {
        self.rt.block_on(self.inner.all_gather_structured(local))
    }

    pub fn all_gather_opaque<V: Opaque + Clone>(&self, value: &V) -> Result<Vec<V>> {
        self.rt.block_on(self.inner.all_gather_opaque(value))
    }

    pub fn all_gather<T: Element>(
        &self,
        payload: &GatherPayload<T>,
    ) -> Result<Vec<GatherPayload<T>>> {
        self.rt.block_on(self.inner.all_gather(payload))
    }

    pub fn shutdown(&self) {
        self.rt.block_on(self.inner.shutdown());
    }
}
