use crate::backend::{Collective, HubBackend, LocalBackend, Solo};
use crate::config::WorldConfig;
use crate::error::{GatherError, Result};
use crate::types::Rank;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set by the first successful [`WorldContext::init`] in this process.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Whether [`WorldContext::init`] has already succeeded in this process.
pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

/// This process's view of the group: who it is, how many peers it has, and
/// the collective primitive that connects them.
///
/// Immutable once built. Clones share the backend, so a context can be handed
/// to several components of the same rank.
#[derive(Clone)]
pub struct WorldContext {
    rank: Rank,
    world_size: u32,
    local_device_index: u32,
    collective_timeout: Option<Duration>,
    backend: Arc<dyn Collective>,
}

impl WorldContext {
    /// A group of one. Every gather returns the caller's own contribution.
    pub fn single() -> Self {
        Self {
            rank: 0,
            world_size: 1,
            local_device_index: 0,
            collective_timeout: None,
            backend: Arc::new(Solo),
        }
    }

    /// Wrap an already-formed backend. Rank and world size come from the
    /// backend; the remaining fields from `config`.
    pub fn with_backend(backend: Arc<dyn Collective>, config: &WorldConfig) -> Self {
        Self {
            rank: backend.rank(),
            world_size: backend.world_size(),
            local_device_index: config.local_device_index,
            collective_timeout: config.collective_timeout,
            backend,
        }
    }

    /// `world_size` contexts backed by one in-process group, in rank order.
    ///
    /// Each context must be driven by its own task or thread.
    pub fn local_group(world_size: u32) -> Result<Vec<Self>> {
        Self::local_group_with_config(world_size, &WorldConfig::default())
    }

    /// Like [`local_group`](Self::local_group), taking the timeout hook and
    /// device index from `config`.
    pub fn local_group_with_config(world_size: u32, config: &WorldConfig) -> Result<Vec<Self>> {
        Ok(LocalBackend::group(world_size)?
            .into_iter()
            .map(|backend| Self::with_backend(Arc::new(backend), config))
            .collect())
    }

    /// Join the process group described by `config`.
    ///
    /// Succeeds at most once per process; later calls fail with
    /// `AlreadyInitialized`. A failed attempt leaves the process
    /// uninitialized so it can be retried.
    pub async fn init(config: WorldConfig) -> Result<Self> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(GatherError::AlreadyInitialized);
        }
        match Self::establish(&config).await {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                INITIALIZED.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// [`init`](Self::init) with [`WorldConfig::from_env`].
    pub async fn init_from_env() -> Result<Self> {
        Self::init(WorldConfig::from_env()).await
    }

    async fn establish(config: &WorldConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn Collective> = if config.world_size == 1 {
            Arc::new(Solo)
        } else {
            Arc::new(HubBackend::connect(config).await?)
        };
        tracing::info!(
            rank = config.rank,
            world_size = config.world_size,
            local_device_index = config.local_device_index,
            "process group initialized"
        );
        Ok(Self::with_backend(backend, config))
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    pub fn local_device_index(&self) -> u32 {
        self.local_device_index
    }

    pub fn collective_timeout(&self) -> Option<Duration> {
        self.collective_timeout
    }

    /// Rank 0, the one that reports on behalf of the group.
    pub fn is_primary(&self) -> bool {
        self.rank == 0
    }

    /// This rank's share of `items`: every `world_size`-th item starting at
    /// index `rank`.
    pub fn shard<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(self.rank as usize)
            .step_by(self.world_size as usize)
            .cloned()
            .collect()
    }

    /// Fixed-size all-gather: every rank passes the same number of bytes.
    pub async fn all_gather_fixed(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        let parts = self
            .bounded("all_gather_fixed", self.backend.all_gather_fixed(local))
            .await?;
        self.check_arity("all_gather_fixed", parts.len())?;
        Ok(parts)
    }

    /// Exchange one integer per rank.
    pub async fn all_gather_scalar(&self, value: u64) -> Result<Vec<u64>> {
        let values = self
            .bounded("all_gather_scalar", self.backend.all_gather_scalar(value))
            .await?;
        self.check_arity("all_gather_scalar", values.len())?;
        Ok(values)
    }

    /// Close the backend's connections. Call once, after the last gather.
    pub async fn shutdown(&self) {
        self.backend.close().await;
        tracing::debug!(rank = self.rank, "backend closed");
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.collective_timeout {
            None => fut.await,
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                GatherError::CollectiveTimeout {
                    operation,
                    timeout_ms: limit.as_millis() as u64,
                }
            })?,
        }
    }

    fn check_arity(&self, operation: &'static str, got: usize) -> Result<()> {
        if got != self.world_size as usize {
            return Err(GatherError::collective(
                operation,
                self.rank,
                format!(
                    "backend returned {got} entries for a world of {}",
                    self.world_size
                ),
            ));
        }
        Ok(())
    }
}

impl Default for WorldContext {
    fn default() -> Self {
        Self::single()
    }
}

impl fmt::Debug for WorldContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldContext")
            .field("rank", &self.rank)
            .field("world_size", &self.world_size)
            .field("local_device_index", &self.local_device_index)
            .field("collective_timeout", &self.collective_timeout)
            .finish_non_exhaustive()
    }
}
