use crate::backend::Collective;
use crate::error::{GatherError, Result};
use crate::types::Rank;
use futures::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// Shared rendezvous point for one in-process group.
///
/// A round is: write own slot, wait on `arrive`, copy every slot, wait on
/// `depart`. No rank can overwrite its slot for the next round before every
/// rank has copied the current one.
struct Exchange {
    slots: Mutex<Vec<Vec<u8>>>,
    arrive: Barrier,
    depart: Barrier,
}

/// One rank of a group whose members all live in this process.
///
/// Ranks may run on different tasks, threads or runtimes; they only share
/// the exchange.
pub struct LocalBackend {
    rank: Rank,
    world_size: u32,
    exchange: Arc<Exchange>,
}

impl LocalBackend {
    /// Create every rank of a `world_size` group, in rank order.
    pub fn group(world_size: u32) -> Result<Vec<Self>> {
        if world_size == 0 {
            return Err(GatherError::InvalidConfig(
                "world_size must be at least 1".into(),
            ));
        }
        let n = world_size as usize;
        let exchange = Arc::new(Exchange {
            slots: Mutex::new(vec![Vec::new(); n]),
            arrive: Barrier::new(n),
            depart: Barrier::new(n),
        });
        Ok((0..world_size)
            .map(|rank| Self {
                rank,
                world_size,
                exchange: Arc::clone(&exchange),
            })
            .collect())
    }

    async fn round(&self, local: &[u8]) -> Result<Vec<Vec<u8>>> {
        {
            let mut slots = self
                .exchange
                .slots
                .lock()
                .map_err(|_| GatherError::LockPoisoned("local exchange slots"))?;
            slots[self.rank as usize] = local.to_vec();
        }
        self.exchange.arrive.wait().await;

        let gathered = self
            .exchange
            .slots
            .lock()
            .map(|slots| slots.clone())
            .map_err(|_| GatherError::LockPoisoned("local exchange slots"));

        // Always depart, even on error, so peers are not left behind.
        self.exchange.depart.wait().await;
        let gathered = gathered?;

        if let Some(other) = gathered.iter().find(|b| b.len() != local.len()) {
            return Err(GatherError::BufferSizeMismatch {
                expected: local.len(),
                actual: other.len(),
            });
        }
        Ok(gathered)
    }
}

impl Collective for LocalBackend {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> u32 {
        self.world_size
    }

    fn all_gather_fixed<'a>(&'a self, local: &'a [u8]) -> BoxFuture<'a, Result<Vec<Vec<u8>>>> {
        Box::pin(self.round(local))
    }
}
