//! Fixed-size collective primitives the padded gather is built on.

mod hub;
mod local;

pub use hub::{HubBackend, PendingHub};
pub use local::LocalBackend;

use crate::error::{GatherError, Result};
use crate::types::Rank;
use futures::future::BoxFuture;

/// A fixed-size all-gather over an already-formed group.
///
/// Every call is a rendezvous: it returns only once every rank has issued
/// the matching call. Ranks must issue calls in the same order.
pub trait Collective: Send + Sync {
    fn rank(&self) -> Rank;

    fn world_size(&self) -> u32;

    /// Exchange one buffer per rank. Every rank must pass the same length;
    /// a backend that sees differing lengths fails the call on every rank
    /// with `BufferSizeMismatch`. The result is indexed by source rank.
    fn all_gather_fixed<'a>(&'a self, local: &'a [u8]) -> BoxFuture<'a, Result<Vec<Vec<u8>>>>;

    /// Exchange one integer per rank.
    fn all_gather_scalar(&self, value: u64) -> BoxFuture<'_, Result<Vec<u64>>> {
        Box::pin(async move {
            let bytes = value.to_le_bytes();
            let parts = self.all_gather_fixed(&bytes).await?;
            parts
                .iter()
                .map(|p| {
                    let raw: [u8; 8] =
                        p.as_slice()
                            .try_into()
                            .map_err(|_| GatherError::BufferSizeMismatch {
                                expected: 8,
                                actual: p.len(),
                            })?;
                    Ok(u64::from_le_bytes(raw))
                })
                .collect()
        })
    }

    /// Release transport resources. Further calls are undefined.
    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

/// The single-rank group: every gather returns the caller's own buffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct Solo;

impl Collective for Solo {
    fn rank(&self) -> Rank {
        0
    }

    fn world_size(&self) -> u32 {
        1
    }

    fn all_gather_fixed<'a>(&'a self, local: &'a [u8]) -> BoxFuture<'a, Result<Vec<Vec<u8>>>> {
        Box::pin(async move { Ok(vec![local.to_vec()]) })
    }
}
