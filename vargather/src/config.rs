//! Group configuration for [`WorldContext::init`](crate::WorldContext::init).
//!
//! All values have defaults, so a process started without any environment
//! joins a single-rank group on `localhost:29500`. Override via environment
//! variables or by constructing a custom `WorldConfig`.

use crate::error::{GatherError, Result};
use crate::types::Rank;
use std::str::FromStr;
use std::time::Duration;

/// Default hub port, shared with the usual launcher conventions.
pub const DEFAULT_PORT: u16 = 29500;

/// Membership and tuning parameters for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldConfig {
    /// Host of rank 0 (the hub).
    pub address: String,

    /// Port rank 0 listens on.
    pub port: u16,

    /// This process's rank.
    pub rank: Rank,

    /// Number of ranks in the group.
    pub world_size: u32,

    /// Index of the local accelerator this rank is pinned to.
    pub local_device_index: u32,

    /// Upper bound on a single collective round. `None` blocks forever,
    /// which is the plain rendezvous contract.
    pub collective_timeout: Option<Duration>,

    /// How long rank 0 waits for the rest of the group, and how long the
    /// other ranks keep retrying their connection to rank 0.
    pub formation_timeout: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: DEFAULT_PORT,
            rank: 0,
            world_size: 1,
            local_device_index: 0,
            collective_timeout: None,
            formation_timeout: Duration::from_secs(60),
        }
    }
}

impl WorldConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `MASTER_ADDR`
    /// - `MASTER_PORT`
    /// - `RANK`
    /// - `WORLD_SIZE`
    /// - `LOCAL_RANK`
    /// - `VARGATHER_COLLECTIVE_TIMEOUT_SECS`
    /// - `VARGATHER_FORMATION_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("MASTER_ADDR") {
            cfg.address = v;
        } else {
            tracing::debug!(address = %cfg.address, "MASTER_ADDR unset, using default");
        }
        if let Some(port) = parse_var(&lookup, "MASTER_PORT") {
            cfg.port = port;
        }
        if let Some(rank) = parse_var(&lookup, "RANK") {
            cfg.rank = rank;
        }
        if let Some(world_size) = parse_var(&lookup, "WORLD_SIZE") {
            cfg.world_size = world_size;
        }
        if let Some(idx) = parse_var(&lookup, "LOCAL_RANK") {
            cfg.local_device_index = idx;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "VARGATHER_COLLECTIVE_TIMEOUT_SECS") {
            cfg.collective_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "VARGATHER_FORMATION_TIMEOUT_SECS") {
            cfg.formation_timeout = Duration::from_secs(secs);
        }

        cfg
    }

    /// Reject configurations no group can be formed from.
    pub fn validate(&self) -> Result<()> {
        if self.world_size == 0 {
            return Err(GatherError::InvalidConfig(
                "world_size must be at least 1".into(),
            ));
        }
        if self.rank >= self.world_size {
            return Err(GatherError::InvalidRank {
                rank: self.rank,
                world_size: self.world_size,
            });
        }
        Ok(())
    }
}

/// Absent variables fall back silently; malformed ones fall back with a warning.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = match lookup(key) {
        Some(raw) => raw,
        None => {
            tracing::debug!(key, "unset, using default");
            return None;
        }
    };
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "unparsable value, using default");
            None
        }
    }
}
