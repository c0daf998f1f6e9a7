//! Combining per-rank results into one aggregate.

use crate::error::{GatherError, Result};
use crate::payload::GatherPayload;
use crate::tensor::Tensor;
use crate::types::{Element, Rank};
use std::collections::BTreeMap;

/// One rank's partial result, as handed to [`merge_results`].
#[derive(Debug, Clone, PartialEq)]
pub enum Partial<K, V> {
    Map(BTreeMap<K, V>),
    Seq(Vec<V>),
    /// A lone value. There is no rule for combining these.
    Value(V),
}

impl<K, V> Partial<K, V> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Map(_) => "map",
            Self::Seq(_) => "sequence",
            Self::Value(_) => "value",
        }
    }
}

impl<K, V> From<BTreeMap<K, V>> for Partial<K, V> {
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::Map(map)
    }
}

impl<K, V> From<Vec<V>> for Partial<K, V> {
    fn from(seq: Vec<V>) -> Self {
        Self::Seq(seq)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Merged<K, V> {
    Map(BTreeMap<K, V>),
    Seq(Vec<V>),
}

impl<K, V> Merged<K, V> {
    pub fn into_map(self) -> Option<BTreeMap<K, V>> {
        match self {
            Self::Map(map) => Some(map),
            Self::Seq(_) => None,
        }
    }

    pub fn into_seq(self) -> Option<Vec<V>> {
        match self {
            Self::Seq(seq) => Some(seq),
            Self::Map(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Map(map) => map.len(),
            Self::Seq(seq) => seq.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Combine results indexed by source rank.
///
/// The first entry decides the kind. Maps are unioned in rank order, so on a
/// shared key the highest rank wins. Sequences are concatenated in rank
/// order. A lone value, or an entry whose kind differs from the first, fails
/// with `UnsupportedPayloadType`. No input merges to an empty sequence.
pub fn merge_results<K: Ord, V>(partials: Vec<Partial<K, V>>) -> Result<Merged<K, V>> {
    let mut iter = partials.into_iter().enumerate();
    let mut merged = match iter.next() {
        None => return Ok(Merged::Seq(Vec::new())),
        Some((_, Partial::Map(map))) => Merged::Map(map),
        Some((_, Partial::Seq(seq))) => Merged::Seq(seq),
        Some((_, other @ Partial::Value(_))) => {
            return Err(GatherError::UnsupportedPayloadType {
                kind: other.kind(),
                rank: 0,
            });
        }
    };

    for (rank, partial) in iter {
        match (&mut merged, partial) {
            (Merged::Map(acc), Partial::Map(map)) => acc.extend(map),
            (Merged::Seq(acc), Partial::Seq(seq)) => acc.extend(seq),
            (_, other) => {
                return Err(GatherError::UnsupportedPayloadType {
                    kind: other.kind(),
                    rank: rank as Rank,
                });
            }
        }
    }
    Ok(merged)
}

/// [`merge_results`] over the output of [`all_gather`](crate::all_gather).
///
/// Structured payloads merge as maps. Tensor and raw payloads have no merge
/// rule and fail with `UnsupportedPayloadType` naming the offending rank.
pub fn merge_payloads<T: Element>(
    payloads: Vec<GatherPayload<T>>,
) -> Result<Merged<String, Tensor<T>>> {
    let partials = payloads
        .into_iter()
        .enumerate()
        .map(|(rank, payload)| match payload {
            GatherPayload::Structured(map) => Ok(Partial::Map(map)),
            other => Err(GatherError::UnsupportedPayloadType {
                kind: other.kind().name(),
                rank: rank as Rank,
            }),
        })
        .collect::<Result<Vec<_>>>()?;
    merge_results(partials)
}

/// Union of maps in rank order; later ranks overwrite earlier ones.
pub fn merge_maps<K: Ord, V>(maps: Vec<BTreeMap<K, V>>) -> BTreeMap<K, V> {
    maps.into_iter().fold(BTreeMap::new(), |mut acc, map| {
        acc.extend(map);
        acc
    })
}

/// Concatenation of sequences in rank order.
pub fn concat<V>(seqs: Vec<Vec<V>>) -> Vec<V> {
    seqs.into_iter().flatten().collect()
}
