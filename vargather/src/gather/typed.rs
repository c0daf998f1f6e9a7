use crate::codec::{
    Opaque, decode_opaque, elements_from_bytes, elements_to_bytes, encode_opaque, flatten,
    shapes_from_wire, shapes_to_wire, unflatten,
};
use crate::error::{GatherError, Result};
use crate::gather::padded::all_gather_padded;
use crate::payload::GatherPayload;
use crate::tensor::{Tensor, TensorMap, numel};
use crate::types::Element;
use crate::world::WorldContext;

/// Gather a 1-D buffer of any length from every rank.
pub async fn all_gather_elements<T: Element>(
    ctx: &WorldContext,
    local: &[T],
) -> Result<Vec<Vec<T>>> {
    if ctx.world_size() == 1 {
        return Ok(vec![local.to_vec()]);
    }
    let bytes = elements_to_bytes(local);
    all_gather_padded(ctx, &bytes, T::DTYPE.size_in_bytes())
        .await?
        .iter()
        .map(|part| elements_from_bytes(part))
        .collect()
}

/// Gather a tensor whose leading dimension may differ between ranks.
///
/// The trailing dimensions of `local` are assumed to match on every rank;
/// each result gets them back, with the leading dimension recomputed from its
/// element count. A 0-d tensor comes back as 1-D.
///
/// A zero-sized trailing dimension leaves no element count to recover the
/// leading dimension from, so a `[3, 0]` tensor comes back as `[0, 0]` when
/// `world_size > 1`. With a single rank the tensor is returned unchanged.
pub async fn all_gather_tensor<T: Element>(
    ctx: &WorldContext,
    local: &Tensor<T>,
) -> Result<Vec<Tensor<T>>> {
    if ctx.world_size() == 1 {
        return Ok(vec![local.clone()]);
    }
    let trailing = local.trailing_dims().to_vec();
    all_gather_elements(ctx, local.data())
        .await?
        .into_iter()
        .map(|data| with_leading_dim(data, &trailing))
        .collect()
}

fn with_leading_dim<T: Element>(data: Vec<T>, trailing: &[usize]) -> Result<Tensor<T>> {
    let inner = numel(trailing);
    let leading = if data.is_empty() {
        0
    } else if inner == 0 || data.len() % inner != 0 {
        return Err(GatherError::ShapeMismatch {
            expected: if inner == 0 {
                0
            } else {
                data.len().next_multiple_of(inner)
            },
            actual: data.len(),
        });
    } else {
        data.len() / inner
    };
    let mut shape = Vec::with_capacity(trailing.len() + 1);
    shape.push(leading);
    shape.extend_from_slice(trailing);
    Tensor::new(shape, data)
}

/// Gather a map of named tensors. Keys and shapes may differ between ranks.
///
/// Runs three gathers in a fixed order: keys, shapes, then the flattened
/// element buffer.
pub async fn all_gather_structured<T: Element>(
    ctx: &WorldContext,
    local: &TensorMap<T>,
) -> Result<Vec<TensorMap<T>>> {
    if ctx.world_size() == 1 {
        return Ok(vec![local.clone()]);
    }
    let flat = flatten(local);
    let keys: Vec<Vec<String>> = all_gather_opaque(ctx, &flat.keys).await?;
    let shapes: Vec<Vec<Vec<u64>>> = all_gather_opaque(ctx, &shapes_to_wire(&flat.shapes)).await?;
    let buffers = all_gather_elements(ctx, &flat.buffer).await?;

    tracing::debug!(
        rank = ctx.rank(),
        keys = flat.keys.len(),
        elements = flat.buffer.len(),
        "structured all-gather"
    );

    keys.into_iter()
        .zip(shapes)
        .zip(buffers)
        .map(|((keys, shapes), buffer)| unflatten(&keys, &shapes_from_wire(shapes)?, &buffer))
        .collect()
}

/// Gather any [`Opaque`] value.
pub async fn all_gather_opaque<V: Opaque + Clone>(ctx: &WorldContext, value: &V) -> Result<Vec<V>> {
    if ctx.world_size() == 1 {
        return Ok(vec![value.clone()]);
    }
    let bytes = encode_opaque(value)?;
    all_gather_padded(ctx, &bytes, 1)
        .await?
        .iter()
        .map(|part| decode_opaque(part))
        .collect()
}

/// Gather a payload, dispatching on its variant.
pub async fn all_gather<T: Element>(
    ctx: &WorldContext,
    payload: &GatherPayload<T>,
) -> Result<Vec<GatherPayload<T>>> {
    Ok(match payload {
        GatherPayload::Raw(bytes) => all_gather_padded(ctx, bytes, 1)
            .await?
            .into_iter()
            .map(GatherPayload::Raw)
            .collect(),
        GatherPayload::Tensor(tensor) => all_gather_tensor(ctx, tensor)
            .await?
            .into_iter()
            .map(GatherPayload::Tensor)
            .collect(),
        GatherPayload::Structured(map) => all_gather_structured(ctx, map)
            .await?
            .into_iter()
            .map(GatherPayload::Structured)
            .collect(),
    })
}
