use crate::error::{GatherError, Result};
use crate::world::WorldContext;

/// Variable-length all-gather over a fixed-size primitive.
///
/// `local` holds `local.len() / elem_size` elements of `elem_size` bytes. The
/// group first exchanges element counts, then every rank pads its buffer with
/// zero bytes to the largest count and runs one fixed-size gather. Each
/// received buffer is cut back to its sender's count, so entry `i` is exactly
/// what rank `i` passed in.
///
/// Every rank must call this with the same `elem_size`.
pub async fn all_gather_padded(
    ctx: &WorldContext,
    local: &[u8],
    elem_size: usize,
) -> Result<Vec<Vec<u8>>> {
    if elem_size == 0 {
        return Err(GatherError::InvalidConfig(
            "element size must be at least 1 byte".into(),
        ));
    }
    if local.len() % elem_size != 0 {
        return Err(GatherError::SerializationFailure(format!(
            "{} bytes is not a whole number of {elem_size}-byte elements",
            local.len()
        )));
    }
    if ctx.world_size() == 1 {
        return Ok(vec![local.to_vec()]);
    }

    let local_size = (local.len() / elem_size) as u64;
    let size_list = ctx.all_gather_scalar(local_size).await?;
    let max_size = size_list.iter().copied().max().unwrap_or(0) as usize;

    tracing::debug!(
        rank = ctx.rank(),
        local_size,
        max_size,
        elem_size,
        "padded all-gather"
    );

    let mut padded = Vec::with_capacity(max_size * elem_size);
    padded.extend_from_slice(local);
    padded.resize(max_size * elem_size, 0);

    let gathered = ctx.all_gather_fixed(&padded).await?;
    gathered
        .into_iter()
        .zip(size_list)
        .map(|(mut buf, size)| {
            let keep = size as usize * elem_size;
            if keep > buf.len() {
                return Err(GatherError::BufferSizeMismatch {
                    expected: keep,
                    actual: buf.len(),
                });
            }
            buf.truncate(keep);
            Ok(buf)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_single_rank_is_identity() {
        let ctx = WorldContext::single();
        let out = all_gather_padded(&ctx, &[1, 2, 3, 4], 2).await.unwrap();
        assert_eq!(out, vec![vec![1, 2, 3, 4]]);
    }

    #[tokio::test]
    async fn test_rejects_zero_element_size() {
        let ctx = WorldContext::single();
        assert!(matches!(
            all_gather_padded(&ctx, &[1], 0).await,
            Err(GatherError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_partial_element() {
        let ctx = WorldContext::single();
        assert!(matches!(
            all_gather_padded(&ctx, &[1, 2, 3], 2).await,
            Err(GatherError::SerializationFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_ragged_sizes_preserved() {
        let handles: Vec<_> = WorldContext::local_group(3)
            .unwrap()
            .into_iter()
            .map(|ctx| {
                tokio::spawn(async move {
                    let n = ctx.rank() as usize * 2;
                    let local = vec![ctx.rank() as u8 + 1; n * 4];
                    all_gather_padded(&ctx, &local, 4).await.unwrap()
                })
            })
            .collect();
        for h in handles {
            let out = h.await.unwrap();
            assert_eq!(out[0], Vec::<u8>::new());
            assert_eq!(out[1], vec![2; 8]);
            assert_eq!(out[2], vec![3; 16]);
        }
    }
}
