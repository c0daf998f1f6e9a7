//! Ragged gather across an in-process group.
//!
//! Every rank contributes a tensor with a different number of rows plus a
//! map of named results; every rank gets all of them back intact.
//!
//! ```bash
//! cargo run --example ragged_gather
//! ```

use vargather::{Tensor, TensorMap, WorldContext, merge_maps};

#[tokio::main]
async fn main() -> vargather::Result<()> {
    let world_size = 4u32;
    let ctxs = WorldContext::local_group(world_size)?;

    let mut handles = Vec::new();
    for ctx in ctxs {
        handles.push(tokio::spawn(async move {
            let rank = ctx.rank();
            let rows = rank as usize + 1;
            let local = Tensor::new(vec![rows, 2], vec![rank as f32; rows * 2])?;
            let tensors = ctx.all_gather_tensor(&local).await?;

            let mut scores = TensorMap::new();
            scores.insert(format!("shard-{rank}"), Tensor::from_vec(vec![rank as f32 * 0.5]));
            let merged = merge_maps(ctx.all_gather_structured(&scores).await?);

            if ctx.is_primary() {
                for (src, t) in tensors.iter().enumerate() {
                    println!("rank {src}: shape {:?}", t.shape());
                }
                for (key, t) in &merged {
                    println!("{key} = {:?}", t.data());
                }
            }
            Ok::<_, vargather::GatherError>(())
        }));
    }

    for h in handles {
        h.await
            .map_err(|e| vargather::GatherError::transport(format!("task panicked: {e}")))??;
    }
    Ok(())
}
