//! One rank of a multi-process group configured from the environment.
//!
//! Start one process per rank:
//!
//! ```bash
//! WORLD_SIZE=2 RANK=0 cargo run --example env_worker &
//! WORLD_SIZE=2 RANK=1 cargo run --example env_worker
//! ```
//!
//! Each rank squares its strided share of the ids; rank 0 prints the merged
//! results.

use vargather::{Partial, WorldContext, merge_results};

#[tokio::main]
async fn main() -> vargather::Result<()> {
    let ctx = WorldContext::init_from_env().await?;
    println!("rank {} of {} ready", ctx.rank(), ctx.world_size());

    let all_ids: Vec<u64> = (0..20).collect();
    let squares: Vec<u64> = ctx.shard(&all_ids).into_iter().map(|id| id * id).collect();

    let gathered = ctx.all_gather_opaque(&squares).await?;
    let merged = merge_results::<u64, u64>(gathered.into_iter().map(Partial::Seq).collect())?;

    if ctx.is_primary() {
        println!("{} results: {:?}", merged.len(), merged.into_seq());
    }

    ctx.shutdown().await;
    Ok(())
}
