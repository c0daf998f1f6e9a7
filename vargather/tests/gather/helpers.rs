use std::sync::Arc;
use vargather::{WorldConfig, WorldContext};

/// Run `f` on every rank of an in-process group concurrently and return the
/// per-rank outputs in rank order.
pub async fn run_group<F, Fut, T>(world_size: u32, f: F) -> Vec<T>
where
    F: Fn(WorldContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    run_group_with_config(world_size, &WorldConfig::default(), f).await
}

pub async fn run_group_with_config<F, Fut, T>(world_size: u32, config: &WorldConfig, f: F) -> Vec<T>
where
    F: Fn(WorldContext) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let ctxs = WorldContext::local_group_with_config(world_size, config).unwrap();

    let f = Arc::new(f);
    let mut handles = Vec::new();
    for ctx in ctxs {
        let f = Arc::clone(&f);
        handles.push(tokio::spawn(async move { f(ctx).await }));
    }
    let mut out = Vec::with_capacity(handles.len());
    for h in handles {
        out.push(h.await.unwrap());
    }
    out
}
