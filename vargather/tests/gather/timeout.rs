use std::time::Duration;
use vargather::{GatherError, WorldConfig};

use super::helpers::{run_group, run_group_with_config};

#[tokio::test]
async fn test_missing_rank_times_out() {
    let config = WorldConfig {
        collective_timeout: Some(Duration::from_millis(100)),
        ..WorldConfig::default()
    };
    let results = run_group_with_config(2, &config, |ctx| async move {
        if ctx.rank() == 0 {
            Some(ctx.all_gather_elements(&[1.0f32, 2.0]).await)
        } else {
            None
        }
    })
    .await;
    assert!(matches!(
        results[0],
        Some(Err(GatherError::CollectiveTimeout {
            operation: "all_gather_scalar",
            timeout_ms: 100
        }))
    ));
}

#[tokio::test]
async fn test_fixed_size_mismatch_fails_every_rank() {
    let results = run_group(3, |ctx| async move {
        let local = vec![0u8; if ctx.rank() == 2 { 5 } else { 4 }];
        ctx.all_gather_fixed(&local).await
    })
    .await;
    for r in results {
        assert!(matches!(r, Err(GatherError::BufferSizeMismatch { .. })));
    }
}
