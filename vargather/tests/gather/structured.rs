use std::collections::BTreeMap;
use vargather::{Merged, Partial, Tensor, TensorMap, merge_maps, merge_results};

use super::helpers::run_group;

/// Per-sample embeddings of varying length, keyed by sample id.
fn embeddings(rank: u32) -> TensorMap<f32> {
    let mut map = TensorMap::new();
    for i in 0..=rank {
        let rows = (i + 1) as usize;
        let data = (0..rows * 4).map(|v| (rank * 1000 + i * 10) as f32 + v as f32).collect();
        map.insert(format!("sample-{rank}-{i}"), Tensor::new(vec![rows, 4], data).unwrap());
    }
    map
}

#[tokio::test]
async fn test_structured_gather_reconstructs_every_rank() {
    let results = run_group(3, |ctx| async move {
        let local = embeddings(ctx.rank());
        ctx.all_gather_structured(&local).await.unwrap()
    })
    .await;

    for out in results {
        assert_eq!(out.len(), 3);
        for (rank, map) in out.iter().enumerate() {
            assert_eq!(map, &embeddings(rank as u32));
        }
    }
}

#[tokio::test]
async fn test_structured_gather_then_merge() {
    let results = run_group(3, |ctx| async move {
        let local = embeddings(ctx.rank());
        let gathered = ctx.all_gather_structured(&local).await.unwrap();
        merge_maps(gathered)
    })
    .await;

    let mut expected = BTreeMap::new();
    for rank in 0..3 {
        expected.extend(embeddings(rank));
    }
    assert_eq!(expected.len(), 1 + 2 + 3);
    for merged in results {
        assert_eq!(merged, expected);
    }
}

#[tokio::test]
async fn test_overlapping_keys_later_rank_wins() {
    let results = run_group(2, |ctx| async move {
        let mut local = TensorMap::new();
        local.insert(
            "shared".to_string(),
            Tensor::from_vec(vec![ctx.rank() as i64; ctx.rank() as usize + 1]),
        );
        let gathered = ctx.all_gather_structured(&local).await.unwrap();
        merge_results(gathered.into_iter().map(Partial::Map).collect()).unwrap()
    })
    .await;
    for merged in results {
        let Merged::Map(map) = merged else {
            panic!("expected a map");
        };
        assert_eq!(map["shared"].data(), &[1, 1]);
    }
}

#[tokio::test]
async fn test_empty_and_scalar_entries() {
    let results = run_group(3, |ctx| async move {
        let mut local = TensorMap::new();
        match ctx.rank() {
            0 => {}
            1 => {
                local.insert("step".to_string(), Tensor::new(Vec::<usize>::new(), vec![7u64]).unwrap());
            }
            _ => {
                local.insert("empty".to_string(), Tensor::zeros(vec![0, 3]));
                local.insert("step".to_string(), Tensor::new(Vec::<usize>::new(), vec![9u64]).unwrap());
            }
        }
        ctx.all_gather_structured(&local).await.unwrap()
    })
    .await;
    for out in results {
        assert!(out[0].is_empty());
        assert_eq!(out[1]["step"].shape(), &[] as &[usize]);
        assert_eq!(out[1]["step"].data(), &[7]);
        assert_eq!(out[2]["empty"].shape(), &[0, 3]);
        assert_eq!(out[2]["step"].data(), &[9]);
    }
}
