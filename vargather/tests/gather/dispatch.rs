use vargather::{
    GatherError, GatherPayload, Partial, PayloadKind, Tensor, TensorMap, concat, merge_payloads,
    merge_results,
};

use super::helpers::run_group;

#[tokio::test]
async fn test_raw_payload_carries_opaque_values() {
    let results = run_group(3, |ctx| async move {
        let note = "x".repeat(ctx.rank() as usize * 5);
        let payload = GatherPayload::<f32>::opaque(&note).unwrap();
        ctx.all_gather(&payload).await.unwrap()
    })
    .await;
    for out in results {
        let notes: Vec<String> = out.iter().map(|p| p.decode_raw().unwrap()).collect();
        assert_eq!(notes, vec!["", "xxxxx", "xxxxxxxxxx"]);
    }
}

#[tokio::test]
async fn test_tensor_and_structured_dispatch() {
    let results = run_group(2, |ctx| async move {
        let rows = ctx.rank() as usize + 1;
        let tensor: GatherPayload<i32> = Tensor::zeros(vec![rows, 2]).into();
        let tensors = ctx.all_gather(&tensor).await.unwrap();

        let mut map = TensorMap::new();
        map.insert(format!("r{}", ctx.rank()), Tensor::from_vec(vec![ctx.rank() as i32]));
        let maps = ctx.all_gather(&GatherPayload::Structured(map)).await.unwrap();
        (tensors, maps)
    })
    .await;
    for (tensors, maps) in results {
        assert!(tensors.iter().all(|p| p.kind() == PayloadKind::Tensor));
        let t1 = tensors[1].clone().into_tensor().unwrap();
        assert_eq!(t1.shape(), &[2, 2]);

        assert!(maps.iter().all(|p| p.kind() == PayloadKind::Structured));
        let m0 = maps[0].clone().into_structured().unwrap();
        assert_eq!(m0["r0"].data(), &[0]);
    }
}

#[tokio::test]
async fn test_sharded_work_gathered_and_concatenated() {
    let all_ids: Vec<u64> = (0..11).collect();
    let results = run_group(4, move |ctx| {
        let all_ids = all_ids.clone();
        async move {
            let mine: Vec<u64> = ctx.shard(&all_ids).into_iter().map(|id| id * id).collect();
            let gathered = ctx.all_gather_opaque(&mine).await.unwrap();
            concat(gathered)
        }
    })
    .await;

    for squares in results {
        assert_eq!(squares.len(), 11);
        let mut sorted = squares.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..11u64).map(|id| id * id).collect::<Vec<_>>());
        // rank 0's shard comes first
        assert_eq!(&squares[..3], &[0, 16, 64]);
    }
}

#[tokio::test]
async fn test_gathered_sequences_merge() {
    let results = run_group(3, |ctx| async move {
        let names: Vec<String> = (0..ctx.rank()).map(|i| format!("{}-{i}", ctx.rank())).collect();
        let gathered = ctx.all_gather_opaque(&names).await.unwrap();
        merge_results::<String, String>(gathered.into_iter().map(Partial::Seq).collect())
            .unwrap()
            .into_seq()
            .unwrap()
    })
    .await;
    for merged in results {
        assert_eq!(merged, vec!["1-0", "2-0", "2-1"]);
    }
}

#[tokio::test]
async fn test_gathered_structured_payloads_merge() {
    let results = run_group(3, |ctx| async move {
        let mut metrics = TensorMap::new();
        metrics.insert(
            format!("shard{}", ctx.rank()),
            Tensor::from_vec(vec![ctx.rank() as f64; ctx.rank() as usize + 1]),
        );
        metrics.insert("step".to_string(), Tensor::from_vec(vec![ctx.rank() as f64]));
        let gathered = ctx.all_gather(&GatherPayload::Structured(metrics)).await.unwrap();
        merge_payloads(gathered).unwrap().into_map().unwrap()
    })
    .await;
    for merged in results {
        assert_eq!(
            merged.keys().collect::<Vec<_>>(),
            vec!["shard0", "shard1", "shard2", "step"]
        );
        assert_eq!(merged["shard2"].data(), &[2.0, 2.0, 2.0]);
        assert_eq!(merged["step"].data(), &[2.0]);
    }
}

#[tokio::test]
async fn test_gathered_raw_payloads_do_not_merge() {
    let results = run_group(2, |ctx| async move {
        let payload = GatherPayload::<f32>::opaque(&u64::from(ctx.rank())).unwrap();
        let gathered = ctx.all_gather(&payload).await.unwrap();
        merge_payloads(gathered)
    })
    .await;
    for merged in results {
        assert!(matches!(
            merged,
            Err(GatherError::UnsupportedPayloadType { kind: "raw", rank: 0 })
        ));
    }
}
