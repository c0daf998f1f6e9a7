use vargather::{Tensor, TensorMap, WorldContext};

use super::helpers::run_group;

#[tokio::test]
async fn test_single_rank_returns_own_contribution() {
    let ctx = WorldContext::single();

    let out = ctx.all_gather_elements(&[1.5f32, 2.5]).await.unwrap();
    assert_eq!(out, vec![vec![1.5, 2.5]]);

    let t = Tensor::new(vec![3, 1], vec![7i64, 8, 9]).unwrap();
    assert_eq!(ctx.all_gather_tensor(&t).await.unwrap(), vec![t]);

    let mut map = TensorMap::new();
    map.insert("loss".to_string(), Tensor::from_vec(vec![0.25f64]));
    assert_eq!(ctx.all_gather_structured(&map).await.unwrap(), vec![map]);

    let note = "only rank".to_string();
    assert_eq!(ctx.all_gather_opaque(&note).await.unwrap(), vec![note]);
}

#[tokio::test]
async fn test_ragged_elements_keep_their_lengths() {
    let results = run_group(4, |ctx| async move {
        let rank = ctx.rank() as usize;
        let local: Vec<f64> = (0..rank * 3).map(|i| (rank * 100 + i) as f64).collect();
        ctx.all_gather_elements(&local).await.unwrap()
    })
    .await;

    for out in &results {
        assert_eq!(out.len(), 4);
        for (rank, part) in out.iter().enumerate() {
            let expected: Vec<f64> = (0..rank * 3).map(|i| (rank * 100 + i) as f64).collect();
            assert_eq!(part, &expected, "entry {rank}");
        }
    }
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_every_rank_empty() {
    let results = run_group(3, |ctx| async move {
        ctx.all_gather_elements::<u32>(&[]).await.unwrap()
    })
    .await;
    for out in results {
        assert_eq!(out, vec![Vec::<u32>::new(); 3]);
    }
}

#[tokio::test]
async fn test_one_large_contribution() {
    let results = run_group(3, |ctx| async move {
        let local = if ctx.rank() == 1 {
            vec![42u8; 10_000]
        } else {
            vec![ctx.rank() as u8]
        };
        ctx.all_gather_padded(&local, 1).await.unwrap()
    })
    .await;
    for out in results {
        assert_eq!(out[0], vec![0]);
        assert_eq!(out[1].len(), 10_000);
        assert!(out[1].iter().all(|&b| b == 42));
        assert_eq!(out[2], vec![2]);
    }
}

#[tokio::test]
async fn test_consecutive_gathers_stay_aligned() {
    let results = run_group(3, |ctx| async move {
        let mut rounds = Vec::new();
        for round in 0..4u32 {
            let n = ((ctx.rank() + round) % 3) as usize;
            rounds.push(ctx.all_gather_elements(&vec![round as i32; n]).await.unwrap());
        }
        rounds
    })
    .await;
    for rounds in results {
        for (round, out) in rounds.iter().enumerate() {
            for (rank, part) in out.iter().enumerate() {
                let n = (rank + round) % 3;
                assert_eq!(part, &vec![round as i32; n]);
            }
        }
    }
}

#[tokio::test]
async fn test_rank_i_contributes_i_plus_one() {
    let results = run_group(5, |ctx| async move {
        let local = vec![ctx.rank() as i32; ctx.rank() as usize + 1];
        ctx.all_gather_elements(&local).await.unwrap()
    })
    .await;
    for out in results {
        assert_eq!(out.len(), 5);
        for (rank, part) in out.iter().enumerate() {
            assert_eq!(part, &vec![rank as i32; rank + 1]);
        }
    }
}
