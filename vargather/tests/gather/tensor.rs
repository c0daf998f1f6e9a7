use vargather::{GatherError, Tensor};

use super::helpers::run_group;

#[tokio::test]
async fn test_leading_dimension_reconstructed() {
    let results = run_group(3, |ctx| async move {
        let rows = ctx.rank() as usize + 1;
        let data: Vec<f32> = (0..rows * 2).map(|i| (ctx.rank() * 10) as f32 + i as f32).collect();
        let local = Tensor::new(vec![rows, 2], data).unwrap();
        ctx.all_gather_tensor(&local).await.unwrap()
    })
    .await;

    for out in results {
        let shapes: Vec<Vec<usize>> = out.iter().map(|t| t.shape().to_vec()).collect();
        assert_eq!(shapes, vec![vec![1, 2], vec![2, 2], vec![3, 2]]);
        assert_eq!(out[0].data(), &[0.0, 1.0]);
        assert_eq!(out[2].data(), &[20.0, 21.0, 22.0, 23.0, 24.0, 25.0]);
    }
}

#[tokio::test]
async fn test_higher_rank_trailing_dims() {
    let results = run_group(2, |ctx| async move {
        let lead = if ctx.rank() == 0 { 4 } else { 1 };
        let local: Tensor<i32> = Tensor::zeros(vec![lead, 2, 3]);
        ctx.all_gather_tensor(&local).await.unwrap()
    })
    .await;
    for out in results {
        assert_eq!(out[0].shape(), &[4, 2, 3]);
        assert_eq!(out[1].shape(), &[1, 2, 3]);
    }
}

#[tokio::test]
async fn test_empty_rank_gets_zero_rows() {
    let results = run_group(2, |ctx| async move {
        let rows = if ctx.rank() == 0 { 0 } else { 2 };
        let local: Tensor<f64> = Tensor::zeros(vec![rows, 5]);
        ctx.all_gather_tensor(&local).await.unwrap()
    })
    .await;
    for out in results {
        assert_eq!(out[0].shape(), &[0, 5]);
        assert!(out[0].is_empty());
        assert_eq!(out[1].shape(), &[2, 5]);
    }
}

#[tokio::test]
async fn test_mismatched_trailing_dims_detected() {
    // Rank 1 breaks the shared-trailing-dims precondition with a count
    // rank 0's trailing dims cannot divide.
    let results = run_group(2, |ctx| async move {
        let local: Tensor<u8> = if ctx.rank() == 0 {
            Tensor::zeros(vec![1, 3])
        } else {
            Tensor::zeros(vec![1, 4])
        };
        ctx.all_gather_tensor(&local).await
    })
    .await;
    assert!(matches!(
        results[0],
        Err(GatherError::ShapeMismatch {
            expected: 6,
            actual: 4
        })
    ));
}

#[tokio::test]
async fn test_zero_sized_trailing_dim_loses_leading_dim() {
    let results = run_group(2, |ctx| async move {
        let rows = ctx.rank() as usize + 3;
        let local = Tensor::<f32>::zeros(vec![rows, 0]);
        ctx.all_gather_tensor(&local).await.unwrap()
    })
    .await;
    for out in results {
        assert!(out.iter().all(|t| t.shape() == [0, 0]));
    }
}
