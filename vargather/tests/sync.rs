use std::thread;
use vargather::{SyncWorld, Tensor};

#[test]
fn test_sync_world_across_threads() {
    let worlds = SyncWorld::local_group(3).unwrap();
    let handles: Vec<_> = worlds
        .into_iter()
        .map(|world| {
            thread::spawn(move || {
                let rows = world.rank() as usize;
                let local: Tensor<f32> = Tensor::zeros(vec![rows, 3]);
                let tensors = world.all_gather_tensor(&local).unwrap();
                let names = world
                    .all_gather_opaque(&format!("worker-{}", world.rank()))
                    .unwrap();
                (tensors, names)
            })
        })
        .collect();

    for h in handles {
        let (tensors, names) = h.join().unwrap();
        let rows: Vec<usize> = tensors.iter().map(|t| t.shape()[0]).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(names, vec!["worker-0", "worker-1", "worker-2"]);
    }
}

#[test]
fn test_sync_world_single() {
    let world = SyncWorld::from_context(Default::default()).unwrap();
    assert!(world.is_primary());
    assert_eq!(world.all_gather_elements(&[3u8, 4]).unwrap(), vec![vec![3, 4]]);
    world.shutdown();
}
