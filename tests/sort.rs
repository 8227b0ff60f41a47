use std::sync::Arc;

use bevy::math::{Quat, Vec3};
use bevy_splat_compare::{
    CameraPose,
    SortConfig,
    SortMode,
    random_splats,
    sort::{
        DepthSortEngine,
        SortExecution,
        SortState,
        compute_sort_order,
        counting::{depth_buckets, depth_keys},
    },
};


fn centers(count: usize) -> Vec<Vec3> {
    random_splats(count)
        .iter()
        .map(|splat| splat.position())
        .collect()
}

/// Outlasts the adaptive period left behind by a tiny sort.
fn settle() {
    std::thread::sleep(std::time::Duration::from_millis(5));
}

fn inline_engine() -> DepthSortEngine {
    DepthSortEngine::new(SortConfig {
        execution: SortExecution::Inline,
        ..Default::default()
    })
}


#[test]
fn order_is_a_permutation_for_any_pose() {
    let centers = centers(5000);
    let poses = [
        CameraPose::looking_at(Vec3::new(0.0, 0.0, 50.0), Vec3::ZERO),
        CameraPose::looking_at(Vec3::new(-30.0, 10.0, 0.0), Vec3::ZERO),
        CameraPose::new(Vec3::ZERO, Quat::from_rotation_x(1.3)),
    ];

    for mode in [SortMode::Counting, SortMode::Std, SortMode::None] {
        let config = SortConfig { mode, ..Default::default() };

        for pose in &poses {
            let order = compute_sort_order(&centers, pose, &config);
            let mut seen = vec![false; centers.len()];
            for &index in &order {
                assert!(!std::mem::replace(&mut seen[index as usize], true));
            }
            assert!(seen.iter().all(|&seen| seen));
        }
    }
}

#[test]
fn counting_order_is_far_to_near_by_bucket() {
    let centers = centers(10_000);
    let pose = CameraPose::looking_at(Vec3::new(5.0, 3.0, 60.0), Vec3::ZERO);
    let config = SortConfig::default();

    let order = compute_sort_order(&centers, &pose, &config);
    let buckets = depth_buckets(&depth_keys(&centers, &pose), config.bucket_count);

    for pair in order.windows(2) {
        assert!(buckets[pair[0] as usize] >= buckets[pair[1] as usize]);
    }
}

#[test]
fn unchanged_pose_sorts_deterministically() {
    let centers = centers(2000);
    let pose = CameraPose::looking_at(Vec3::new(1.0, 2.0, 30.0), Vec3::ZERO);
    let config = SortConfig::default();

    assert_eq!(
        compute_sort_order(&centers, &pose, &config),
        compute_sort_order(&centers, &pose, &config),
    );
}

#[test]
fn engine_publishes_new_orders_without_touching_old_ones() {
    let centers = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, -10.0),
        Vec3::new(0.0, 0.0, 5.0),
    ];
    let mut engine = inline_engine();
    assert_eq!(engine.state(), SortState::Idle);

    engine.submit_pose(CameraPose::looking_at(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO));
    assert!(engine.tick(3, || centers.clone()));
    assert_eq!(engine.state(), SortState::Ready);

    let first = engine.current_order();
    assert_eq!(first.indices(), &[1, 0, 2]);

    settle();
    engine.submit_pose(CameraPose::looking_at(Vec3::new(0.0, 0.0, -20.0), Vec3::ZERO));
    assert!(engine.tick(3, || centers.clone()));

    let second = engine.current_order();
    assert_eq!(second.indices(), &[2, 0, 1]);
    assert!(second.version() > first.version());
    assert_eq!(first.indices(), &[1, 0, 2]);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn engine_skips_sorts_within_epsilon() {
    let centers = vec![Vec3::ZERO, Vec3::Z];
    let mut engine = inline_engine();
    let pose = CameraPose::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);

    engine.submit_pose(pose);
    assert!(engine.tick(2, || centers.clone()));

    settle();
    let nudged = CameraPose::new(pose.position + Vec3::splat(1e-5), pose.rotation);
    engine.submit_pose(nudged);
    assert!(!engine.needs_sort(&nudged, 2));
    assert!(!engine.tick(2, || panic!("sorted within epsilon")));
}

#[test]
fn engine_extends_order_as_splats_arrive() {
    let mut engine = inline_engine();
    engine.submit_pose(CameraPose::looking_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO));
    engine.tick(2, || vec![Vec3::ZERO, Vec3::Z]);

    settle();
    let grown = vec![Vec3::ZERO, Vec3::Z, Vec3::NEG_Z, Vec3::X];
    engine.tick(4, || grown.clone());

    assert!(engine.current_order().is_permutation_of(4));
}

#[test]
fn background_sort_lands_on_a_later_tick() {
    let centers = centers(20_000);
    let mut engine = DepthSortEngine::new(SortConfig::default());
    engine.submit_pose(CameraPose::looking_at(Vec3::new(0.0, 0.0, 80.0), Vec3::ZERO));

    engine.tick(centers.len(), || centers.clone());
    assert!(engine.current_order().is_permutation_of(centers.len()));

    let started = std::time::Instant::now();
    while engine.current_order().pose().is_none() {
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        std::thread::sleep(std::time::Duration::from_millis(2));
        engine.tick(centers.len(), || centers.clone());
    }

    assert_eq!(engine.state(), SortState::Ready);
    assert!(engine.current_order().is_permutation_of(centers.len()));
}

#[test]
fn newest_pose_supersedes_a_running_sort() {
    let centers = centers(300_000);
    let mut engine = DepthSortEngine::new(SortConfig::default());

    let first = CameraPose::looking_at(Vec3::new(0.0, 0.0, 80.0), Vec3::ZERO);
    let skipped = CameraPose::looking_at(Vec3::new(80.0, 0.0, 0.0), Vec3::ZERO);
    let latest = CameraPose::looking_at(Vec3::new(0.0, 0.0, -80.0), Vec3::ZERO);

    engine.submit_pose(first);
    engine.tick(centers.len(), || centers.clone());
    assert_eq!(engine.state(), SortState::Sorting);

    engine.submit_pose(skipped);
    engine.submit_pose(latest);

    let mut published = Vec::new();
    let started = std::time::Instant::now();
    while engine.current_order().pose() != Some(&latest) {
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        engine.tick(centers.len(), || centers.clone());

        if let Some(&pose) = engine.current_order().pose() {
            if published.last() != Some(&pose) {
                published.push(pose);
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    assert!(!published.contains(&skipped));
    assert_eq!(published.last(), Some(&latest));

    for _ in 0..10 {
        engine.tick(centers.len(), || centers.clone());
        std::thread::sleep(std::time::Duration::from_millis(2));
    }

    let order = engine.current_order();
    assert_eq!(order.pose(), Some(&latest));
    assert_eq!(order.indices(), compute_sort_order(&centers, &latest, engine.config()).as_slice());
}
