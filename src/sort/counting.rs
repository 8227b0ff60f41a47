use bevy::math::Vec3;

use crate::camera::CameraPose;


pub fn depth_keys(centers: &[Vec3], pose: &CameraPose) -> Vec<f32> {
    let forward = pose.forward();

    centers
        .iter()
        .map(|center| (*center - pose.position).dot(forward))
        .collect()
}

/// Quantizes depths into `bucket_count` buckets spanning their min/max.
/// Non-finite depths land in bucket 0 with the nearest splats.
pub fn depth_buckets(depths: &[f32], bucket_count: usize) -> Vec<u32> {
    let bucket_count = bucket_count.max(1);
    let (min, max) = depths
        .iter()
        .filter(|depth| depth.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), &depth| {
            (min.min(depth), max.max(depth))
        });

    let (min, max) = (min as f64, max as f64);
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0; depths.len()];
    }

    let scale = (bucket_count - 1) as f64 / range;
    let top = (bucket_count - 1) as u32;

    depths
        .iter()
        .map(|&depth| {
            if depth.is_finite() {
                (((depth as f64 - min) * scale) as u32).min(top)
            } else {
                0
            }
        })
        .collect()
}

/// Stable far-to-near permutation in O(n + bucket_count).
pub fn counting_sort_far_to_near(depths: &[f32], bucket_count: usize) -> Vec<u32> {
    let bucket_count = bucket_count.max(1);
    let buckets = depth_buckets(depths, bucket_count);

    let mut starts = vec![0u32; bucket_count];
    for &bucket in &buckets {
        starts[bucket as usize] += 1;
    }

    let mut offset = 0u32;
    for start in starts.iter_mut().rev() {
        let count = *start;
        *start = offset;
        offset += count;
    }

    let mut order = vec![0u32; depths.len()];
    for (index, &bucket) in buckets.iter().enumerate() {
        let slot = &mut starts[bucket as usize];
        order[*slot as usize] = index as u32;
        *slot += 1;
    }

    order
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::DEFAULT_BUCKET_COUNT;

    #[test]
    fn farthest_first() {
        let order = counting_sort_far_to_near(&[1.0, 5.0, 3.0, -2.0], 16);
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn equal_buckets_keep_index_order() {
        let order = counting_sort_far_to_near(&[2.0, 2.0, 2.0], 8);
        assert_eq!(order, vec![0, 1, 2]);

        let order = counting_sort_far_to_near(&[0.0, 10.0, 10.0, 0.0], 8);
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn non_finite_depths_draw_last() {
        let order = counting_sort_far_to_near(&[f32::NAN, 1.0, 2.0], 8);
        assert_eq!(order[0], 2);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn range_wider_than_f32_still_orders() {
        let depths = [-3.0e38, 0.0, 3.0e38];

        let buckets = depth_buckets(&depths, DEFAULT_BUCKET_COUNT);
        assert_eq!(buckets[0], 0);
        assert!(buckets[2] > buckets[1] && buckets[1] > 0);
        assert_eq!(counting_sort_far_to_near(&depths, DEFAULT_BUCKET_COUNT), vec![2, 1, 0]);
    }

    #[test]
    fn buckets_span_full_range() {
        let buckets = depth_buckets(&[-1.0, 0.0, 1.0], DEFAULT_BUCKET_COUNT);
        assert_eq!(buckets, vec![0, 32_767, 65_535]);
    }
}
