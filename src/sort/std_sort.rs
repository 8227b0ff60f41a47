/// Comparison sort baseline: stable, far-to-near by exact depth.
pub fn std_sort_far_to_near(depths: &[f32]) -> Vec<u32> {
    let mut order: Vec<u32> = (0..depths.len() as u32).collect();

    order.sort_by(|&a, &b| {
        depths[b as usize].total_cmp(&depths[a as usize])
    });

    order
}
