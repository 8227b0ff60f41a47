use bevy::math::Vec3;
use rayon::prelude::*;

use crate::camera::CameraPose;


pub fn par_depth_keys(centers: &[Vec3], pose: &CameraPose) -> Vec<f32> {
    let forward = pose.forward();

    centers
        .par_iter()
        .map(|center| (*center - pose.position).dot(forward))
        .collect()
}
