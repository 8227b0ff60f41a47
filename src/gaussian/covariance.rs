use bevy::math::{Mat3, Quat, Vec3};

/// Upper triangle of `R * diag(scale^2) * R^T`, ordered M11, M12, M13, M22, M23, M33.
#[allow(non_snake_case)]
pub fn compute_covariance_3d(rotation: Quat, scale: Vec3) -> [f32; 6] {
    let R = Mat3::from_quat(rotation.normalize());
    let M = R * Mat3::from_diagonal(scale);
    let Sigma = M * M.transpose();

    [
        Sigma.x_axis.x,
        Sigma.y_axis.x,
        Sigma.z_axis.x,
        Sigma.y_axis.y,
        Sigma.z_axis.y,
        Sigma.z_axis.z,
    ]
}
