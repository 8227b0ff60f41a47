use bevy::prelude::*;


/// Marks the camera whose pose drives splat depth sorting.
#[derive(
    Clone,
    Component,
    Debug,
    Default,
    Reflect,
)]
#[reflect(Component)]
pub struct SplatCamera;


#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub rotation: Quat,
    /// Depth direction. Unit length in world space; in a scaled local frame it
    /// carries the frame's scale so local depths equal world depths.
    view_axis: Vec3,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }
}

impl CameraPose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        let rotation = rotation.normalize();

        Self {
            position,
            rotation,
            view_axis: rotation * Vec3::NEG_Z,
        }
    }

    pub fn looking_at(position: Vec3, target: Vec3) -> Self {
        let transform = Transform::from_translation(position).looking_at(target, Vec3::Y);
        Self::new(transform.translation, transform.rotation)
    }

    pub fn from_global_transform(transform: &GlobalTransform) -> Self {
        let (_scale, rotation, translation) = transform.to_scale_rotation_translation();
        Self::new(translation, rotation)
    }

    /// The same pose expressed in the local frame of `frame`. Depths measured in that
    /// frame match world depths, also under non-uniform scale.
    pub fn relative_to(&self, frame: &GlobalTransform) -> Self {
        let (_scale, frame_rotation, _translation) = frame.to_scale_rotation_translation();
        let affine = frame.affine();

        Self {
            position: affine.inverse().transform_point3(self.position),
            rotation: (frame_rotation.inverse() * self.rotation).normalize(),
            view_axis: affine.matrix3.transpose().mul_vec3(self.view_axis),
        }
    }

    /// Cameras look down their local -Z.
    pub fn forward(&self) -> Vec3 {
        self.view_axis
    }

    /// Signed distance of `point` along the view direction.
    pub fn depth_of(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.forward())
    }

    pub fn moved_beyond(
        &self,
        previous: &CameraPose,
        translation_epsilon: f32,
        rotation_epsilon: f32,
    ) -> bool {
        self.position.distance(previous.position) > translation_epsilon
            || self.rotation.angle_between(previous.rotation) > rotation_epsilon
            || self.view_axis.angle_between(previous.view_axis) > rotation_epsilon
    }
}
