use bevy::math::{Quat, Vec3};
use bytemuck::{
    Pod,
    Zeroable,
};


pub type Position = [f32; 3];

/// One decoded splat. Only lives between the parser and the packer.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Pod,
    Zeroable,
)]
#[repr(C)]
pub struct SplatRecord {
    pub position: Position,
    pub scale: [f32; 3],
    /// w, x, y, z
    pub rotation: [f32; 4],
    pub color: [u8; 4],
}

impl Default for SplatRecord {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            scale: [1.0; 3],
            rotation: [1.0, 0.0, 0.0, 0.0],
            color: [255; 4],
        }
    }
}

impl SplatRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }

    pub fn quat(&self) -> Quat {
        let [w, x, y, z] = self.rotation;
        Quat::from_xyzw(x, y, z, w)
    }

    pub fn with_quat(mut self, quat: Quat) -> Self {
        self.rotation = [quat.w, quat.x, quat.y, quat.z];
        self
    }
}
