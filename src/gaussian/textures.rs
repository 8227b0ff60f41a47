use bevy::{
    log::info,
    math::{UVec2, Vec3},
};

use crate::{
    error::{SplatError, SplatResult},
    gaussian::{
        packed::{
            CenterScaleTexel,
            CovColorTexel,
            pack_splat,
        },
        record::SplatRecord,
    },
};


/// The two fixed-layout data textures, indexed by the linear splat index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedTextures {
    size: UVec2,
    center_and_scale: Vec<CenterScaleTexel>,
    cov_and_color: Vec<CovColorTexel>,
}

impl PackedTextures {
    pub fn with_capacity(capacity: usize) -> Self {
        let size = texture_size_for(capacity);
        let texels = (size.x * size.y) as usize;

        Self {
            size,
            center_and_scale: vec![CenterScaleTexel::default(); texels],
            cov_and_color: vec![CovColorTexel::default(); texels],
        }
    }

    pub fn capacity(&self) -> usize {
        self.center_and_scale.len()
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn center_and_scale(&self) -> &[CenterScaleTexel] {
        &self.center_and_scale
    }

    pub fn cov_and_color(&self) -> &[CovColorTexel] {
        &self.cov_and_color
    }

    pub fn centers(&self, count: usize) -> Vec<Vec3> {
        self.center_and_scale[..count.min(self.capacity())]
            .iter()
            .map(|texel| Vec3::from_array(texel.center))
            .collect()
    }

    /// Packs `records` at `start..start + records.len()`. Existing texels are never moved.
    pub fn write_range(
        &mut self,
        start: usize,
        records: &[SplatRecord],
    ) -> SplatResult<()> {
        let needed = start + records.len();
        if needed > self.capacity() {
            return Err(SplatError::CapacityExceeded {
                needed,
                capacity: self.capacity(),
            });
        }

        let centers = &mut self.center_and_scale[start..needed];
        let covariances = &mut self.cov_and_color[start..needed];

        for ((record, center), covariance) in records.iter()
            .zip(centers.iter_mut())
            .zip(covariances.iter_mut())
        {
            (*center, *covariance) = pack_splat(record);
        }

        Ok(())
    }

    /// Reallocates to hold at least `capacity` splats, copying every existing texel
    /// to the same linear index.
    pub fn grow(&mut self, capacity: usize) {
        if capacity <= self.capacity() {
            return;
        }

        let mut grown = Self::with_capacity(capacity);
        let existing = self.capacity();
        grown.center_and_scale[..existing].copy_from_slice(&self.center_and_scale);
        grown.cov_and_color[..existing].copy_from_slice(&self.cov_and_color);

        info!(
            "growing splat textures {}x{} -> {}x{}",
            self.size.x,
            self.size.y,
            grown.size.x,
            grown.size.y,
        );

        *self = grown;
    }

    /// Writes `records`, growing first when they do not fit.
    pub fn write_or_grow(
        &mut self,
        start: usize,
        records: &[SplatRecord],
    ) -> SplatResult<()> {
        match self.write_range(start, records) {
            Err(SplatError::CapacityExceeded { needed, capacity }) => {
                self.grow(needed.max(capacity * 2));
                self.write_range(start, records)
            }
            result => result,
        }
    }

    pub fn center_and_scale_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.center_and_scale.as_slice())
    }

    pub fn cov_and_color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.cov_and_color.as_slice())
    }
}


/// Smallest near-square rectangle holding `count` texels (at least 1x1).
pub fn texture_size_for(count: usize) -> UVec2 {
    let count = count.max(1);
    let width = (count as f64).sqrt().ceil() as usize;
    let height = count.div_ceil(width);

    UVec2::new(width as u32, height as u32)
}
