use std::io::BufRead;

use bevy::math::Quat;
use ply_rs::{
    parser::Parser,
    ply::{Property, PropertyAccess},
};

use crate::gaussian::record::SplatRecord;


pub const MAX_SIZE_VARIANCE: f32 = 4.0;
pub const SH_C0: f32 = 0.282_094_8;


/// Raw 3dgs vertex before activation.
#[derive(Clone, Copy, Debug, Default)]
struct PlyGaussian {
    position: [f32; 3],
    f_dc: [f32; 3],
    log_scale: [f32; 3],
    opacity_logit: f32,
    rotation: [f32; 4],
}

impl PropertyAccess for PlyGaussian {
    fn new() -> Self {
        PlyGaussian::default()
    }

    fn set_property(&mut self, key: String, property: Property) {
        match (key.as_ref(), property) {
            ("x", Property::Float(v)) => self.position[0] = v,
            ("y", Property::Float(v)) => self.position[1] = v,
            ("z", Property::Float(v)) => self.position[2] = v,
            ("f_dc_0", Property::Float(v)) => self.f_dc[0] = v,
            ("f_dc_1", Property::Float(v)) => self.f_dc[1] = v,
            ("f_dc_2", Property::Float(v)) => self.f_dc[2] = v,
            ("scale_0", Property::Float(v)) => self.log_scale[0] = v,
            ("scale_1", Property::Float(v)) => self.log_scale[1] = v,
            ("scale_2", Property::Float(v)) => self.log_scale[2] = v,
            ("opacity", Property::Float(v)) => self.opacity_logit = v,
            ("rot_0", Property::Float(v)) => self.rotation[0] = v,
            ("rot_1", Property::Float(v)) => self.rotation[1] = v,
            ("rot_2", Property::Float(v)) => self.rotation[2] = v,
            ("rot_3", Property::Float(v)) => self.rotation[3] = v,
            (_, _) => {}
        }
    }
}

impl From<PlyGaussian> for SplatRecord {
    fn from(gaussian: PlyGaussian) -> Self {
        let mean_scale = gaussian.log_scale.iter().sum::<f32>() / 3.0;
        let scale = gaussian.log_scale.map(|s| {
            s.clamp(mean_scale - MAX_SIZE_VARIANCE, mean_scale + MAX_SIZE_VARIANCE)
                .exp()
        });

        let to_byte = |v: f32| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        let color = gaussian.f_dc.map(|dc| to_byte(0.5 + SH_C0 * dc));
        let alpha = to_byte(1.0 / (1.0 + (-gaussian.opacity_logit).exp()));

        let [w, x, y, z] = gaussian.rotation;
        let rotation = Quat::from_xyzw(x, y, z, w);
        let rotation = if rotation.length_squared() > 0.0 {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };

        SplatRecord {
            position: gaussian.position,
            scale,
            color: [color[0], color[1], color[2], alpha],
            ..Default::default()
        }
        .with_quat(rotation)
    }
}


pub fn parse_ply(mut reader: &mut dyn BufRead) -> Result<Vec<SplatRecord>, std::io::Error> {
    let gaussian_parser = Parser::<PlyGaussian>::new();
    let header = gaussian_parser.read_header(&mut reader)?;

    let required_properties = [
        "x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2", "scale_0", "scale_1", "scale_2",
        "opacity", "rot_0", "rot_1", "rot_2", "rot_3",
    ];

    let mut cloud = Vec::new();
    for (_key, element) in &header.elements {
        if element.name != "vertex" {
            continue;
        }

        let missing = required_properties
            .iter()
            .filter(|name| !element.properties.contains_key(**name))
            .count();
        if missing > 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("missing {missing} required vertex properties"),
            ));
        }

        cloud = gaussian_parser.read_payload_for_element(&mut reader, element, &header)?;
    }

    Ok(cloud.into_iter().map(SplatRecord::from).collect())
}
