use bevy::math::Quat;
use rand::{
    prelude::Distribution,
    Rng,
};

use crate::gaussian::record::SplatRecord;


impl Distribution<SplatRecord> for rand::distributions::Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> SplatRecord {
        let rotation = Quat::from_xyzw(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        ).normalize();

        SplatRecord {
            position: [
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
                rng.gen_range(-20.0..20.0),
            ],
            scale: [
                rng.gen_range(0.01..1.0),
                rng.gen_range(0.01..1.0),
                rng.gen_range(0.01..1.0),
            ],
            color: rng.r#gen(),
            ..Default::default()
        }
        .with_quat(rotation)
    }
}

pub fn random_splats(n: usize) -> Vec<SplatRecord> {
    let mut rng = rand::thread_rng();
    let mut splats: Vec<SplatRecord> = Vec::with_capacity(n);

    for _ in 0..n {
        splats.push(rng.r#gen());
    }

    splats
}
