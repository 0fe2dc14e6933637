//! Static scene layout.
//!
//! The stage is a fixed arrangement of emissive box fixtures down a tunnel:
//! back lasers on the far wall, ring frames along the length, angled side
//! lasers, and a center floor strip. Positions never change at runtime;
//! events only modulate color and intensity.

use glam::Vec3;

/// X centers of the four note/obstacle lanes.
pub const LANE_X: [f32; 4] = [-2.25, -0.75, 0.75, 2.25];
/// Width of one lane.
pub const LANE_WIDTH: f32 = 1.5;
/// Y centers of the three note layers.
pub const LAYER_Y: [f32; 3] = [0.6, 1.6, 2.6];
/// Distance from the spawn plane to the camera plane.
pub const TUNNEL_LENGTH: f32 = 120.0;

const RING_COUNT: usize = 8;
const RING_SPACING: f32 = 14.0;
const RING_HALF: f32 = 8.0;
const SIDE_LASER_COUNT: usize = 6;
const BACK_LASER_COUNT: usize = 8;

/// One static emissive box belonging to a light group.
#[derive(Debug, Clone, Copy)]
pub struct Fixture {
    pub group: u8,
    pub translation: Vec3,
    pub scale: Vec3,
}

/// All light fixtures of the stage.
pub fn fixtures() -> Vec<Fixture> {
    let mut out = Vec::new();

    // Group 0: back lasers fanned across the far wall.
    for i in 0..BACK_LASER_COUNT {
        let spread = i as f32 - (BACK_LASER_COUNT as f32 - 1.0) / 2.0;
        out.push(Fixture {
            group: 0,
            translation: Vec3::new(spread * 2.4, 7.0, -TUNNEL_LENGTH),
            scale: Vec3::new(0.3, 14.0, 0.3),
        });
    }

    // Group 1: square ring frames along the tunnel, four bars each.
    for ring in 0..RING_COUNT {
        let z = -12.0 - ring as f32 * RING_SPACING;
        let cy = RING_HALF + 1.0;
        let long = Vec3::new(2.0 * RING_HALF, 0.4, 0.4);
        let tall = Vec3::new(0.4, 2.0 * RING_HALF, 0.4);
        out.push(Fixture {
            group: 1,
            translation: Vec3::new(0.0, cy + RING_HALF, z),
            scale: long,
        });
        out.push(Fixture {
            group: 1,
            translation: Vec3::new(0.0, cy - RING_HALF, z),
            scale: long,
        });
        out.push(Fixture {
            group: 1,
            translation: Vec3::new(-RING_HALF, cy, z),
            scale: tall,
        });
        out.push(Fixture {
            group: 1,
            translation: Vec3::new(RING_HALF, cy, z),
            scale: tall,
        });
    }

    // Groups 2 and 3: left and right laser columns.
    for i in 0..SIDE_LASER_COUNT {
        let z = -20.0 - i as f32 * 16.0;
        let scale = Vec3::new(0.25, 11.0, 0.25);
        out.push(Fixture {
            group: 2,
            translation: Vec3::new(-11.0, 5.0, z),
            scale,
        });
        out.push(Fixture {
            group: 3,
            translation: Vec3::new(11.0, 5.0, z),
            scale,
        });
    }

    // Group 4: center floor strip down the runway.
    for i in 0..10 {
        out.push(Fixture {
            group: 4,
            translation: Vec3::new(0.0, 0.02, -6.0 - i as f32 * 11.0),
            scale: Vec3::new(5.5, 0.06, 9.0),
        });
    }

    out
}

/// The static dim floor slab.
pub fn floor() -> (Vec3, Vec3) {
    (
        Vec3::new(0.0, -0.25, -TUNNEL_LENGTH / 2.0),
        Vec3::new(26.0, 0.5, TUNNEL_LENGTH + 20.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::state::LIGHT_GROUP_COUNT;

    #[test]
    fn test_every_fixture_has_a_valid_group() {
        for fixture in fixtures() {
            assert!((fixture.group as usize) < LIGHT_GROUP_COUNT);
        }
    }

    #[test]
    fn test_every_group_has_fixtures() {
        let all = fixtures();
        for group in 0..LIGHT_GROUP_COUNT as u8 {
            assert!(all.iter().any(|f| f.group == group), "group {} empty", group);
        }
    }
}
