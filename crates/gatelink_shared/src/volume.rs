use glam::Vec3;

use crate::frame::Frame;

const AXIS_EPSILON: f32 = 1.0e-10;

#[derive(Debug, Copy, Clone)]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }
}

/// Oriented box occupied by a portal's display surface, used for overlap queries.
#[derive(Debug, Copy, Clone)]
pub struct SurfaceVolume {
    pub frame: Frame,
    /// Half size along the surface's local forward, right and up axes, before frame scale.
    pub half_extents: Vec3,
}

impl SurfaceVolume {
    pub fn new(frame: Frame, half_extents: Vec3) -> Self {
        Self {
            frame,
            half_extents,
        }
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        let local = self.frame.inverse_transform_point(point);
        local.x.abs() <= self.half_extents.x
            && local.y.abs() <= self.half_extents.y
            && local.z.abs() <= self.half_extents.z
    }

    /// World-space bounds of the oriented box.
    pub fn bounds(&self) -> AABB {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in 0..8 {
            let sign = Vec3::new(
                if corner & 1 == 0 { -1.0 } else { 1.0 },
                if corner & 2 == 0 { -1.0 } else { 1.0 },
                if corner & 4 == 0 { -1.0 } else { 1.0 },
            );
            let world = self.frame.transform_point(self.half_extents * sign);
            min = min.min(world);
            max = max.max(world);
        }
        AABB { min, max }
    }

    /// Separating-axis test of an axis-aligned actor box against the oriented surface box.
    pub fn overlaps_box(&self, other: &AABB) -> bool {
        if !self.bounds().intersects(other) {
            return false;
        }

        let center = (other.min + other.max) * 0.5;
        let half = (other.max - other.min) * 0.5;
        let extents = self.half_extents * self.frame.scale.abs();
        let axes = [
            self.frame.rotation * Vec3::X,
            self.frame.rotation * Vec3::Y,
            self.frame.rotation * Vec3::Z,
        ];
        let delta = self.frame.translation - center;

        let separated = |axis: Vec3| {
            if axis.length_squared() < AXIS_EPSILON {
                return false;
            }
            let own = extents.x * axes[0].dot(axis).abs()
                + extents.y * axes[1].dot(axis).abs()
                + extents.z * axes[2].dot(axis).abs();
            let theirs = half.dot(axis.abs());
            delta.dot(axis).abs() > own + theirs
        };

        let world = [Vec3::X, Vec3::Y, Vec3::Z];
        if world.iter().chain(axes.iter()).any(|&axis| separated(axis)) {
            return false;
        }
        // Parallel edge pairs give a zero cross product and are skipped.
        !world
            .iter()
            .any(|&w| axes.iter().any(|&a| separated(w.cross(a))))
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::{SurfaceVolume, AABB};
    use crate::frame::{rotation_from_degrees, Frame};

    #[test]
    fn aabb_collision_detection() {
        let a = AABB {
            min: Vec3::new(0.0, 0.0, 0.0),
            max: Vec3::new(1.0, 1.0, 1.0),
        };
        let b = AABB {
            min: Vec3::new(0.5, 0.25, 0.5),
            max: Vec3::new(1.5, 1.25, 1.5),
        };
        let c = AABB {
            min: Vec3::new(1.0, 1.0, 1.0),
            max: Vec3::new(2.0, 2.0, 2.0),
        };

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn rotated_volume_contains_points_along_its_own_axes() {
        let frame = Frame::from_translation_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            rotation_from_degrees(90.0, 0.0, 0.0),
        );
        let volume = SurfaceVolume::new(frame, Vec3::new(0.25, 1.0, 2.0));

        // Local right is world -X after a quarter turn.
        assert!(volume.contains_point(Vec3::new(9.2, 0.0, 1.5)));
        assert!(!volume.contains_point(Vec3::new(10.0, 0.5, 0.0)));
    }

    #[test]
    fn actor_box_touching_the_surface_overlaps() {
        let volume = SurfaceVolume::new(Frame::IDENTITY, Vec3::new(0.1, 1.0, 2.0));
        let touching = AABB::from_center_half_extents(Vec3::new(0.3, 0.0, 0.0), Vec3::splat(0.25));
        let clear = AABB::from_center_half_extents(Vec3::new(0.5, 0.0, 0.0), Vec3::splat(0.25));

        assert!(volume.overlaps_box(&touching));
        assert!(!volume.overlaps_box(&clear));
    }

    #[test]
    fn thin_tilted_surface_overlaps_a_box_it_clips_near_the_corner() {
        let yaw = 1.0f32.atan2(0.2).to_degrees();
        let rotation = rotation_from_degrees(yaw, 0.0, 0.0);
        let shared = Vec3::new(0.95, 0.95, 0.0);
        let volume = SurfaceVolume::new(
            Frame::from_translation_rotation(shared, rotation),
            Vec3::new(0.005, 2.0, 2.0),
        );
        let actor = AABB::from_center_half_extents(Vec3::ZERO, Vec3::ONE);

        assert!(volume.contains_point(shared));
        assert!(volume.overlaps_box(&actor));

        let beyond = SurfaceVolume::new(
            Frame::from_translation_rotation(Vec3::new(1.2, 1.2, 0.0), rotation),
            Vec3::new(0.005, 2.0, 2.0),
        );
        assert!(!beyond.overlaps_box(&actor));
    }

    #[test]
    fn scaled_surface_overlaps_with_its_world_size() {
        let frame = Frame::new(Vec3::ZERO, rotation_from_degrees(30.0, 0.0, 0.0), Vec3::splat(2.0));
        let volume = SurfaceVolume::new(frame, Vec3::new(0.1, 1.0, 1.0));
        let near_edge = AABB::from_center_half_extents(Vec3::new(0.0, 0.0, 1.8), Vec3::splat(0.1));
        let above = AABB::from_center_half_extents(Vec3::new(0.0, 0.0, 2.3), Vec3::splat(0.1));

        assert!(volume.overlaps_box(&near_edge));
        assert!(!volume.overlaps_box(&above));
    }
}
