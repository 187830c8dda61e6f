use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Scale components smaller than this are treated as zero when inverting.
pub const SCALE_EPSILON: f32 = 1.0e-8;

/// World-space rigid transform with independent non-uniform scale.
///
/// Axis convention: +X is forward, +Y is right, +Z is up.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Frame {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Frame {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self::new(translation, rotation, Vec3::ONE)
    }

    /// Same frame with the X and Y scale axes negated.
    pub fn mirrored_xy(&self) -> Self {
        Self {
            scale: self.scale * Vec3::new(-1.0, -1.0, 1.0),
            ..*self
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.translation
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        (self.rotation.inverse() * (point - self.translation)) * safe_reciprocal(self.scale)
    }

    pub fn transform_vector_no_scale(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    pub fn inverse_transform_vector_no_scale(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse() * vector
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Position and orientation of a camera or actor, without scale.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::X
    }
}

/// Builds a rotation from yaw (about +Z), pitch (about +Y) and roll (about +X), in degrees.
pub fn rotation_from_degrees(yaw: f32, pitch: f32, roll: f32) -> Quat {
    Quat::from_euler(
        EulerRot::ZYX,
        yaw.to_radians(),
        pitch.to_radians(),
        roll.to_radians(),
    )
}

fn safe_reciprocal(scale: Vec3) -> Vec3 {
    let recip = |v: f32| if v.abs() <= SCALE_EPSILON { 0.0 } else { 1.0 / v };
    Vec3::new(recip(scale.x), recip(scale.y), recip(scale.z))
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::{rotation_from_degrees, Frame};

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1.0e-4
    }

    #[test]
    fn inverse_transform_point_undoes_transform_point() {
        let frame = Frame::new(
            Vec3::new(3.0, -2.0, 7.5),
            rotation_from_degrees(37.0, -12.0, 5.0),
            Vec3::new(2.0, 0.5, 3.0),
        );
        let point = Vec3::new(-4.0, 1.25, 9.0);

        let local = frame.inverse_transform_point(point);
        assert!(approx_eq(frame.transform_point(local), point));
    }

    #[test]
    fn mirrored_frame_only_flips_x_and_y_scale() {
        let frame = Frame::new(Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(frame.mirrored_xy().scale, Vec3::new(-1.0, -2.0, 3.0));
        assert_eq!(frame.mirrored_xy().translation, frame.translation);
    }

    #[test]
    fn zero_scale_axis_collapses_instead_of_producing_nan() {
        let frame = Frame::new(Vec3::ZERO, Quat::IDENTITY, Vec3::new(1.0, 0.0, 1.0));
        let local = frame.inverse_transform_point(Vec3::new(1.0, 5.0, 2.0));
        assert_eq!(local, Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn yaw_turns_forward_towards_right() {
        let frame = Frame::from_translation_rotation(Vec3::ZERO, rotation_from_degrees(90.0, 0.0, 0.0));
        assert!(approx_eq(frame.forward(), Vec3::Y));
        assert!(approx_eq(frame.up(), Vec3::Z));
    }
}
