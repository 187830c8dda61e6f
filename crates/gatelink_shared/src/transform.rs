//! Mapping of points, rotations and directions from one portal frame to its linked frame.
//!
//! Every mapping goes through the source frame's local space with X and Y negated, which is
//! what makes entering one portal head-on come out of the other one head-on instead of
//! reflected as in a mirror. Up (Z) is preserved.

use glam::{Mat3, Quat, Vec3};

use crate::frame::Frame;

const MIRROR_XY: Vec3 = Vec3::new(-1.0, -1.0, 1.0);

pub fn transform_point(point: Vec3, from: &Frame, to: &Frame) -> Vec3 {
    let local = from.mirrored_xy().inverse_transform_point(point);
    to.transform_point(local)
}

pub fn transform_direction(vector: Vec3, from: &Frame, to: &Frame) -> Vec3 {
    let local = from.inverse_transform_vector_no_scale(vector) * MIRROR_XY;
    to.transform_vector_no_scale(local)
}

pub fn transform_rotation(rotation: Quat, from: &Frame, to: &Frame) -> Quat {
    let forward = transform_direction(rotation * Vec3::X, from, to);
    let right = transform_direction(rotation * Vec3::Y, from, to);
    let up = transform_direction(rotation * Vec3::Z, from, to);

    rotation_from_axes(forward, right, up)
}

/// Remaps a velocity into the destination frame while keeping its speed.
pub fn remap_velocity(velocity: Vec3, from: &Frame, to: &Frame) -> Vec3 {
    let speed = velocity.length();
    let direction = velocity.normalize_or_zero();
    if direction == Vec3::ZERO {
        return Vec3::ZERO;
    }

    transform_direction(direction, from, to).normalize_or_zero() * speed
}

/// Rebuilds a unit rotation from forward/right/up axes that drifted off orthonormal.
pub fn rotation_from_axes(forward: Vec3, right: Vec3, up: Vec3) -> Quat {
    let forward = forward.normalize_or_zero();
    let right = right.normalize_or_zero();
    let up = up.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    // Gram-Schmidt keeping forward exact; fall back to up when right collapsed onto forward.
    let mut right = (right - forward * forward.dot(right)).normalize_or_zero();
    if right == Vec3::ZERO {
        right = up.cross(forward).normalize_or_zero();
    }
    if right == Vec3::ZERO {
        right = forward.any_orthonormal_vector();
    }
    let up = forward.cross(right);

    Quat::from_mat3(&Mat3::from_cols(forward, right, up)).normalize()
}
