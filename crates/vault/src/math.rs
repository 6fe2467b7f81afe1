//! Pose helpers shared by capture and reconstruction.
//!
//! Conventions follow Bevy: forward is `-Z`, up is `+Y`, right is `+X`.

use bevy::math::{Mat3, Quat, Vec3};
use bevy::prelude::Transform;
use tracing::warn;

/// World-space forward vector of a rotation
pub fn forward(rotation: Quat) -> Vec3 {
    rotation * Vec3::NEG_Z
}

/// World-space up vector of a rotation
pub fn up(rotation: Quat) -> Vec3 {
    rotation * Vec3::Y
}

/// Rotation whose forward axis points along `forward` with `up` as the up hint.
///
/// Degenerate inputs (zero forward, or up parallel to forward) fall back to
/// an arbitrary orthonormal basis instead of producing NaNs.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Quat {
    let back = -forward.try_normalize().unwrap_or(Vec3::NEG_Z);
    let right = up
        .cross(back)
        .try_normalize()
        .unwrap_or_else(|| back.any_orthonormal_vector());
    let up = back.cross(right);
    Quat::from_mat3(&Mat3::from_cols(right, up, back)).normalize()
}

/// Scale usable as a divisor: zero components are treated as 1
fn divisor_scale(scale: Vec3) -> Vec3 {
    let degenerate = scale.abs().cmplt(Vec3::splat(f32::EPSILON));
    if degenerate.any() {
        warn!(scale = ?scale, "Zero scale component in frame, treating it as 1");
    }
    Vec3::select(degenerate, Vec3::ONE, scale)
}

/// Express a world-space point in the local frame of `frame`.
///
/// A frame with a zero scale component is inverted as if that component were 1.
pub fn inverse_transform_point(frame: &Transform, point: Vec3) -> Vec3 {
    (frame.rotation.inverse() * (point - frame.translation)) / divisor_scale(frame.scale)
}

/// Local transform of `child` relative to `parent`, both given in world space
pub fn relative_to(parent: &Transform, child: &Transform) -> Transform {
    Transform {
        translation: inverse_transform_point(parent, child.translation),
        rotation: (parent.rotation.inverse() * child.rotation).normalize(),
        scale: child.scale / divisor_scale(parent.scale),
    }
}
