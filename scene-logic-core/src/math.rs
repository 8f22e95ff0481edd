// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! Scalar and quaternion interpolation helpers shared by the animation
//! channel evaluator.
//!
//! The cubic Hermite basis here is the glTF 2.0 Appendix C form, with
//! tangents scaled only by the time delta between keyframes - no extra
//! `(p1 - p0).abs()` scale factor. That matches how every glTF-driven
//! animation runtime (and the channel evaluator this crate's `AnimationNode`
//! is modeled on) actually treats authored tangents: the tangent values are
//! already in output units, not normalized to the segment's value range.

use nalgebra::{Quaternion, UnitQuaternion};

/// Linear interpolation between `a` and `b`. `t` is not clamped by this
/// function - callers that need clamped progress should clamp before calling.
pub fn lerpf(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// glTF 2.0 Appendix C cubic Hermite spline basis.
///
/// `p0`/`p1` are the keyframe values at the lower/upper bound of the segment,
/// `m0`/`m1` are the already time-scaled tangents (`dt * tangent_out_lower`
/// and `dt * tangent_in_upper`), and `t` is the interpolation ratio in
/// `[0, 1]`.
pub fn cubic_hermite(p0: f32, p1: f32, m0: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    (2.0 * t3 - 3.0 * t2 + 1.0) * p0
        + (t3 - 2.0 * t2 + t) * m0
        + (-2.0 * t3 + 3.0 * t2) * p1
        + (t3 - t2) * m1
}

/// Componentwise cubic Hermite interpolation over a quaternion treated as a
/// raw 4-vector, followed by re-normalization - mirrors how the channel
/// evaluator treats `Cubic_Quaternions` interpolation before unit-length
/// correction.
#[allow(clippy::too_many_arguments)]
pub fn cubic_hermite_quaternion(
    p0: UnitQuaternion<f32>,
    p1: UnitQuaternion<f32>,
    m0: Quaternion<f32>,
    m1: Quaternion<f32>,
    t: f32,
) -> UnitQuaternion<f32> {
    let p0 = p0.into_inner();
    let p1 = p1.into_inner();
    let x = cubic_hermite(p0.i, p1.i, m0.i, m1.i, t);
    let y = cubic_hermite(p0.j, p1.j, m0.j, m1.j, t);
    let z = cubic_hermite(p0.k, p1.k, m0.k, m1.k, t);
    let w = cubic_hermite(p0.w, p1.w, m0.w, m1.w, t);
    UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
}

/// Normalized linear interpolation between two unit quaternions, taking the
/// shorter path (negating `b` first if the dot product is negative).
pub fn nlerp(a: UnitQuaternion<f32>, b: UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    let b = if a.coords.dot(&b.coords) < 0.0 {
        UnitQuaternion::new_normalize(Quaternion::new(-b.w, -b.i, -b.j, -b.k))
    } else {
        b
    };
    let x = lerpf(a.i, b.i, t);
    let y = lerpf(a.j, b.j, t);
    let z = lerpf(a.k, b.k, t);
    let w = lerpf(a.w, b.w, t);
    UnitQuaternion::new_normalize(Quaternion::new(w, x, y, z))
}

/// Clamps `value` to `[0, 1]`. Interpolation ratios are mathematically
/// guaranteed to already be in range by construction, but floating point
/// division near a segment boundary can tip a ratio just outside it.
pub fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lerp_endpoints() {
        assert_eq!(lerpf(10.0, 20.0, 0.0), 10.0);
        assert_eq!(lerpf(10.0, 20.0, 1.0), 20.0);
        assert_eq!(lerpf(10.0, 20.0, 0.5), 15.0);
    }

    #[test]
    fn cubic_hermite_endpoints_ignore_tangents() {
        assert_eq!(cubic_hermite(1.0, 2.0, 5.0, -5.0, 0.0), 1.0);
        assert_eq!(cubic_hermite(1.0, 2.0, 5.0, -5.0, 1.0), 2.0);
    }

    #[test]
    fn nlerp_is_unit_length() {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_euler_angles(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        let mid = nlerp(a, b, 0.5);
        assert!((mid.norm() - 1.0).abs() < 1e-6);
    }
}
