use std::f32::consts::PI;

use glam::Vec2;

use crate::options::{Distance, RunOptions, WorldSize};

/// Vector pointing from `from` to `to` under the configured distance metric.
#[inline]
pub fn displacement(from: Vec2, to: Vec2, run_options: &RunOptions) -> Vec2 {
    match run_options.distance {
        Distance::EucEnclosed => to - from,
        Distance::EucToroidal => tor_vec(from, to, &run_options.world),
    }
}

pub fn tor_vec(v1: Vec2, v2: Vec2, world: &WorldSize) -> Vec2 {
    Vec2::from(tor_vec_p(v1.x, v2.x, v1.y, v2.y, world))
}

/// Produces a vector along the shortest path from p1(x1,y1) to p2(x2,y2) in a toroidal space.
/// Originally inspired by toroidal distance as per [source](https://blog.demofox.org/2017/10/01/calculating-the-distance-between-points-in-wrap-around-toroidal-space/),
/// with a modification to preserve directionality (sign)
#[inline]
pub fn tor_vec_p(x1: f32, x2: f32, y1: f32, y2: f32, world: &WorldSize) -> (f32, f32) {
    let dx_p2 = tor_vec_pc(x1, x2, world.width);
    let dy_p2 = tor_vec_pc(y1, y2, world.height);

    (dx_p2, dy_p2)
}

/// pc - point's component
#[inline]
pub fn tor_vec_pc(x1: f32, x2: f32, size: f32) -> f32 {
    // component pointing towards x2
    let d_p2 = x2 - x1;
    // if we are crossing more than half the space, the other way it shall be
    if d_p2.abs() > size / 2. {
        d_p2 + if d_p2 < 0. { size } else { -size }
    } else {
        d_p2
    }
}

/// Folds a coordinate back into `[0, size)`.
///
/// In-range values come back bit for bit, a value sitting exactly on `size` maps to 0.
#[inline]
pub fn wrap_coordinate(x: f32, size: f32) -> f32 {
    if (0. ..size).contains(&x) {
        return x;
    }
    let wrapped = x.rem_euclid(size);
    // rem_euclid of a tiny negative value may round up to size itself
    if wrapped >= size {
        wrapped - size
    } else {
        wrapped
    }
}

/// Angle in radians between a heading and a direction, `None` when either has no length.
#[inline]
pub fn angle_between(heading: Vec2, towards: Vec2) -> Option<f32> {
    let norms = heading.length() * towards.length();
    if norms == 0. {
        return None;
    }
    // rounding may push the cosine a hair past ±1 where acos is NaN
    Some((heading.dot(towards) / norms).clamp(-1., 1.).acos())
}

pub fn deg_to_rad(deg: f32) -> f32 {
    deg * PI / 180.
}
