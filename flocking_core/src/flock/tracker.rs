use glam::Vec2;

use crate::{
    math_helpers::{angle_between, displacement},
    options::{RuleParams, RunOptions},
};

// a tracker holds spatial information about the boids of the current tick and answers
// neighbourhood queries against it, it never owns or mutates the boids themselves

pub trait Tracker: Send + Sync {
    /// Re-indexes the tracker against this tick's positions, called once before any query.
    fn rebuild(&mut self, positions: &[Vec2], run_options: &RunOptions);

    /// Collects, in ascending order, the indices of all boids perceived by `subject` under `rule`.
    fn get_neighbours(
        &self,
        subject: usize,
        positions: &[Vec2],
        velocities: &[Vec2],
        rule: &RuleParams,
        run_options: &RunOptions,
        neighbours: &mut Vec<usize>,
    );
}

/// Whether a boid at `position` heading along `velocity` perceives a boid at `other`.
///
/// The other boid has to be strictly closer than the rule's distance threshold and
/// strictly within its angle threshold of the heading. Without a heading, or when
/// both boids share a position, there is no angle to measure and the test passes.
#[inline]
pub fn perceives(
    position: Vec2,
    velocity: Vec2,
    other: Vec2,
    rule: &RuleParams,
    run_options: &RunOptions,
) -> bool {
    let to_other = displacement(position, other, run_options);

    if !(to_other.length() < rule.distance_threshold) {
        return false;
    }

    match angle_between(velocity, to_other) {
        Some(angle) => angle < rule.angle_threshold,
        None => true,
    }
}
