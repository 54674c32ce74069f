use glam::Vec2;

use crate::options::{RuleParams, RunOptions};

use super::tracker::{perceives, Tracker};

/// A naive implementation of boids tracking, which uses an O(N^2) algorithm for
/// finding boid's neighbours.
#[derive(Debug, Default)]
pub struct NaiveTracker;

impl NaiveTracker {
    pub fn new() -> Self {
        NaiveTracker
    }

    pub fn get_neighbours_naive(
        subject: usize,
        positions: &[Vec2],
        velocities: &[Vec2],
        rule: &RuleParams,
        run_options: &RunOptions,
        neighbours: &mut Vec<usize>,
    ) {
        let position = positions[subject];
        let velocity = velocities[subject];

        for (i_other, other) in positions.iter().enumerate() {
            if i_other == subject {
                continue;
            }

            if perceives(position, velocity, *other, rule, run_options) {
                neighbours.push(i_other);
            }
        }
    }
}

impl Tracker for NaiveTracker {
    fn rebuild(&mut self, _: &[Vec2], _: &RunOptions) {
        // noop, every query scans the whole snapshot
    }

    fn get_neighbours(
        &self,
        subject: usize,
        positions: &[Vec2],
        velocities: &[Vec2],
        rule: &RuleParams,
        run_options: &RunOptions,
        neighbours: &mut Vec<usize>,
    ) {
        neighbours.clear();
        NaiveTracker::get_neighbours_naive(
            subject,
            positions,
            velocities,
            rule,
            run_options,
            neighbours,
        );
    }
}
