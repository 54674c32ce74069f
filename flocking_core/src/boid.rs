use glam::f32::Vec2;
use tracing::warn;

use crate::{
    math_helpers::{displacement, wrap_coordinate},
    options::{Boundary, Distance, RunOptions, SpeedFloor, WorldSize},
};

/// Wall distances below this are treated as this, keeps the repulsion finite.
const WALL_EPSILON: f32 = 1e-3;
/// How far inside a wall a reflected boid is placed, as a fraction of the world's extent.
const WALL_INSET: f32 = 1e-4;

/// Per-rule contributions to one boid's acceleration for a single tick.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FlockForces {
    pub cohesion: Vec2,
    pub separation: Vec2,
    pub alignment: Vec2,
    pub boundary: Vec2,
}

impl FlockForces {
    pub fn total(&self) -> Vec2 {
        self.cohesion + self.separation + self.alignment + self.boundary
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NeighbourCounts {
    pub cohesion: usize,
    pub separation: usize,
    pub alignment: usize,
}

/// Diagnostics recorded for a boid during the last tick. Never read back by the rules.
#[derive(Debug, Clone, PartialEq)]
pub struct BoidMetadata {
    pub id: usize,
    /// distinct boids seen by any of the three rules
    pub n_neighbours: usize,
    pub neighbour_counts: NeighbourCounts,
    pub accelleration_update: FlockForces,
}

impl BoidMetadata {
    pub fn new(boid: &Boid) -> Self {
        let mut default: BoidMetadata = Default::default();
        default.id = boid.id;
        default
    }
}

impl Default for BoidMetadata {
    fn default() -> Self {
        Self {
            id: std::usize::MAX,
            n_neighbours: 0,
            neighbour_counts: Default::default(),
            accelleration_update: Default::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boid {
    // sequential id starting from 0, equal to the index in the flock
    pub id: usize,
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Boid {
    /// Creates a new [`Boid`].
    pub fn new(x: f32, y: f32, velocity: Vec2, id: usize) -> Self {
        let position = Vec2::new(x, y);

        Boid {
            id,
            position,
            velocity,
        }
    }

    /// Evaluates every rule against the neighbourhoods found for this tick.
    pub fn run_rules(
        &self,
        cohesion: &[Boid],
        separation: &[Boid],
        alignment: &[Boid],
        run_options: &RunOptions,
    ) -> FlockForces {
        let boundary = match run_options.boundary {
            Boundary::Repulsive { force } => self.wall_avoidance(force, &run_options.world),
            Boundary::Toroidal | Boundary::Reflective => Vec2::ZERO,
        };

        FlockForces {
            cohesion: self.cohesion(cohesion, run_options),
            separation: self.separation(separation, run_options),
            alignment: self.alignment(alignment, run_options),
            boundary,
        }
    }

    /// Steers towards the centroid of the neighbours.
    pub fn cohesion(&self, others: &[Boid], run_options: &RunOptions) -> Vec2 {
        if others.is_empty() {
            return Vec2::ZERO;
        }
        let count = others.len() as f32;

        let offset = match run_options.distance {
            Distance::EucEnclosed => {
                let center = others.iter().fold(Vec2::ZERO, |acc, o| acc + o.position) / count;
                center - self.position
            }
            // the centroid only makes sense relative to self on a torus
            Distance::EucToroidal => {
                others.iter().fold(Vec2::ZERO, |acc, o| {
                    acc + displacement(self.position, o.position, run_options)
                }) / count
            }
        };

        offset * run_options.cohesion.force_strength
    }

    /// Pushes away from each neighbour with a weight of 1/distance.
    pub fn separation(&self, others: &[Boid], run_options: &RunOptions) -> Vec2 {
        let mut res = Vec2::ZERO;

        for other in others {
            let away = displacement(other.position, self.position, run_options);
            let distance_sq = away.length_squared();
            // coincident boids have no direction to push in
            if distance_sq > 0. {
                res += away / distance_sq;
            }
        }

        res * run_options.separation.force_strength
    }

    /// Steers towards the average velocity of the neighbours.
    pub fn alignment(&self, others: &[Boid], run_options: &RunOptions) -> Vec2 {
        if others.is_empty() {
            return Vec2::ZERO;
        }

        let avg = others.iter().fold(Vec2::ZERO, |acc, o| acc + o.velocity) / others.len() as f32;

        (avg - self.velocity) * run_options.alignment.force_strength
    }

    /// Inverse-distance push away from each of the four walls.
    pub fn wall_avoidance(&self, force: f32, world: &WorldSize) -> Vec2 {
        let left = self.position.x.max(WALL_EPSILON);
        let right = (world.width - self.position.x).max(WALL_EPSILON);
        let bottom = self.position.y.max(WALL_EPSILON);
        let top = (world.height - self.position.y).max(WALL_EPSILON);

        Vec2::new(1. / left - 1. / right, 1. / bottom - 1. / top) * force
    }

    // Actually shifts the individual's location
    pub fn update_location(&mut self, acceleration: Vec2, run_options: &RunOptions) {
        let heading = self.velocity;

        self.velocity += acceleration * run_options.time_step;
        self.velocity = self.clamp_speed(heading, run_options);

        self.position += self.velocity * run_options.time_step;

        self.boundaries(run_options);

        assert!(
            self.position.is_finite() && self.velocity.is_finite(),
            "boid {} reached a non-finite state: position {:?}, velocity {:?}",
            self.id,
            self.position,
            self.velocity
        );
    }

    /// Rescales the velocity into `[min_speed, max_speed]` without changing its direction.
    fn clamp_speed(&self, heading: Vec2, run_options: &RunOptions) -> Vec2 {
        let velocity = if self.velocity.is_finite() {
            self.velocity
        } else {
            // an overflowed force saturates at max_speed along the infinite components
            let direction = Vec2::new(overflow_sign(self.velocity.x), overflow_sign(self.velocity.y));
            if direction != Vec2::ZERO {
                return direction.normalize() * run_options.max_speed;
            }
            Vec2::ZERO
        };

        // divide by the largest component first so huge accelerations cannot overflow the length
        let scale = velocity.x.abs().max(velocity.y.abs());

        if scale == 0. {
            return match run_options.speed_floor {
                SpeedFloor::NonZero => Vec2::ZERO,
                SpeedFloor::Always => {
                    // In the rare case two boids meet head on with equal but opposite
                    // velocities and accelerations, they are brought to a standstill.
                    // Resolve it deterministically by keeping the direction it had.
                    warn!(id = self.id, "boid came to a standstill, restoring heading");
                    let direction = if heading.length_squared() > 0. {
                        heading.normalize()
                    } else {
                        Vec2::new(1., 0.)
                    };
                    direction * run_options.min_speed
                }
            };
        }

        let scaled = velocity / scale;
        let speed = scaled.length() * scale;

        if speed > run_options.max_speed {
            scaled.normalize() * run_options.max_speed
        } else if speed < run_options.min_speed {
            scaled.normalize() * run_options.min_speed
        } else {
            velocity
        }
    }

    fn boundaries(&mut self, run_options: &RunOptions) {
        let world = &run_options.world;

        match run_options.boundary {
            Boundary::Toroidal => {
                self.position.x = wrap_coordinate(self.position.x, world.width);
                self.position.y = wrap_coordinate(self.position.y, world.height);
            }
            Boundary::Reflective | Boundary::Repulsive { .. } => {
                (self.position.x, self.velocity.x) =
                    reflect(self.position.x, self.velocity.x, world.width);
                (self.position.y, self.velocity.y) =
                    reflect(self.position.y, self.velocity.y, world.height);
            }
        };
    }
}

/// Sign of an infinite component, 0 for finite or NaN ones.
fn overflow_sign(x: f32) -> f32 {
    if x.is_infinite() {
        x.signum()
    } else {
        0.
    }
}

/// Puts an escaped coordinate back just inside `[0, size)` and turns its velocity inwards.
fn reflect(x: f32, v: f32, size: f32) -> (f32, f32) {
    let inset = size * WALL_INSET;

    if x < 0. {
        (inset, v.abs())
    } else if x >= size {
        (size - inset, -v.abs())
    } else {
        (x, v)
    }
}
