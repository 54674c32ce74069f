use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::error::FlockError;

/// Strength and perception limits of a single steering rule.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
pub struct RuleParams {
    /// multiplier applied to the raw steering vector
    pub force_strength: f32,
    /// neighbours must be strictly closer than this
    pub distance_threshold: f32,
    /// neighbours must be strictly within this angle of the heading, radians [0, π]
    pub angle_threshold: f32,
}

impl RuleParams {
    pub fn new(force_strength: f32, distance_threshold: f32, angle_threshold: f32) -> Self {
        RuleParams {
            force_strength,
            distance_threshold,
            angle_threshold,
        }
    }

    fn validate(&self, rule: &str) -> Result<(), FlockError> {
        if !self.force_strength.is_finite() {
            return Err(FlockError::InvalidConfig(format!(
                "{rule} force strength must be finite, got {}",
                self.force_strength
            )));
        }
        if !(self.distance_threshold >= 0.) || !self.distance_threshold.is_finite() {
            return Err(FlockError::InvalidConfig(format!(
                "{rule} distance threshold must be a non-negative number, got {}",
                self.distance_threshold
            )));
        }
        // an angle above π admits everything, which is legal, but NaN is not
        if !(self.angle_threshold >= 0.) {
            return Err(FlockError::InvalidConfig(format!(
                "{rule} angle threshold must be non-negative, got {}",
                self.angle_threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub init_boids: usize,
    /// seed for the initial placement, `None` draws one from entropy
    pub seed: Option<u64>,

    /// dt, scales both the velocity and the position update
    pub time_step: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub speed_floor: SpeedFloor,

    pub cohesion: RuleParams,
    pub separation: RuleParams,
    pub alignment: RuleParams,

    pub world: WorldSize,
    pub boundary: Boundary,
    pub distance: Distance,
    pub tracker_type: TrackerType,

    /// computes the per-boid forces on the rayon pool
    pub parallel: bool,
    /// ticks per birdwatcher sample, e.g. 4 = sample every 4th tick
    pub sample_rate: u64,
}

impl RunOptions {
    /// Largest distance any rule looks at, sizes the spatial hash cells.
    pub fn max_sensory_distance(&self) -> f32 {
        self.alignment.distance_threshold.max(
            self.cohesion
                .distance_threshold
                .max(self.separation.distance_threshold),
        )
    }

    /// Checks every invariant `Flock` relies on, so that updating never has to fail.
    pub fn validate(&self) -> Result<(), FlockError> {
        if !(self.min_speed >= 0.) {
            return Err(FlockError::InvalidConfig(format!(
                "min_speed must be non-negative, got {}",
                self.min_speed
            )));
        }
        if !(self.min_speed <= self.max_speed) || !self.max_speed.is_finite() {
            return Err(FlockError::InvalidConfig(format!(
                "min_speed {} must not exceed max_speed {}",
                self.min_speed, self.max_speed
            )));
        }
        if !(self.time_step > 0.) || !self.time_step.is_finite() {
            return Err(FlockError::InvalidConfig(format!(
                "time_step must be positive, got {}",
                self.time_step
            )));
        }
        if !(self.world.width > 0.)
            || !(self.world.height > 0.)
            || !self.world.width.is_finite()
            || !self.world.height.is_finite()
        {
            return Err(FlockError::InvalidConfig(format!(
                "world must have a positive size, got {}x{}",
                self.world.width, self.world.height
            )));
        }
        let max_step = self.max_speed * self.time_step;
        if !max_step.is_finite() || max_step >= self.world.width.min(self.world.height) {
            return Err(FlockError::InvalidConfig(format!(
                "a tick may move a boid {max_step} units, which must stay below the {}x{} world",
                self.world.width, self.world.height
            )));
        }
        if self.sample_rate == 0 {
            return Err(FlockError::InvalidConfig(
                "sample_rate must be at least 1".to_owned(),
            ));
        }
        if let Boundary::Repulsive { force } = self.boundary {
            if !force.is_finite() {
                return Err(FlockError::InvalidConfig(format!(
                    "boundary force must be finite, got {force}"
                )));
            }
        }

        self.cohesion.validate("cohesion")?;
        self.separation.validate("separation")?;
        self.alignment.validate("alignment")
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        let init_boids = 256;

        let min_speed = 0.3;
        let max_speed = 1.8;

        // cohesion: wide distance, wide angle
        let cohesion = RuleParams::new(0.003, 48., PI / 2.);
        // separation: short distance, wide angle
        let separation = RuleParams::new(1.5, 8., PI / 2.);
        // alignment: medium distance, narrow angle
        let alignment = RuleParams::new(0.05, 30., PI / 3.);

        RunOptions {
            init_boids,
            seed: None,
            time_step: 1.0,
            min_speed,
            max_speed,
            speed_floor: SpeedFloor::Always,
            cohesion,
            separation,
            alignment,
            world: WorldSize::new(500., 500.),
            boundary: Boundary::Toroidal,
            // boundary: Boundary::Repulsive { force: 0.06 },
            // boundary: Boundary::Reflective,
            distance: Distance::EucEnclosed,
            tracker_type: TrackerType::Naive,
            parallel: false,
            sample_rate: 1,
        }
    }
}

/// The simulated plane spans `[0, width) x [0, height)`.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct WorldSize {
    pub width: f32,
    pub height: f32,
}

impl WorldSize {
    pub fn new(width: f32, height: f32) -> Self {
        WorldSize { width, height }
    }
}

#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
// {"type": "Repulsive", "force": 0.05}
pub enum Boundary {
    /// wraps around to the opposite edge, velocity untouched
    Toroidal,
    /// clamps just inside the wall and turns the velocity back inwards
    Reflective,
    /// inverse-distance push away from all four walls, with the reflective clamp as backstop
    Repulsive { force: f32 },
}

#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
// {"type": "EucToroidal"}
pub enum Distance {
    EucToroidal,
    EucEnclosed,
}

/// What the integrator does with a boid slower than `min_speed`.
#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SpeedFloor {
    /// always lift to `min_speed`, a standing boid keeps its previous heading
    Always,
    /// lift to `min_speed` only when there is a heading to scale
    NonZero,
}

#[derive(Debug, PartialEq, Copy, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerType {
    Naive,
    SpatHash,
}
