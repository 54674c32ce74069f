use std::f32::consts::PI;

use glam::Vec2;
use itertools::Itertools;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::boid::{Boid, BoidMetadata, NeighbourCounts};
use crate::error::FlockError;
use crate::math_helpers::wrap_coordinate;
use crate::options::{RunOptions, TrackerType};

use self::naive_tracker::NaiveTracker;
use self::spathash_tracker::SpatHashTracker;
use self::tracker::Tracker;

pub mod naive_tracker;
pub mod spathash_tracker;
pub mod tracker;

/// All boids of a simulation, stored as parallel arrays indexed by boid id.
///
/// A tick reads only the state from before the tick: every boid's forces are
/// computed against the same snapshot, and the new state is committed once all
/// of them are known.
pub struct Flock {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    metadata: Vec<BoidMetadata>,
    tracker: Box<dyn Tracker>,
    tracker_type: TrackerType,
    tick: u64,
}

/// Per-worker buffers reused across boids within a tick.
#[derive(Default)]
struct Scratch {
    indices: Vec<usize>,
    cohesion: Vec<Boid>,
    separation: Vec<Boid>,
    alignment: Vec<Boid>,
}

impl Flock {
    /// Spawns `n` boids uniformly over the world, each with a random heading and a
    /// speed drawn from `[min_speed, max_speed]`.
    pub fn initialize(n: usize, run_options: &RunOptions) -> Result<Self, FlockError> {
        run_options.validate()?;
        if n == 0 {
            return Err(FlockError::InvalidConfig(
                "a flock needs at least one boid".to_owned(),
            ));
        }

        let mut rng = match run_options.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        let boids = (0..n).map(|id| get_boid(run_options, id, &mut rng)).collect();

        info!(
            boids = n,
            width = run_options.world.width,
            height = run_options.world.height,
            seed = ?run_options.seed,
            "flock initialized"
        );

        Flock::from_boids(boids, run_options)
    }

    /// Builds a flock from explicit boids, ids are reassigned to their index.
    pub fn from_boids(boids: Vec<Boid>, run_options: &RunOptions) -> Result<Self, FlockError> {
        run_options.validate()?;
        if boids.is_empty() {
            return Err(FlockError::InvalidConfig(
                "a flock needs at least one boid".to_owned(),
            ));
        }
        for b in boids.iter() {
            check_state(b.position, b.velocity, run_options)?;
        }

        let metadata = boids
            .iter()
            .enumerate()
            .map(|(id, b)| BoidMetadata::new(&Boid { id, ..*b }))
            .collect();

        Ok(Flock {
            positions: boids.iter().map(|b| b.position).collect(),
            velocities: boids.iter().map(|b| b.velocity).collect(),
            metadata,
            tracker: get_tracker(run_options),
            tracker_type: run_options.tracker_type,
            tick: 0,
        })
    }

    /// Advances every boid by exactly one tick.
    ///
    /// `run_options` must pass [`RunOptions::validate`], as the ones given to
    /// [`Flock::initialize`] or [`Flock::from_boids`] did. Only the tracker may change between ticks.
    pub fn update(&mut self, run_options: &RunOptions) {
        debug_assert!(
            run_options.validate().is_ok(),
            "flock updated with invalid options"
        );
        if self.tracker_type != run_options.tracker_type {
            self.tracker = get_tracker(run_options);
            self.tracker_type = run_options.tracker_type;
        }
        self.tracker.rebuild(&self.positions, run_options);

        // calculation phase, read only over the snapshot
        let updates: Vec<BoidMetadata> = {
            let positions = &self.positions;
            let velocities = &self.velocities;
            let tracker = self.tracker.as_ref();
            let steer = |scratch: &mut Scratch, i: usize| {
                Flock::steer(i, positions, velocities, tracker, run_options, scratch)
            };

            if run_options.parallel {
                (0..positions.len())
                    .into_par_iter()
                    .map_init(Scratch::default, steer)
                    .collect()
            } else {
                let mut scratch = Scratch::default();
                (0..positions.len())
                    .map(|i| steer(&mut scratch, i))
                    .collect()
            }
        };

        // commit phase
        for (i, meta) in updates.into_iter().enumerate() {
            let mut boid = self.boid(i);
            boid.update_location(meta.accelleration_update.total(), run_options);

            self.positions[i] = boid.position;
            self.velocities[i] = boid.velocity;
            self.metadata[i] = meta;
        }

        self.tick += 1;
        debug!(tick = self.tick, boids = self.len(), "flock updated");
    }

    /// Finds the three neighbourhoods of boid `i` and evaluates the rules on them.
    fn steer(
        i: usize,
        positions: &[Vec2],
        velocities: &[Vec2],
        tracker: &dyn Tracker,
        run_options: &RunOptions,
        scratch: &mut Scratch,
    ) -> BoidMetadata {
        let Scratch {
            indices,
            cohesion,
            separation,
            alignment,
        } = scratch;

        let rules = [
            (&run_options.cohesion, &mut *cohesion),
            (&run_options.separation, &mut *separation),
            (&run_options.alignment, &mut *alignment),
        ];
        for (rule, gathered) in rules {
            tracker.get_neighbours(i, positions, velocities, rule, run_options, indices);
            gathered.clear();
            gathered.extend(
                indices
                    .iter()
                    .map(|j| Boid::new(positions[*j].x, positions[*j].y, velocities[*j], *j)),
            );
        }

        let boid = Boid::new(positions[i].x, positions[i].y, velocities[i], i);
        let forces = boid.run_rules(
            cohesion.as_slice(),
            separation.as_slice(),
            alignment.as_slice(),
            run_options,
        );

        // every neighbourhood is sorted by id, so a merge lines up duplicates
        let n_neighbours = cohesion
            .iter()
            .map(|b| b.id)
            .merge(separation.iter().map(|b| b.id))
            .merge(alignment.iter().map(|b| b.id))
            .dedup()
            .count();

        BoidMetadata {
            id: i,
            n_neighbours,
            neighbour_counts: NeighbourCounts {
                cohesion: cohesion.len(),
                separation: separation.len(),
                alignment: alignment.len(),
            },
            accelleration_update: forces,
        }
    }

    /// Overwrites a boid's state, e.g. to stage a scenario.
    pub fn set_boid(
        &mut self,
        id: usize,
        position: Vec2,
        velocity: Vec2,
        run_options: &RunOptions,
    ) -> Result<(), FlockError> {
        if id >= self.len() {
            return Err(FlockError::OutOfRange {
                index: id,
                len: self.len(),
            });
        }
        check_state(position, velocity, run_options)?;

        self.positions[id] = position;
        self.velocities[id] = velocity;
        Ok(())
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn velocities(&self) -> &[Vec2] {
        &self.velocities
    }

    pub fn boid(&self, id: usize) -> Boid {
        Boid::new(self.positions[id].x, self.positions[id].y, self.velocities[id], id)
    }

    pub fn boids(&self) -> impl Iterator<Item = Boid> + '_ {
        (0..self.len()).map(|id| self.boid(id))
    }

    /// Distinct boids perceived by any rule during the last tick, for display only.
    pub fn neighbour_count(&self, id: usize) -> usize {
        self.metadata[id].n_neighbours
    }

    pub fn metadata(&self, id: usize) -> &BoidMetadata {
        &self.metadata[id]
    }

    pub fn view(&self) -> impl Iterator<Item = (Boid, &BoidMetadata)> + '_ {
        self.boids().zip(self.metadata.iter())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }
}

fn get_tracker(run_options: &RunOptions) -> Box<dyn Tracker> {
    match run_options.tracker_type {
        TrackerType::Naive => Box::new(NaiveTracker::new()),
        TrackerType::SpatHash => Box::new(SpatHashTracker::new(run_options)),
    }
}

fn check_state(position: Vec2, velocity: Vec2, run_options: &RunOptions) -> Result<(), FlockError> {
    let world = &run_options.world;
    if !position.is_finite() || !velocity.is_finite() {
        return Err(FlockError::InvalidConfig(format!(
            "boid state must be finite, got position {position:?} velocity {velocity:?}"
        )));
    }
    if !(0. ..world.width).contains(&position.x) || !(0. ..world.height).contains(&position.y) {
        return Err(FlockError::InvalidConfig(format!(
            "position {position:?} lies outside the {}x{} world",
            world.width, world.height
        )));
    }
    Ok(())
}

fn get_boid(run_options: &RunOptions, id: usize, rng: &mut Xoshiro256PlusPlus) -> Boid {
    let world = &run_options.world;

    // x in [0, width), y in [0, height)
    let x = wrap_coordinate(rng.gen::<f32>() * world.width, world.width);
    let y = wrap_coordinate(rng.gen::<f32>() * world.height, world.height);

    let heading = rng.gen_range(0. ..2. * PI);
    let speed = rng.gen_range(run_options.min_speed..=run_options.max_speed);
    let velocity = Vec2::new(heading.cos(), heading.sin()) * speed;

    Boid::new(x, y, velocity, id)
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use approx::assert_relative_eq;
    use glam::Vec2;

    use super::Flock;
    use crate::{
        boid::Boid,
        error::FlockError,
        options::{Boundary, RuleParams, RunOptions, TrackerType, WorldSize},
    };

    fn options() -> RunOptions {
        RunOptions {
            world: WorldSize::new(100., 100.),
            seed: Some(42),
            ..Default::default()
        }
    }

    #[test]
    fn initialize_respects_world_and_speeds() {
        let ro = options();
        let flock = Flock::initialize(200, &ro).unwrap();

        assert_eq!(flock.len(), 200);
        for (p, v) in flock.positions().iter().zip(flock.velocities()) {
            assert!((0. ..100.).contains(&p.x) && (0. ..100.).contains(&p.y));
            assert!(v.length() >= ro.min_speed - 1e-4 && v.length() <= ro.max_speed + 1e-4);
        }
    }

    #[test]
    fn seeded_initialization_is_reproducible() {
        let ro = options();
        let a = Flock::initialize(16, &ro).unwrap();
        let b = Flock::initialize(16, &ro).unwrap();

        assert_eq!(a.positions(), b.positions());
        assert_eq!(a.velocities(), b.velocities());
    }

    #[test]
    fn initialize_rejects_empty_flock() {
        assert!(matches!(
            Flock::initialize(0, &options()),
            Err(FlockError::InvalidConfig(_))
        ));
    }

    #[test]
    fn initialize_rejects_inverted_speeds() {
        let ro = RunOptions {
            min_speed: 2.,
            max_speed: 1.,
            ..options()
        };
        assert!(matches!(
            Flock::initialize(4, &ro),
            Err(FlockError::InvalidConfig(_))
        ));
    }

    #[test]
    fn set_boid_checks_bounds() {
        let ro = options();
        let mut flock = Flock::initialize(2, &ro).unwrap();

        assert!(matches!(
            flock.set_boid(2, Vec2::ZERO, Vec2::ZERO, &ro),
            Err(FlockError::OutOfRange { index: 2, len: 2 })
        ));
        assert!(flock
            .set_boid(0, Vec2::new(100., 5.), Vec2::ZERO, &ro)
            .is_err());
        assert!(flock
            .set_boid(0, Vec2::new(f32::NAN, 5.), Vec2::ZERO, &ro)
            .is_err());
        assert!(flock
            .set_boid(1, Vec2::new(0., 99.9), Vec2::new(1., 0.), &ro)
            .is_ok());
        assert_eq!(flock.boid(1).position, Vec2::new(0., 99.9));
    }

    #[test]
    fn cohesion_scenario_matches_centroid_formula() {
        let mut ro = options();
        ro.cohesion = RuleParams::new(0.01, 10., PI);
        let mut flock = Flock::initialize(2, &ro).unwrap();
        flock
            .set_boid(0, Vec2::new(50., 50.), Vec2::new(0., 1.), &ro)
            .unwrap();
        flock
            .set_boid(1, Vec2::new(50., 51.), Vec2::new(0., 1.), &ro)
            .unwrap();

        flock.update(&ro);

        // boid 0 sees boid 1 dead ahead, centroid (50, 51)
        let ahead = flock.metadata(0).accelleration_update.cohesion;
        assert_eq!(ahead, (Vec2::new(50., 51.) - Vec2::new(50., 50.)) * 0.01);
        assert_eq!(flock.metadata(0).neighbour_counts.cohesion, 1);

        // boid 1 would have to look back by exactly π, which is not strictly inside the cone
        let behind = flock.metadata(1).accelleration_update.cohesion;
        assert_eq!(behind, Vec2::ZERO);
        assert_eq!(flock.metadata(1).neighbour_counts.cohesion, 0);
    }

    #[test]
    fn lone_boid_only_feels_the_walls() {
        let ro = RunOptions {
            boundary: Boundary::Repulsive { force: 0.5 },
            ..options()
        };
        let boids = vec![
            Boid::new(10., 10., Vec2::new(1., 0.), 0),
            Boid::new(90., 90., Vec2::new(-1., 0.), 1),
        ];
        let mut flock = Flock::from_boids(boids, &ro).unwrap();

        flock.update(&ro);

        let forces = flock.metadata(0).accelleration_update;
        assert_eq!(forces.cohesion, Vec2::ZERO);
        assert_eq!(forces.separation, Vec2::ZERO);
        assert_eq!(forces.alignment, Vec2::ZERO);
        assert!(forces.boundary.x > 0. && forces.boundary.y > 0.);
        assert_eq!(flock.neighbour_count(0), 0);
    }

    #[test]
    fn neighbour_count_is_union_of_rules() {
        let ro = RunOptions {
            cohesion: RuleParams::new(0., 10., PI),
            separation: RuleParams::new(0., 3., PI),
            alignment: RuleParams::new(0., 30., PI),
            ..options()
        };
        let boids = vec![
            Boid::new(50., 50., Vec2::ZERO, 0),
            Boid::new(52., 50., Vec2::ZERO, 1),
            Boid::new(55., 50., Vec2::ZERO, 2),
            Boid::new(70., 50., Vec2::ZERO, 3),
        ];
        let mut flock = Flock::from_boids(boids, &ro).unwrap();

        assert_eq!(flock.neighbour_count(0), 0);
        flock.update(&ro);

        let counts = flock.metadata(0).neighbour_counts;
        assert_eq!((counts.cohesion, counts.separation, counts.alignment), (2, 1, 3));
        assert_eq!(flock.neighbour_count(0), 3);
    }

    #[test]
    fn update_reads_only_the_previous_tick() {
        // boid 0 moves first, boid 1 has to see where it was rather than where it went
        let mut ro = options();
        ro.cohesion = RuleParams::new(1., 50., PI);
        ro.separation = RuleParams::new(0., 0., PI);
        ro.alignment = RuleParams::new(0., 0., PI);
        ro.max_speed = 50.;
        let boids = vec![
            Boid::new(40., 50., Vec2::new(1., 0.), 0),
            Boid::new(20., 50., Vec2::new(1., 0.), 1),
        ];
        let mut flock = Flock::from_boids(boids, &ro).unwrap();

        flock.update(&ro);

        assert_eq!(flock.metadata(0).accelleration_update.cohesion, Vec2::ZERO);
        assert_eq!(flock.metadata(1).accelleration_update.cohesion, Vec2::new(20., 0.));
        assert_relative_eq!(flock.positions()[0].x, 41.);
        assert_relative_eq!(flock.positions()[1].x, 41.);
    }

    #[test]
    fn overflowing_cohesion_saturates_at_max_speed() {
        let ro = RunOptions {
            cohesion: RuleParams::new(f32::MAX, 50., PI),
            ..options()
        };
        assert!(ro.validate().is_ok());
        let boids = vec![
            Boid::new(40., 50., Vec2::new(1., 0.), 0),
            Boid::new(60., 50., Vec2::new(1., 0.), 1),
        ];
        let mut flock = Flock::from_boids(boids, &ro).unwrap();

        flock.update(&ro);

        assert_eq!(flock.metadata(0).accelleration_update.cohesion.x, f32::INFINITY);
        assert_eq!(flock.velocities()[0], Vec2::new(ro.max_speed, 0.));
        assert!(flock.positions().iter().all(|p| p.is_finite()));
        assert!(flock.velocities().iter().all(|v| v.is_finite()));
    }

    #[test]
    #[should_panic(expected = "flock updated with invalid options")]
    #[cfg(debug_assertions)]
    fn update_rejects_unvalidated_options() {
        let ro = options();
        let mut flock = Flock::initialize(4, &ro).unwrap();

        flock.update(&RunOptions {
            world: WorldSize::new(0., 100.),
            ..ro
        });
    }

    #[test]
    fn tracker_can_be_switched_between_ticks() {
        let mut ro = options();
        let mut flock = Flock::initialize(30, &ro).unwrap();

        flock.update(&ro);
        ro.tracker_type = TrackerType::SpatHash;
        flock.update(&ro);

        assert_eq!(flock.tick(), 2);
    }
}
