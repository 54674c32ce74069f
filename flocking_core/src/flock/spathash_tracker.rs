use glam::Vec2;

use crate::options::{Distance, RuleParams, RunOptions};

use super::tracker::{perceives, Tracker};

/// Upper bound on cells per axis, keeps degenerate thresholds from allocating huge grids.
const MAX_CELLS_PER_AXIS: usize = 512;
/// Cells are sized slightly above the perception so rounding at a cell edge cannot skip one.
const CELL_SLACK: f32 = 1.001;

#[derive(Debug, Clone, PartialEq)]
pub struct SpatialHashingTableSettings {
    /// grid x range
    pub x_cell_count: usize,
    /// grid y range
    pub y_cell_count: usize,
    /// n cells of grid
    pub cell_count: usize,
    /// environment x units per grid x cell
    pub x_cell_res: f32,
    /// environment y units per grid y cell
    pub y_cell_res: f32,
}

/// Uses a spatial hashing space division method, where all cells of the underlying
/// table are stored in a 1D array, ordered by cell, with a pivot per cell marking
/// where its run of boids starts.
///
/// Cells are never smaller than the widest rule's perception, so only the 3x3 block
/// around a boid's home cell has to be scanned. Candidates are visited in index order
/// and filtered by the same predicate as [`NaiveTracker`](super::naive_tracker::NaiveTracker),
/// which makes the answers identical to the brute force ones.
#[derive(Debug)]
pub struct SpatHashTracker {
    pub(crate) settings: SpatialHashingTableSettings,
    /// start of each cell's run in `table`, with a trailing end marker
    pivots: Vec<usize>,
    /// boid indices grouped by cell, ascending within a cell
    table: Vec<usize>,
    /// For each boid, records its cell index.
    index: Vec<usize>,
    distance: Distance,
}

impl SpatHashTracker {
    pub fn new(run_options: &RunOptions) -> Self {
        let settings = SpatHashTracker::get_tracker_settings(run_options);

        SpatHashTracker {
            pivots: vec![0; settings.cell_count + 1],
            table: Vec::new(),
            index: Vec::new(),
            settings,
            distance: run_options.distance,
        }
    }

    pub fn get_tracker_settings(run_options: &RunOptions) -> SpatialHashingTableSettings {
        let reach = run_options.max_sensory_distance();

        let x_cell_count = SpatHashTracker::cells_along(run_options.world.width, reach);
        let y_cell_count = SpatHashTracker::cells_along(run_options.world.height, reach);

        SpatialHashingTableSettings {
            x_cell_count,
            y_cell_count,
            cell_count: x_cell_count * y_cell_count,
            x_cell_res: run_options.world.width / x_cell_count as f32,
            y_cell_res: run_options.world.height / y_cell_count as f32,
        }
    }

    /// flooring keeps every cell at least `reach` wide
    fn cells_along(range: f32, reach: f32) -> usize {
        if reach <= 0. {
            return MAX_CELLS_PER_AXIS;
        }
        ((range / (reach * CELL_SLACK)).floor() as usize).clamp(1, MAX_CELLS_PER_AXIS)
    }

    /// Returns "hashed" value representing an index for spatial subdivision
    ///
    /// ## Returns
    /// an index as _usize_, that takes values from 0..(x_cells * y_cells)
    pub fn get_table_index(&self, position: Vec2) -> usize {
        let (x, y) = self.get_cell(position);
        x + y * self.settings.x_cell_count
    }

    fn get_cell(&self, position: Vec2) -> (usize, usize) {
        let x = ((position.x / self.settings.x_cell_res).floor().max(0.) as usize)
            .min(self.settings.x_cell_count - 1);
        let y = ((position.y / self.settings.y_cell_res).floor().max(0.) as usize)
            .min(self.settings.y_cell_count - 1);
        (x, y)
    }

    /// Offsets a cell coordinate, wrapping on a torus and dropping it at a wall.
    fn neighbour_cell(&self, cell: usize, offset: i64, count: usize) -> Option<usize> {
        let target = cell as i64 + offset;
        match self.distance {
            Distance::EucToroidal => Some(target.rem_euclid(count as i64) as usize),
            Distance::EucEnclosed => {
                if target < 0 || target >= count as i64 {
                    None
                } else {
                    Some(target as usize)
                }
            }
        }
    }

    fn cell_run(&self, cell_index: usize) -> &[usize] {
        &self.table[self.pivots[cell_index]..self.pivots[cell_index + 1]]
    }
}

impl Tracker for SpatHashTracker {
    fn rebuild(&mut self, positions: &[Vec2], run_options: &RunOptions) {
        let new_settings = SpatHashTracker::get_tracker_settings(run_options);
        if new_settings != self.settings {
            self.pivots.resize(new_settings.cell_count + 1, 0);
            self.settings = new_settings;
        }
        self.distance = run_options.distance;

        // counting sort of boid indices by cell, stable so each run stays ascending
        let index: Vec<usize> = positions.iter().map(|p| self.get_table_index(*p)).collect();
        self.index = index;

        self.pivots.iter_mut().for_each(|p| *p = 0);
        for cell in self.index.iter() {
            self.pivots[cell + 1] += 1;
        }
        for i in 1..self.pivots.len() {
            self.pivots[i] += self.pivots[i - 1];
        }

        let mut cursor = self.pivots.clone();
        self.table.clear();
        self.table.resize(positions.len(), 0);
        for (boid, cell) in self.index.iter().enumerate() {
            self.table[cursor[*cell]] = boid;
            cursor[*cell] += 1;
        }
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

        let (cx, cy) = self.get_cell(positions[subject]);
        let mut cells: Vec<usize> = Vec::with_capacity(9);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let x = self.neighbour_cell(cx, dx, self.settings.x_cell_count);
                let y = self.neighbour_cell(cy, dy, self.settings.y_cell_count);
                if let (Some(x), Some(y)) = (x, y) {
                    cells.push(x + y * self.settings.x_cell_count);
                }
            }
        }
        // small grids wrap onto the same cell more than once
        cells.sort_unstable();
        cells.dedup();

        let position = positions[subject];
        let velocity = velocities[subject];
        neighbours.extend(
            cells
                .iter()
                .flat_map(|c| self.cell_run(*c).iter().copied())
                .filter(|i_other| *i_other != subject)
                .filter(|i_other| {
                    perceives(position, velocity, positions[*i_other], rule, run_options)
                }),
        );
        // same order as a brute force scan, so the rules sum in the same order
        neighbours.sort_unstable();
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;
    use rstest::rstest;

    use super::SpatHashTracker;
    use crate::{
        flock::{naive_tracker::NaiveTracker, tracker::Tracker},
        options::{Distance, RunOptions, WorldSize},
    };

    fn options() -> RunOptions {
        RunOptions {
            world: WorldSize::new(400., 300.),
            ..Default::default()
        }
    }

    #[test]
    fn cells_are_at_least_as_wide_as_perception() {
        let ro = options();
        let settings = SpatHashTracker::get_tracker_settings(&ro);

        assert_eq!(settings.x_cell_count, 8);
        assert_eq!(settings.y_cell_count, 6);
        assert_eq!(settings.cell_count, 48);
        assert!(settings.x_cell_res >= ro.max_sensory_distance());
        assert!(settings.y_cell_res >= ro.max_sensory_distance());
    }

    #[test]
    fn should_produce_1d_index() {
        let ro = options();
        let tracker = SpatHashTracker::new(&ro);

        assert_eq!(tracker.get_table_index(Vec2::new(0., 0.)), 0);
        assert_eq!(tracker.get_table_index(Vec2::new(60., 10.)), 1);
        assert_eq!(tracker.get_table_index(Vec2::new(60., 60.)), 9);
        assert_eq!(tracker.get_table_index(Vec2::new(399.9, 299.9)), 47);
    }

    #[test]
    fn perception_wider_than_world_uses_one_cell() {
        let mut ro = options();
        ro.cohesion.distance_threshold = 1000.;
        let settings = SpatHashTracker::get_tracker_settings(&ro);

        assert_eq!(settings.cell_count, 1);
    }

    #[rstest]
    #[case(Distance::EucEnclosed)]
    #[case(Distance::EucToroidal)]
    fn matches_brute_force(#[case] distance: Distance) {
        let ro = RunOptions {
            distance,
            ..options()
        };
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let positions: Vec<Vec2> = (0..300)
            .map(|_| Vec2::new(rng.gen_range(0. ..400.), rng.gen_range(0. ..300.)))
            .collect();
        let velocities: Vec<Vec2> = (0..300)
            .map(|_| Vec2::new(rng.gen_range(-1. ..1.), rng.gen_range(-1. ..1.)))
            .collect();

        let mut hashed = SpatHashTracker::new(&ro);
        hashed.rebuild(&positions, &ro);
        let naive = NaiveTracker::new();

        let mut expected = Vec::new();
        let mut actual = Vec::new();
        for subject in 0..positions.len() {
            for rule in [&ro.cohesion, &ro.separation, &ro.alignment] {
                naive.get_neighbours(subject, &positions, &velocities, rule, &ro, &mut expected);
                hashed.get_neighbours(subject, &positions, &velocities, rule, &ro, &mut actual);
                assert_eq!(actual, expected, "boid {subject}");
            }
        }
    }
}
