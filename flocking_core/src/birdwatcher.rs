use std::{io, mem};

use serde::Serialize;

use crate::{error::FlockError, flock::Flock};

// this is more of a bird data accumulator than a birdwatcher, it never touches the physics
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct BoidData {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub n_neighbours: usize,
    pub time: u64,
}

pub struct Birdwatcher {
    locations: Vec<BoidData>,
    render_ticker: u64,
    sample_rate: u64,
}

impl Birdwatcher {
    pub fn new(sample_rate: u64) -> Self {
        Birdwatcher {
            locations: Vec::new(),
            render_ticker: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Triggers data collection, records the flock on every `sample_rate`-th call.
    ///
    /// Returns whether a sample was taken.
    pub fn watch(&mut self, flock: &Flock) -> bool {
        if !self.should_sample() {
            return false;
        }

        let time = self.render_ticker / self.sample_rate;
        self.locations.extend(flock.view().map(|(b, m)| BoidData {
            id: b.id,
            x: b.position.x,
            y: b.position.y,
            vx: b.velocity.x,
            vy: b.velocity.y,
            n_neighbours: m.n_neighbours,
            time,
        }));

        true
    }

    pub fn restart(&mut self) {
        self.locations.clear();
        self.render_ticker = 0;
    }

    pub fn pop_data(&mut self) -> Vec<BoidData> {
        mem::take(&mut self.locations)
    }

    /// Writes samples as CSV, with a header row, to any writer.
    pub fn write_csv<W: io::Write>(data: &[BoidData], writer: W) -> Result<(), FlockError> {
        let mut wtr = csv::Writer::from_writer(writer);

        for b in data {
            wtr.serialize(b)?;
        }
        wtr.flush().map_err(csv::Error::from)?;

        Ok(())
    }

    /// Empties the birdwatcher's memory into the writer, returning the samples written.
    pub fn pop_data_write<W: io::Write>(&mut self, writer: W) -> Result<Vec<BoidData>, FlockError> {
        let data = self.pop_data();
        Birdwatcher::write_csv(&data, writer)?;
        Ok(data)
    }

    fn should_sample(&mut self) -> bool {
        self.render_ticker += 1;

        self.render_ticker % self.sample_rate == 0
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::{Birdwatcher, BoidData};
    use crate::{boid::Boid, flock::Flock, options::RunOptions};

    fn flock(ro: &RunOptions) -> Flock {
        let boids = vec![
            Boid::new(10., 20., Vec2::new(1., 0.), 0),
            Boid::new(30., 40., Vec2::new(0., 1.), 1),
        ];
        Flock::from_boids(boids, ro).unwrap()
    }

    #[test]
    fn samples_every_nth_tick() {
        let ro = RunOptions::default();
        let flock = flock(&ro);
        let mut watcher = Birdwatcher::new(3);

        let taken: Vec<bool> = (0..6).map(|_| watcher.watch(&flock)).collect();

        assert_eq!(taken, vec![false, false, true, false, false, true]);
        let data = watcher.pop_data();
        assert_eq!(data.len(), 4);
        assert_eq!(data[0].time, 1);
        assert_eq!(data[3].time, 2);
        assert!(watcher.pop_data().is_empty());
    }

    #[test]
    fn writes_csv_with_header() {
        let data = [BoidData {
            id: 0,
            x: 1.5,
            y: 2.,
            vx: 0.5,
            vy: -1.,
            n_neighbours: 3,
            time: 7,
        }];
        let mut out = Vec::new();

        Birdwatcher::write_csv(&data, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "id,x,y,vx,vy,n_neighbours,time\n0,1.5,2.0,0.5,-1.0,3,7\n");
    }

    #[test]
    fn restart_forgets_samples() {
        let ro = RunOptions::default();
        let flock = flock(&ro);
        let mut watcher = Birdwatcher::new(1);

        watcher.watch(&flock);
        watcher.restart();

        assert!(watcher.pop_data().is_empty());
        watcher.watch(&flock);
        assert_eq!(watcher.pop_data()[0].time, 1);
    }
}
