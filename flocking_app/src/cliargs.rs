use clap_serde_derive::{
    clap::{self, Parser, ValueEnum},
    ClapSerde,
};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(author = "PheelaV", version, about, long_about = None)]
/// Headless boids (Reynolds '87) simulation, samples are written to stdout as CSV.
pub struct Args {
    /// Config file
    #[arg(short, long = "config", default_value = "config.toml")]
    pub config_path: std::path::PathBuf,

    /// Rest of arguments
    #[command(flatten)]
    pub config: <Config as ClapSerde>::Opt,
}

#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    Toroidal,
    Reflective,
    Repulsive,
}

#[derive(ClapSerde, Serialize)]
/// Programatic configuration
///
/// Uses defaults, which can be overwritten by specifying a filepath for the `-c` or `--config` arg option
pub struct Config {
    #[default(128)]
    #[arg(short = 'n', long)]
    /// number of boids
    pub no_boids: usize,

    #[default(1000)]
    #[arg(short = 'i', long)]
    /// number of ticks to simulate
    pub ticks: u64,

    #[default(1)]
    #[arg(short = 'r', long)]
    /// sample every n-th tick
    pub sample_rate: u64,

    #[default(0)]
    #[arg(long)]
    /// rng seed, 0 seeds from entropy
    pub seed: u64,

    #[default(500.)]
    #[arg(short = 'x', long)]
    pub width: f32,
    #[default(500.)]
    #[arg(short = 'y', long)]
    pub height: f32,

    #[default(0.003)]
    #[arg(long = "coh_coef")]
    pub cohesion_coefficient: f32,
    #[default(1.5)]
    #[arg(long = "sep_coef")]
    pub separation_coefficient: f32,
    #[default(0.05)]
    #[arg(long = "ali_coef")]
    pub alignment_coefficient: f32,

    #[default(48.)]
    #[arg(long = "coh_dist")]
    pub cohesion_distance: f32,
    #[default(8.)]
    #[arg(long = "sep_dist")]
    pub separation_distance: f32,
    #[default(30.)]
    #[arg(long = "ali_dist")]
    pub alignment_distance: f32,

    #[default(90.)]
    #[arg(long = "coh_fov")]
    /// half angle of the perception cone, in degrees
    pub cohesion_fov: f32,
    #[default(90.)]
    #[arg(long = "sep_fov")]
    pub separation_fov: f32,
    #[default(60.)]
    #[arg(long = "ali_fov")]
    pub alignment_fov: f32,

    #[default(0.3)]
    #[arg(long = "min_speed")]
    pub min_speed: f32,
    #[default(1.8)]
    #[arg(long = "max_speed")]
    pub max_speed: f32,
    #[default(1.)]
    #[arg(long = "dt")]
    pub time_step: f32,

    #[default(BoundaryKind::Toroidal)]
    #[arg(long, value_enum)]
    pub boundary: BoundaryKind,
    #[default(0.5)]
    #[arg(long = "wall_force")]
    /// only used by the repulsive boundary
    pub wall_force: f32,

    #[default(false)]
    #[arg(long = "toroidal_distance")]
    /// measure distances across the world's seams
    pub toroidal_distance: bool,
    #[default(false)]
    #[arg(long)]
    /// use the spatial hash neighbour tracker
    pub spathash: bool,
    #[default(false)]
    #[arg(long)]
    pub parallel: bool,
}
