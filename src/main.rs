use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use poincare_tomography::store::{self, DEFAULT_FILE};
use poincare_tomography::{
    EnergySweep, PoincareCollection, PotentialConfig, Progress, Scenario, Silent,
};

/// Poincaré section tomography of orbits in a rotating logarithmic potential.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Final integration time.
    #[arg(long = "tf")]
    t_final: Option<f64>,

    /// Crossings collected per orbit before stopping.
    #[arg(long = "nb-crossings")]
    crossings: Option<usize>,

    /// Orbits per energy.
    #[arg(long = "nb-orbs")]
    orbits: Option<usize>,

    /// Integrate up to the final time whatever the number of crossings.
    #[arg(long)]
    no_count: bool,

    /// Circular velocity of the logarithmic potential.
    #[arg(long)]
    v0: Option<f64>,

    /// Core radius of the logarithmic potential.
    #[arg(long)]
    rc: Option<f64>,

    /// Flattening of the logarithmic potential.
    #[arg(long)]
    q: Option<f64>,

    /// Pattern speed of the rotating frame.
    #[arg(long)]
    omega: Option<f64>,

    /// Lowest energy.
    #[arg(long)]
    emin: Option<f64>,

    /// Highest energy.
    #[arg(long)]
    emax: Option<f64>,

    /// Number of energies.
    #[arg(long = "nb-e")]
    n_energies: Option<usize>,

    /// Keep the current orbit on screen when selecting a new section point.
    #[arg(long)]
    no_orbit_redraw: bool,

    /// Show a progress bar over energies.
    #[arg(long)]
    progress: bool,

    /// Save the collection to PoincareCollection.bin.
    #[arg(long)]
    save: bool,

    /// Load a saved collection instead of integrating.
    #[arg(
        long,
        value_name = "PATH",
        conflicts_with_all = [
            "t_final", "crossings", "orbits", "no_count", "v0", "rc", "q", "omega",
            "emin", "emax", "n_energies", "scenario", "parallel", "save",
        ]
    )]
    open: Option<PathBuf>,

    /// YAML scenario; command-line values take precedence.
    #[arg(long, value_name = "YAML")]
    scenario: Option<PathBuf>,

    /// Integrate the orbits of each energy in parallel.
    #[arg(long)]
    parallel: bool,

    /// Export section points to CSV.
    #[arg(long, value_name = "PATH")]
    csv: Option<PathBuf>,
}

impl Args {
    /// Scenario file (or defaults) with command-line overrides applied.
    fn scenario(&self) -> Result<Scenario> {
        let mut scenario = match &self.scenario {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("cannot open scenario {}", path.display()))?;
                Scenario::from_reader(BufReader::new(file))
                    .with_context(|| format!("invalid scenario {}", path.display()))?
            }
            None => Scenario::default(),
        };

        let integration = &mut scenario.integration;
        if let Some(tf) = self.t_final {
            integration.t_final = tf;
        }
        if let Some(k) = self.crossings {
            integration.crossings = Some(k);
        }
        if self.no_count {
            integration.crossings = None;
        }

        let sweep = &mut scenario.sweep;
        if let Some(n) = self.orbits {
            sweep.orbits_per_energy = n;
        }
        if let Some(e) = self.emin {
            sweep.e_min = e;
        }
        if let Some(e) = self.emax {
            sweep.e_max = e;
        }
        if let Some(n) = self.n_energies {
            sweep.n_energies = n;
        }
        sweep.parallel |= self.parallel;

        if self.v0.is_some() || self.rc.is_some() || self.q.is_some() || self.omega.is_some() {
            scenario.potential = PotentialConfig::galaxy(
                self.v0.unwrap_or(10.0),
                self.rc.unwrap_or(1.0),
                self.q.unwrap_or(0.8),
                self.omega.unwrap_or(0.3),
            );
        }
        Ok(scenario)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

#[cfg(feature = "progress")]
fn progress_reporter(enabled: bool) -> Box<dyn Progress> {
    if enabled {
        Box::new(poincare_tomography::ProgressBar::new())
    } else {
        Box::new(Silent)
    }
}

#[cfg(not(feature = "progress"))]
fn progress_reporter(enabled: bool) -> Box<dyn Progress> {
    if enabled {
        tracing::warn!("built without the `progress` feature, no progress bar");
    }
    Box::new(Silent)
}

fn compute(args: &Args) -> Result<PoincareCollection> {
    let scenario = args.scenario()?;
    let potential = scenario.potential.build();
    info!(potential = %potential.describe(), "starting sweep");

    let sweep = EnergySweep::new(potential.as_ref())
        .with_integration(scenario.integration.clone())
        .with_turning_points(scenario.turning_points.clone())
        .parallel(scenario.sweep.parallel);
    let mut progress = progress_reporter(args.progress);
    let collection = sweep.run_settings(&scenario.sweep, progress.as_mut())?;

    if args.save {
        collection.save(DEFAULT_FILE)?;
    }
    Ok(collection)
}

fn print_summary(collection: &PoincareCollection, redraw: bool) {
    println!("{}", collection.description());
    println!(
        "{:>12} {:>12} {:>12} {:>7} {:>10} {:>9}",
        "energy", "x_low", "x_high", "orbits", "crossings", "failures"
    );
    for level in collection.levels() {
        println!(
            "{:>12.4} {:>12.6} {:>12.6} {:>7} {:>10.2} {:>9}",
            level.energy,
            level.turning_points.low,
            level.turning_points.high,
            level.orbits.len(),
            level.mean_crossings(),
            level.failures()
        );
    }
    println!("orbit redraw on selection: {}", if redraw { "on" } else { "off" });
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let collection = match &args.open {
        Some(path) => PoincareCollection::load(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => compute(&args)?,
    };

    if let Some(path) = &args.csv {
        store::write_sections_csv(&collection, path)?;
    }
    print_summary(&collection, !args.no_orbit_redraw);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_scenario() {
        let args = Args::try_parse_from(["tomography"]).unwrap();
        assert_eq!(args.scenario().unwrap(), Scenario::default());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "tomography", "--tf", "50", "--nb-orbs", "5", "--no-count", "--omega", "0.1",
            "--emin", "40", "--nb-e", "2", "--parallel",
        ])
        .unwrap();
        let s = args.scenario().unwrap();
        assert_eq!(s.integration.t_final, 50.0);
        assert_eq!(s.integration.crossings, None);
        assert_eq!(s.sweep.orbits_per_energy, 5);
        assert_eq!(s.sweep.energies(), vec![40.0, 200.0]);
        assert!(s.sweep.parallel);
        assert_eq!(s.potential, PotentialConfig::galaxy(10.0, 1.0, 0.8, 0.1));
    }

    #[test]
    fn open_excludes_fresh_computation() {
        assert!(Args::try_parse_from(["tomography", "--open", "a.bin", "--save"]).is_err());
        assert!(Args::try_parse_from(["tomography", "--open", "a.bin", "--nb-e", "2"]).is_err());
        let args =
            Args::try_parse_from(["tomography", "--open", "a.bin", "--csv", "s.csv"]).unwrap();
        assert_eq!(args.open, Some(PathBuf::from("a.bin")));
    }
}
