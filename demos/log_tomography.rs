//! Section stack for a flattened logarithmic potential seen from a rotating
//! frame.
//!
//! Sweeps three Jacobi energies with five orbits each, then writes the
//! section points to `sections.csv` for plotting.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example log_tomography

use poincare_tomography::store::write_sections_csv;
use poincare_tomography::{
    EnergySweep, IntegrationSettings, PotentialConfig, Silent, SweepSettings,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let potential = PotentialConfig::galaxy(10.0, 1.0, 0.8, 0.3).build();
    let settings = SweepSettings {
        e_min: 50.0,
        e_max: 150.0,
        n_energies: 3,
        orbits_per_energy: 5,
        parallel: true,
    };

    let collection = EnergySweep::new(potential.as_ref())
        .with_integration(IntegrationSettings {
            crossings: Some(100),
            t_final: 500.0,
            n_samples: 5000,
            ..Default::default()
        })
        .parallel(settings.parallel)
        .run_settings(&settings, &mut Silent)?;

    println!("{}", collection.description());
    for (i, level) in collection.levels().iter().enumerate() {
        println!(
            "E = {:7.2}  x in [{:+.4}, {:+.4}]",
            level.energy, level.turning_points.low, level.turning_points.high
        );
        for (k, section) in collection.sections(i).unwrap_or_default().iter().enumerate() {
            let (xmin, xmax) = section
                .x()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(x), hi.max(x))
                });
            println!(
                "   orbit {k}: {:3} crossings, x spans [{:+.4}, {:+.4}]",
                section.len(),
                xmin,
                xmax
            );
        }
    }

    write_sections_csv(&collection, "sections.csv")?;
    println!("section points written to sections.csv");
    Ok(())
}
