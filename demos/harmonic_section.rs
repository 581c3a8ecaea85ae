//! Section of a single orbit in the isotropic well `φ = x² + y²`.
//!
//! Every upward pass through `y = 0` lands on the launch point, so the
//! section collapses to `(x0, 0)`. Compares the located crossing times with
//! the analytic period `2π/ω`.
//!
//! Run with:
//!   cargo run --example harmonic_section

use std::f64::consts::PI;

use poincare_tomography::{
    find_turning_points, launch_states, HarmonicPotential, IntegrationSettings, OrbitSectioner,
    TurningPointSettings,
};

fn main() -> anyhow::Result<()> {
    let omega = 2.0_f64.sqrt();
    let potential = HarmonicPotential::new(omega);
    let energy = 2.0;

    let interval = find_turning_points(&potential, energy, &TurningPointSettings::default())?;
    println!(
        "turning points at E = {energy}: [{:.12}, {:.12}]",
        interval.low, interval.high
    );

    let launch = launch_states(&potential, energy, &interval, 1)?[0];
    println!("launch: x0 = {:.12}, vy0 = {:.12}", launch[0], launch[3]);

    let settings = IntegrationSettings {
        crossings: Some(4),
        ..Default::default()
    };
    let orbit = OrbitSectioner::new(&potential, &settings).run(&launch)?;

    let period = 2.0 * PI / omega;
    println!("\n{:>3} {:>20} {:>20}", "k", "x", "vx");
    for (k, [x, vx]) in orbit.section.points().iter().enumerate() {
        println!("{:>3} {:>20.12} {:>20.3e}", k + 1, x, vx);
    }
    println!(
        "\nstatus: {:?}, t_end = {:.12} (4 periods = {:.12}, error {:.2e})",
        orbit.status,
        orbit.t_end,
        4.0 * period,
        (orbit.t_end - 4.0 * period).abs()
    );
    println!("{} trajectory samples", orbit.trajectory.len());
    Ok(())
}
