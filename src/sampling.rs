//! Launch conditions for one energy level.
//!
//! Orbits start on the section axis (`y = 0`) with no velocity along it
//! (`vx = 0`) and all of their kinetic energy across it:
//! `vy = sqrt(2 (E - φ(x, 0)))`.

use crate::error::SweepError;
use crate::potential::{OrbitState, Potential};
use crate::turning::TurningPoints;

/// `n` evenly spaced values from `start` to `end` inclusive.
///
/// `n = 1` yields `[start]`, `n = 0` an empty vector.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// `n` launch states spread over the turning-point interval.
///
/// Fails with [`SweepError::ForbiddenLaunch`] if a launch point has
/// `φ(x, 0) > E`, which can only happen when the interval was not produced
/// by [`find_turning_points`](crate::find_turning_points) for this energy.
pub fn launch_states(
    potential: &dyn Potential,
    energy: f64,
    interval: &TurningPoints,
    n: usize,
) -> Result<Vec<OrbitState>, SweepError> {
    linspace(interval.low, interval.high, n)
        .into_iter()
        .map(|x| {
            let phi = potential.phi([x, 0.0]);
            let kinetic = energy - phi;
            if kinetic.is_nan() || kinetic < 0.0 {
                return Err(SweepError::ForbiddenLaunch { energy, x, phi });
            }
            Ok([x, 0.0, 0.0, (2.0 * kinetic).sqrt()])
        })
        .collect()
}
