//! Turning points on the section axis.
//!
//! The launch interval at energy `E` is bounded by the two roots of
//! `g(x) = E - φ(x, 0)`. Each root is found by Newton's method from its own
//! seed; the analytic derivative is `g'(x) = a_x(x, 0)`, the acceleration
//! along the axis of a particle at rest. Both roots are then pulled inwards by
//! a safety factor so that launches never sit exactly on the zero-velocity
//! curve.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::TurningPointSettings;
use crate::potential::Potential;

/// Bounds of the launch interval on the `y = 0` axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurningPoints {
    /// Lower bound.
    pub low: f64,
    /// Upper bound.
    pub high: f64,
}

impl TurningPoints {
    /// `E - φ` at both bounds. Small and non-negative after the safety
    /// factor has been applied.
    pub fn residuals(&self, potential: &dyn Potential, energy: f64) -> (f64, f64) {
        (
            energy - potential.phi([self.low, 0.0]),
            energy - potential.phi([self.high, 0.0]),
        )
    }

    /// Interval width.
    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Turning-point search failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TurningPointError {
    /// Newton ran away, usually a bad seed or an energy the potential cannot
    /// bound along the axis.
    #[error(
        "turning point search diverged at energy {energy}: root {root} exceeds {threshold} in magnitude"
    )]
    Divergence {
        /// Energy level.
        energy: f64,
        /// Root returned by the iteration.
        root: f64,
        /// Sanity threshold.
        threshold: f64,
    },

    /// Iteration cap reached.
    #[error("turning point search from seed {seed} did not converge at energy {energy} (last iterate {last})")]
    NotConverged {
        /// Energy level.
        energy: f64,
        /// Starting point.
        seed: f64,
        /// Final iterate.
        last: f64,
    },

    /// `a_x` vanished, Newton cannot proceed.
    #[error("zero derivative at x = {x} while searching turning points at energy {energy}")]
    FlatDerivative {
        /// Energy level.
        energy: f64,
        /// Where the derivative vanished.
        x: f64,
    },

    /// Both seeds converged to the same side.
    #[error("empty launch interval [{low}, {high}] at energy {energy}")]
    DegenerateInterval {
        /// Energy level.
        energy: f64,
        /// Lower root after scaling.
        low: f64,
        /// Upper root after scaling.
        high: f64,
    },
}

/// Newton iteration for `E - φ(x, 0) = 0` starting at `seed`.
fn newton(
    potential: &dyn Potential,
    energy: f64,
    seed: f64,
    settings: &TurningPointSettings,
) -> Result<f64, TurningPointError> {
    let mut x = seed;
    for iter in 0..settings.max_iter {
        let g = energy - potential.phi([x, 0.0]);
        let dg = potential.accel(&[x, 0.0, 0.0, 0.0])[0];
        if dg == 0.0 {
            return Err(TurningPointError::FlatDerivative { energy, x });
        }
        let next = x - g / dg;
        if !next.is_finite() {
            return Err(TurningPointError::Divergence {
                energy,
                root: next,
                threshold: settings.divergence_threshold,
            });
        }
        if (next - x).abs() < settings.tol {
            debug!(energy, seed, root = next, iterations = iter + 1, "turning point");
            return Ok(next);
        }
        x = next;
    }
    Err(TurningPointError::NotConverged {
        energy,
        seed,
        last: x,
    })
}

/// Locate the launch interval at `energy`.
///
/// The caller is responsible for `energy` lying inside the potential's
/// admissible range.
pub fn find_turning_points(
    potential: &dyn Potential,
    energy: f64,
    settings: &TurningPointSettings,
) -> Result<TurningPoints, TurningPointError> {
    let (seed_low, seed_high) = settings.seeds;
    let roots = [
        newton(potential, energy, seed_low, settings)?,
        newton(potential, energy, seed_high, settings)?,
    ];

    for root in roots {
        if root.abs() > settings.divergence_threshold {
            return Err(TurningPointError::Divergence {
                energy,
                root,
                threshold: settings.divergence_threshold,
            });
        }
    }

    let low = roots[0] * settings.safety_factor;
    let high = roots[1] * settings.safety_factor;
    if low >= high {
        return Err(TurningPointError::DegenerateInterval { energy, low, high });
    }
    Ok(TurningPoints { low, high })
}
