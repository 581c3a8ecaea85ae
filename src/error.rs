//! Errors that abort a sweep.

use thiserror::Error;

use crate::solver::IntegrationError;
use crate::store::StoreError;
use crate::turning::TurningPointError;

/// Errors that abort a tomography sweep.
///
/// Failures of individual orbits are not errors at this level: they are
/// recorded in the orbit's [`OrbitStatus`](crate::OrbitStatus) and the sweep
/// carries on.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A requested energy lies outside the potential's admissible range.
    #[error(
        "energy {energy} is outside the admissible range ({min}, {max}) of the potential; \
         choose energies strictly inside it"
    )]
    EnergyOutOfRange {
        /// Offending energy.
        energy: f64,
        /// Lower bound of the admissible range.
        min: f64,
        /// Upper bound of the admissible range.
        max: f64,
    },

    /// No energies to sweep.
    #[error("the energy sweep is empty")]
    EmptyEnergyRange,

    /// Settings the drivers cannot run with.
    #[error("invalid settings: {message}")]
    InvalidSettings {
        /// What is wrong.
        message: String,
    },

    /// The turning-point search failed for an energy level.
    #[error(transparent)]
    TurningPoint(#[from] TurningPointError),

    /// A sampled launch point lies in the energetically forbidden region.
    #[error("launch point x = {x} is forbidden at energy {energy} (phi = {phi})")]
    ForbiddenLaunch {
        /// Energy level.
        energy: f64,
        /// Launch position on the section axis.
        x: f64,
        /// Potential at the launch point.
        phi: f64,
    },

    /// The integrator rejected its inputs.
    #[error("integration could not start: {0}")]
    Integration(#[from] IntegrationError),

    /// Loading or saving a collection failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
