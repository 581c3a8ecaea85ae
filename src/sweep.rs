//! Energy sweeps: one batch of sectioned orbits per energy level.
//!
//! For every energy the driver finds the turning points on the section axis,
//! spreads launch points between them, integrates each launch and keeps the
//! trajectory and section in launch order. The collected levels form a
//! [`PoincareCollection`], the tomographic stack of sections.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{IntegrationSettings, SweepSettings, TurningPointSettings};
use crate::error::SweepError;
use crate::potential::Potential;
use crate::progress::Progress;
use crate::sampling::launch_states;
use crate::section::{Orbit, OrbitSectioner, Section};
use crate::turning::{find_turning_points, TurningPoints};

/// All orbits integrated at one energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyLevel {
    /// Energy (Jacobi integral in a rotating frame).
    pub energy: f64,
    /// Launch interval on the section axis.
    pub turning_points: TurningPoints,
    /// Orbits in launch order, lowest `x` first.
    pub orbits: Vec<Orbit>,
}

impl EnergyLevel {
    /// Sections in launch order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> + '_ {
        self.orbits.iter().map(|o| &o.section)
    }

    /// Orbits whose integration failed.
    pub fn failures(&self) -> usize {
        self.orbits.iter().filter(|o| o.status.is_failed()).count()
    }

    /// Average number of crossings per orbit.
    pub fn mean_crossings(&self) -> f64 {
        if self.orbits.is_empty() {
            return 0.0;
        }
        let total: usize = self.sections().map(Section::len).sum();
        total as f64 / self.orbits.len() as f64
    }
}

/// Sections over a set of energies in one potential.
///
/// Level `i` always belongs to `energies()[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoincareCollection {
    description: String,
    levels: Vec<EnergyLevel>,
}

impl PoincareCollection {
    /// Assemble a collection.
    pub fn new(description: impl Into<String>, levels: Vec<EnergyLevel>) -> Self {
        Self {
            description: description.into(),
            levels,
        }
    }

    /// Description of the potential the orbits were integrated in.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Energy levels in sweep order.
    pub fn levels(&self) -> &[EnergyLevel] {
        &self.levels
    }

    /// Swept energies.
    pub fn energies(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.energy).collect()
    }

    /// Orbits of level `i`.
    pub fn orbits(&self, i: usize) -> Option<&[Orbit]> {
        self.levels.get(i).map(|l| l.orbits.as_slice())
    }

    /// Sections of level `i`.
    pub fn sections(&self, i: usize) -> Option<Vec<&Section>> {
        self.levels.get(i).map(|l| l.sections().collect())
    }

    /// Number of energy levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// No levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Sweep driver over a borrowed potential.
///
/// # Example
///
/// ```
/// use poincare_tomography::{EnergySweep, HarmonicPotential, IntegrationSettings, Silent};
///
/// let potential = HarmonicPotential::new(1.0);
/// let sweep = EnergySweep::new(&potential).with_integration(IntegrationSettings {
///     t_final: 50.0,
///     n_samples: 500,
///     crossings: Some(2),
///     ..Default::default()
/// });
/// let collection = sweep.run(&[0.5, 1.0], 3, &mut Silent).unwrap();
/// assert_eq!(collection.energies(), vec![0.5, 1.0]);
/// assert_eq!(collection.orbits(1).unwrap().len(), 3);
/// ```
pub struct EnergySweep<'a> {
    potential: &'a dyn Potential,
    integration: IntegrationSettings,
    turning_points: TurningPointSettings,
    parallel: bool,
}

impl<'a> EnergySweep<'a> {
    /// Driver with default settings.
    pub fn new(potential: &'a dyn Potential) -> Self {
        Self {
            potential,
            integration: IntegrationSettings::default(),
            turning_points: TurningPointSettings::default(),
            parallel: false,
        }
    }

    /// Replace the per-orbit integration settings.
    pub fn with_integration(mut self, settings: IntegrationSettings) -> Self {
        self.integration = settings;
        self
    }

    /// Replace the turning-point search settings.
    pub fn with_turning_points(mut self, settings: TurningPointSettings) -> Self {
        self.turning_points = settings;
        self
    }

    /// Integrate the orbits of each level on the rayon pool.
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Per-orbit integration settings in use.
    pub fn integration(&self) -> &IntegrationSettings {
        &self.integration
    }

    /// Reject energies outside the open admissible range of the potential.
    pub fn check_energies(&self, energies: &[f64]) -> Result<(), SweepError> {
        if energies.is_empty() {
            return Err(SweepError::EmptyEnergyRange);
        }
        let (min, max) = self.potential.energy_range();
        match energies.iter().find(|&&e| !(e > min && e < max)) {
            Some(&energy) => Err(SweepError::EnergyOutOfRange { energy, min, max }),
            None => Ok(()),
        }
    }

    fn check_settings(&self, n_orbits: usize) -> Result<(), SweepError> {
        if n_orbits == 0 {
            return Err(SweepError::InvalidSettings {
                message: "at least one orbit per energy is required".into(),
            });
        }
        self.integration.validate()
    }

    /// Integrate `n_orbits` orbits at `energy`.
    pub fn integrate_energy(&self, energy: f64, n_orbits: usize) -> Result<EnergyLevel, SweepError> {
        self.check_energies(&[energy])?;
        self.check_settings(n_orbits)?;
        self.integrate_level(energy, n_orbits)
    }

    fn integrate_level(&self, energy: f64, n_orbits: usize) -> Result<EnergyLevel, SweepError> {
        let turning_points = find_turning_points(self.potential, energy, &self.turning_points)?;
        let (res_low, res_high) = turning_points.residuals(self.potential, energy);
        info!(
            energy,
            x_low = turning_points.low,
            x_high = turning_points.high,
            residual_low = res_low,
            residual_high = res_high,
            "integrating energy level"
        );

        let launches = launch_states(self.potential, energy, &turning_points, n_orbits)?;
        let sectioner = OrbitSectioner::new(self.potential, &self.integration);
        let orbits = if self.parallel {
            launches
                .par_iter()
                .map(|launch| sectioner.run(launch))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            launches
                .iter()
                .map(|launch| sectioner.run(launch))
                .collect::<Result<Vec<_>, _>>()?
        };

        let level = EnergyLevel {
            energy,
            turning_points,
            orbits,
        };
        let failures = level.failures();
        if failures > 0 {
            warn!(energy, failures, "some orbits failed");
        }
        Ok(level)
    }

    /// Sweep `energies` in the order given with `n_orbits` orbits each.
    ///
    /// Every energy and setting is checked before the first orbit is
    /// integrated.
    pub fn run(
        &self,
        energies: &[f64],
        n_orbits: usize,
        progress: &mut dyn Progress,
    ) -> Result<PoincareCollection, SweepError> {
        self.check_energies(energies)?;
        self.check_settings(n_orbits)?;

        progress.start(energies.len());
        let levels = energies
            .iter()
            .map(|&energy| {
                let level = self.integrate_level(energy, n_orbits);
                progress.advance(energy);
                level
            })
            .collect::<Result<Vec<_>, _>>();
        progress.finish();

        Ok(PoincareCollection::new(self.potential.describe(), levels?))
    }

    /// Sweep the energies and orbit count described by `settings`.
    pub fn run_settings(
        &self,
        settings: &SweepSettings,
        progress: &mut dyn Progress,
    ) -> Result<PoincareCollection, SweepError> {
        self.run(&settings.energies(), settings.orbits_per_energy, progress)
    }
}
