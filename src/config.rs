//! Run settings and YAML scenario files.
//!
//! Every settings struct deserializes with `#[serde(default)]`, so a scenario
//! file only needs the keys it changes:
//!
//! ```yaml
//! potential:
//!   type: combined
//!   parts:
//!     - type: logarithmic
//!       v0: 10.0
//!       rc: 1.0
//!       q: 0.8
//!     - type: rotation
//!       omega: 0.3
//! integration:
//!   t_final: 100.0
//!   crossings: 40
//! sweep:
//!   e_min: 30.0
//!   e_max: 200.0
//!   n_energies: 3
//! ```

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SweepError;
use crate::potential::{
    CombinedPotential, HarmonicPotential, HomospherePotential, LogarithmicPotential, Potential,
    RotatingFrame,
};

/// Per-orbit integration settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationSettings {
    /// Upper bound on the integration time.
    pub t_final: f64,
    /// Points of the dense trajectory grid spanning `[0, t_final]`.
    pub n_samples: usize,
    /// Stop after this many upward crossings; `None` always runs to `t_final`.
    pub crossings: Option<usize>,
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Initial step.
    pub h0: f64,
    /// Attempted-step budget per orbit.
    pub max_steps: u64,
    /// Wall-clock budget per orbit in seconds.
    pub max_wall_time_secs: Option<f64>,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            t_final: 100.0,
            n_samples: 20_000,
            crossings: Some(40),
            rtol: 1e-10,
            atol: 1e-12,
            h0: 1e-3,
            max_steps: 10_000_000,
            max_wall_time_secs: None,
        }
    }
}

impl IntegrationSettings {
    /// Wall-clock budget as a [`Duration`].
    pub fn max_wall_time(&self) -> Option<Duration> {
        self.max_wall_time_secs.map(Duration::from_secs_f64)
    }

    /// Reject settings the integrator cannot run with.
    pub fn validate(&self) -> Result<(), SweepError> {
        let invalid = |message: String| Err(SweepError::InvalidSettings { message });
        if !(self.t_final.is_finite() && self.t_final > 0.0) {
            return invalid(format!("t_final must be positive, got {}", self.t_final));
        }
        if self.n_samples == 0 {
            return invalid("n_samples must be at least 1".into());
        }
        if self.crossings == Some(0) {
            return invalid("crossing target must be at least 1 (use no-count mode instead)".into());
        }
        if !(self.atol > 0.0 && self.atol.is_finite() && self.rtol >= 0.0 && self.rtol.is_finite()) {
            return invalid(format!(
                "atol must be positive and rtol non-negative (atol = {}, rtol = {})",
                self.atol, self.rtol
            ));
        }
        if !(self.h0.is_finite() && self.h0 > 0.0) {
            return invalid(format!("h0 must be positive, got {}", self.h0));
        }
        if let Some(secs) = self.max_wall_time_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return invalid(format!("max_wall_time_secs must be positive, got {secs}"));
            }
        }
        Ok(())
    }
}

/// Turning-point search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurningPointSettings {
    /// Newton seeds for the lower and upper turning point.
    pub seeds: (f64, f64),
    /// Factor applied to both roots to stay inside the allowed region.
    pub safety_factor: f64,
    /// Roots larger than this in magnitude are treated as divergence.
    pub divergence_threshold: f64,
    /// Step-size convergence tolerance.
    pub tol: f64,
    /// Newton iteration cap.
    pub max_iter: usize,
}

impl Default for TurningPointSettings {
    fn default() -> Self {
        Self {
            seeds: (-1.0, 1.0),
            safety_factor: 0.999,
            divergence_threshold: 1e5,
            tol: 1.48e-8,
            max_iter: 50,
        }
    }
}

/// Energy sweep settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Lowest energy.
    pub e_min: f64,
    /// Highest energy.
    pub e_max: f64,
    /// Number of evenly spaced energies in `[e_min, e_max]`.
    pub n_energies: usize,
    /// Orbits launched per energy.
    pub orbits_per_energy: usize,
    /// Integrate the orbits of one energy on the rayon pool.
    pub parallel: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            e_min: 30.0,
            e_max: 200.0,
            n_energies: 3,
            orbits_per_energy: 11,
            parallel: false,
        }
    }
}

impl SweepSettings {
    /// The energies to sweep.
    pub fn energies(&self) -> Vec<f64> {
        crate::sampling::linspace(self.e_min, self.e_max, self.n_energies)
    }
}

/// Serializable description of a potential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PotentialConfig {
    /// [`HarmonicPotential`].
    Harmonic {
        /// Angular frequency.
        omega: f64,
        /// Centre.
        #[serde(default)]
        center: [f64; 2],
    },
    /// [`LogarithmicPotential`].
    Logarithmic {
        /// Circular velocity.
        v0: f64,
        /// Core radius.
        rc: f64,
        /// Flattening.
        q: f64,
        /// Centre.
        #[serde(default)]
        center: [f64; 2],
    },
    /// [`HomospherePotential`].
    Homosphere {
        /// Radius.
        a: f64,
        /// Mass.
        mass: f64,
        /// Centre.
        #[serde(default)]
        center: [f64; 2],
    },
    /// [`RotatingFrame`].
    Rotation {
        /// Pattern speed.
        omega: f64,
    },
    /// [`CombinedPotential`].
    Combined {
        /// Summed parts.
        parts: Vec<PotentialConfig>,
    },
}

impl Default for PotentialConfig {
    /// Flattened logarithmic halo seen from a frame rotating at 0.3.
    fn default() -> Self {
        Self::galaxy(10.0, 1.0, 0.8, 0.3)
    }
}

impl PotentialConfig {
    /// Logarithmic potential `(v0, rc, q)` in a frame rotating at `omega`.
    pub fn galaxy(v0: f64, rc: f64, q: f64, omega: f64) -> Self {
        Self::Combined {
            parts: vec![
                Self::Logarithmic {
                    v0,
                    rc,
                    q,
                    center: [0.0, 0.0],
                },
                Self::Rotation { omega },
            ],
        }
    }

    /// Instantiate the potential.
    pub fn build(&self) -> Box<dyn Potential> {
        match self {
            Self::Harmonic { omega, center } => Box::new(HarmonicPotential {
                omega: *omega,
                center: *center,
            }),
            Self::Logarithmic { v0, rc, q, center } => Box::new(LogarithmicPotential {
                v0: *v0,
                rc: *rc,
                q: *q,
                center: *center,
            }),
            Self::Homosphere { a, mass, center } => Box::new(HomospherePotential {
                a: *a,
                mass: *mass,
                center: *center,
            }),
            Self::Rotation { omega } => Box::new(RotatingFrame { omega: *omega }),
            Self::Combined { parts } => Box::new(CombinedPotential::new(
                parts.iter().map(PotentialConfig::build).collect(),
            )),
        }
    }
}

/// A complete run description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Potential to integrate in.
    pub potential: PotentialConfig,
    /// Per-orbit integration.
    pub integration: IntegrationSettings,
    /// Turning-point search.
    pub turning_points: TurningPointSettings,
    /// Energy sweep.
    pub sweep: SweepSettings,
}

impl Scenario {
    /// Parse a scenario from YAML.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_reader(reader)
    }
}
