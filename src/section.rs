//! Surface of section through `y = 0`.
//!
//! An orbit is integrated with [`Rkf78`] while the trigger `g = y` is watched
//! for upward passes (`vy > 0`). Each pass contributes one `(x, vx)` point to
//! the orbit's [`Section`]. A [`CrossingLimit`] ends the run once the target
//! number of passes has been collected.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IntegrationSettings;
use crate::events::{CrossingLimit, EventConfig, EventDirection, EventFunction, EventResult};
use crate::potential::{EquationsOfMotion, OrbitState, Potential};
use crate::sampling::linspace;
use crate::solver::{IntegrationError, Rkf78, Status, Tolerances};

/// The `y = 0` plane, crossed upwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaneCrossing;

impl PlaneCrossing {
    /// Event settings: rising crossings only.
    pub fn config() -> EventConfig {
        EventConfig {
            direction: EventDirection::Rising,
            ..Default::default()
        }
    }
}

impl EventFunction<4> for PlaneCrossing {
    fn eval(&self, _t: f64, y: &OrbitState) -> f64 {
        y[1]
    }
}

/// `(x, vx)` points of one orbit, in crossing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    points: Vec<[f64; 2]>,
}

impl Section {
    /// Section points taken from located plane crossings.
    pub fn from_events(events: &[EventResult<4>]) -> Self {
        Self {
            points: events.iter().map(|e| [e.y[0], e.y[2]]).collect(),
        }
    }

    /// Number of crossings.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// No crossings at all.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(x, vx)` pairs.
    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Positions along the section axis.
    pub fn x(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[0])
    }

    /// Velocities along the section axis.
    pub fn vx(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p[1])
    }
}

/// How an orbit's integration ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrbitStatus {
    /// Ran to the time horizon.
    ReachedHorizon,
    /// Collected the requested number of crossings.
    ReachedCrossingTarget,
    /// Stepping broke down; trajectory and section hold what was computed.
    Failed {
        /// Integrator diagnostic.
        reason: String,
    },
}

impl OrbitStatus {
    /// Whether the orbit failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// One sectioned orbit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Orbit {
    /// Launch state `(x, y, vx, vy)`.
    pub launch: OrbitState,
    /// Positions `(x, y)` on the sampling grid up to termination.
    pub trajectory: Vec<[f64; 2]>,
    /// Upward crossings of `y = 0`.
    pub section: Section,
    /// Why integration ended.
    pub status: OrbitStatus,
    /// Time reached.
    pub t_end: f64,
}

/// Integrates orbits in a fixed potential with fixed settings.
///
/// Holds the shared sampling grid; each call to [`run`](Self::run) owns its
/// own integrator, so one sectioner can serve many threads.
pub struct OrbitSectioner<'a> {
    potential: &'a dyn Potential,
    settings: &'a IntegrationSettings,
    t_eval: Vec<f64>,
}

impl<'a> OrbitSectioner<'a> {
    /// Sectioner for `potential`.
    pub fn new(potential: &'a dyn Potential, settings: &'a IntegrationSettings) -> Self {
        Self {
            potential,
            settings,
            t_eval: linspace(0.0, settings.t_final, settings.n_samples),
        }
    }

    /// Sampling grid shared by every orbit.
    pub fn grid(&self) -> &[f64] {
        &self.t_eval
    }

    /// Integrate one orbit from `launch` and extract its section.
    ///
    /// Returns an error only when the integrator rejects its inputs; a
    /// breakdown mid-run is reported through [`OrbitStatus::Failed`].
    pub fn run(&self, launch: &OrbitState) -> Result<Orbit, IntegrationError> {
        let s = self.settings;
        let mut solver = Rkf78::new(Tolerances::new(s.atol, s.rtol));
        solver.max_steps = s.max_steps;
        solver.max_wall_time = s.max_wall_time();

        let eom = EquationsOfMotion::new(self.potential);
        let mut limit = CrossingLimit::new(s.crossings);
        let sol = solver.solve(
            &eom,
            &PlaneCrossing,
            &PlaneCrossing::config(),
            &mut limit,
            0.0,
            launch,
            s.t_final,
            s.h0,
            &self.t_eval,
        )?;

        let status = match sol.status {
            Status::Completed => OrbitStatus::ReachedHorizon,
            Status::Stopped => OrbitStatus::ReachedCrossingTarget,
            Status::Failed(err) => {
                warn!(x0 = launch[0], t = sol.t_end, %err, "orbit integration failed");
                OrbitStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        debug!(
            x0 = launch[0],
            crossings = sol.events.len(),
            t_end = sol.t_end,
            steps = sol.stats.accepted_steps,
            rejected = sol.stats.rejected_steps,
            ?status,
            "orbit done"
        );

        Ok(Orbit {
            launch: *launch,
            trajectory: sol.y.iter().map(|y| [y[0], y[1]]).collect(),
            section: Section::from_events(&sol.events),
            status,
            t_end: sol.t_end,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::potential::{energy, HarmonicPotential};
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn settings(crossings: Option<usize>, t_final: f64) -> IntegrationSettings {
        IntegrationSettings {
            t_final,
            n_samples: 2001,
            crossings,
            ..Default::default()
        }
    }

    #[test]
    fn plane_trigger_is_y() {
        assert_eq!(PlaneCrossing.eval(3.0, &[1.0, -2.0, 3.0, 4.0]), -2.0);
        assert_eq!(PlaneCrossing::config().direction, EventDirection::Rising);
    }

    #[test]
    fn harmonic_orbit_crosses_once_per_period() {
        // φ = ½ x² + ½ y², period 2π
        let p = HarmonicPotential::new(1.0);
        let s = settings(Some(3), 100.0);
        let sectioner = OrbitSectioner::new(&p, &s);
        let orbit = sectioner.run(&[-0.5, 0.0, 0.0, 1.0]).unwrap();

        assert_eq!(orbit.status, OrbitStatus::ReachedCrossingTarget);
        assert_eq!(orbit.section.len(), 3);
        assert_relative_eq!(orbit.t_end, 6.0 * PI, epsilon = 1e-8);
        for [x, vx] in orbit.section.points() {
            assert_relative_eq!(*x, -0.5, epsilon = 1e-8);
            assert_relative_eq!(*vx, 0.0, epsilon = 1e-8);
        }
        // grid stops at the last crossing
        let dt = 100.0 / 2000.0;
        let expected = (6.0 * PI / dt).floor() as usize + 1;
        assert_eq!(orbit.trajectory.len(), expected);
    }

    #[test]
    fn no_count_mode_spans_the_horizon() {
        let p = HarmonicPotential::new(1.0);
        let s = settings(None, 20.0);
        let orbit = OrbitSectioner::new(&p, &s)
            .run(&[-0.5, 0.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(orbit.status, OrbitStatus::ReachedHorizon);
        assert_eq!(orbit.t_end, 20.0);
        assert_eq!(orbit.trajectory.len(), 2001);
        // 20 / 2π ≈ 3.18 periods
        assert_eq!(orbit.section.len(), 3);
    }

    #[test]
    fn section_points_conserve_energy() {
        let p = HarmonicPotential {
            omega: 0.8,
            center: [0.3, 0.0],
        };
        let launch = [-1.0, 0.0, 0.0, 0.9];
        let e0 = energy(&p, &launch);
        let s = settings(Some(5), 200.0);
        let orbit = OrbitSectioner::new(&p, &s).run(&launch).unwrap();
        assert_eq!(orbit.section.len(), 5);
        for [x, vx] in orbit.section.points() {
            // vy recovered from energy must be real and positive
            let vy2 = 2.0 * (e0 - p.phi([*x, 0.0])) - vx * vx;
            assert!(vy2 > 0.0);
        }
        let xs: Vec<f64> = orbit.section.x().collect();
        let vxs: Vec<f64> = orbit.section.vx().collect();
        assert_eq!(xs.len(), vxs.len());
    }

    #[test]
    fn failure_is_recorded_not_raised() {
        let p = HarmonicPotential::new(1.0);
        let s = IntegrationSettings {
            max_steps: 3,
            ..settings(Some(40), 100.0)
        };
        let orbit = OrbitSectioner::new(&p, &s)
            .run(&[-0.5, 0.0, 0.0, 1.0])
            .unwrap();
        assert!(orbit.status.is_failed());
        assert!(orbit.t_end < 100.0);
    }

    #[test]
    fn invalid_launch_is_an_error() {
        let p = HarmonicPotential::new(1.0);
        let s = settings(Some(1), 10.0);
        let err = OrbitSectioner::new(&p, &s)
            .run(&[f64::NAN, 0.0, 0.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, IntegrationError::InvalidInput { .. }));
    }
}
