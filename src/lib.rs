//! # Poincaré tomography
//!
//! Surface-of-section maps of test-particle orbits in planar potentials,
//! swept over a range of energies.
//!
//! ## Pipeline
//!
//! For each energy `E` of a sweep:
//!
//! 1. [`find_turning_points`] solves `E - φ(x, 0) = 0` by Newton's method on
//!    both sides of the origin and pulls the roots slightly inwards.
//! 2. [`launch_states`] spreads launch points evenly between them, each on
//!    `y = 0` with `vx = 0` and `vy = sqrt(2 (E - φ))`.
//! 3. [`OrbitSectioner`] integrates every launch with the RKF7(8) pair in
//!    [`Rkf78`], records upward crossings of `y = 0` as `(x, vx)` points and
//!    stops after the requested number of crossings (or at the horizon in
//!    no-count mode).
//! 4. [`EnergySweep`] gathers the levels into a [`PoincareCollection`], which
//!    can be saved, reloaded and exported to CSV.
//!
//! ## Basic usage
//!
//! ```rust
//! use poincare_tomography::{
//!     EnergySweep, HarmonicPotential, IntegrationSettings, OrbitStatus, Silent,
//! };
//!
//! // φ = x² + y²
//! let potential = HarmonicPotential::new(2.0_f64.sqrt());
//! let sweep = EnergySweep::new(&potential).with_integration(IntegrationSettings {
//!     t_final: 100.0,
//!     n_samples: 1000,
//!     crossings: Some(4),
//!     ..Default::default()
//! });
//!
//! let collection = sweep.run(&[2.0], 1, &mut Silent).unwrap();
//! let orbit = &collection.orbits(0).unwrap()[0];
//! assert_eq!(orbit.status, OrbitStatus::ReachedCrossingTarget);
//! assert_eq!(orbit.section.len(), 4);
//! ```
//!
//! ## Integrator
//!
//! The engine underneath is a general fixed-size RKF7(8) integrator with
//! event detection, usable on its own:
//!
//! ```rust
//! use poincare_tomography::{
//!     CrossingLimit, EventConfig, EventDirection, EventFunction, OdeSystem, Rkf78, Status,
//!     Tolerances,
//! };
//!
//! struct Oscillator;
//!
//! impl OdeSystem<2> for Oscillator {
//!     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
//!         dydt[0] = y[1];
//!         dydt[1] = -y[0];
//!     }
//! }
//!
//! struct Position;
//!
//! impl EventFunction<2> for Position {
//!     fn eval(&self, _t: f64, y: &[f64; 2]) -> f64 {
//!         y[0]
//!     }
//! }
//!
//! let config = EventConfig {
//!     direction: EventDirection::Rising,
//!     ..Default::default()
//! };
//! let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
//! let mut limit = CrossingLimit::new(Some(2));
//! let sol = solver
//!     .solve(&Oscillator, &Position, &config, &mut limit, 0.0, &[0.0, -1.0], 100.0, 0.1, &[])
//!     .unwrap();
//!
//! // x = -sin t rises through zero at t = π and t = 3π
//! assert_eq!(sol.status, Status::Stopped);
//! assert!((sol.t_end - 3.0 * std::f64::consts::PI).abs() < 1e-9);
//! ```
//!
//! ## References
//!
//! 1. Fehlberg, E. (1968). "Classical Fifth-, Sixth-, Seventh-, and
//!    Eighth-Order Runge-Kutta Formulas with Stepsize Control".
//!    NASA TR R-287.
//!
//! 2. Brent, R.P. (1973). "Algorithms for Minimization without
//!    Derivatives". Prentice-Hall.
//!
//! 3. Binney, J. & Tremaine, S. (2008). "Galactic Dynamics", 2nd ed.,
//!    §3.2 (surfaces of section). Princeton University Press.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod coefficients;
pub mod config;
pub mod error;
pub mod events;
pub mod potential;
pub mod progress;
pub mod sampling;
pub mod section;
pub mod solver;
pub mod store;
pub mod sweep;
pub mod turning;

pub use config::{
    IntegrationSettings, PotentialConfig, Scenario, SweepSettings, TurningPointSettings,
};
pub use error::SweepError;
pub use events::{
    BrentError, BrentSolver, CrossingLimit, EventAction, EventConfig, EventDirection,
    EventFunction, EventHandler, EventResult,
};
pub use potential::{
    CombinedPotential, EquationsOfMotion, HarmonicPotential, HomospherePotential,
    LogarithmicPotential, OrbitState, Potential, RotatingFrame,
};
#[cfg(feature = "progress")]
pub use progress::ProgressBar;
pub use progress::{Progress, Silent};
pub use sampling::{launch_states, linspace};
pub use section::{Orbit, OrbitSectioner, OrbitStatus, PlaneCrossing, Section};
pub use solver::{
    IntegrationError, OdeSystem, Rkf78, Solution, Stats, Status, StepController, StepResult,
    Tolerances,
};
pub use store::{write_sections_csv, StoreError};
pub use sweep::{EnergyLevel, EnergySweep, PoincareCollection};
pub use turning::{find_turning_points, TurningPointError, TurningPoints};
