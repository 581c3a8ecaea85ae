//! Adaptive Runge-Kutta-Fehlberg 7(8) integrator with dense output and
//! repeated event detection.
//!
//! A single call to [`Rkf78::solve`] advances `dy/dt = f(t, y)` from `t0`
//! towards `tf`, samples the trajectory on a caller-supplied time grid,
//! records every qualifying event and stops early as soon as the
//! [`EventHandler`] asks it to.
//!
//! Reference: NASA TR R-287, Erwin Fehlberg, 1968

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::trace;

use crate::coefficients::{A, B, B_ERR, C, STAGES};
use crate::events::{
    sign_change_detected, BrentError, BrentSolver, EventAction, EventConfig, EventFunction,
    EventHandler, EventResult,
};

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side into `dydt`.
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Outcome of a single trial step.
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// 8th order state at `t`
    pub y: [f64; N],
    /// Time at the end of the step
    pub t: f64,
    /// Normalized error estimate (≤ 1.0 means accepted)
    pub error: f64,
    /// Suggested magnitude of the next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Right-hand side evaluations
    pub fn_evals: u64,
    /// Accepted steps
    pub accepted_steps: u64,
    /// Rejected steps
    pub rejected_steps: u64,
}

/// I-controller for the step size: `h_new = safety * h * error^(-1/8)`.
#[derive(Debug, Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Largest growth per step
    pub max_factor: f64,
    /// Largest shrink per step
    pub min_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 5.0,
            min_factor: 0.2,
            exponent: 1.0 / 8.0,
        }
    }
}

impl StepController {
    /// Step size adjustment factor for a normalized error.
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }
}

/// Error control: `|y8 - y7| / (atol + rtol * |y8|)` per component.
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Same tolerances for every component.
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Per-component tolerances.
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// How a [`Rkf78::solve`] run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    /// Reached the final time.
    Completed,
    /// The event handler asked to stop.
    Stopped,
    /// Stepping broke down; the samples and events gathered before the
    /// failure are kept.
    Failed(IntegrationError),
}

/// Dense trajectory, events and terminal status of one run.
#[derive(Debug, Clone)]
pub struct Solution<const N: usize> {
    /// Sample times: the requested grid up to termination, or every accepted
    /// step when no grid was given.
    pub t: Vec<f64>,
    /// States at `t`.
    pub y: Vec<[f64; N]>,
    /// Events in time order.
    pub events: Vec<EventResult<N>>,
    /// Why integration ended.
    pub status: Status,
    /// Time reached.
    pub t_end: f64,
    /// State at `t_end`.
    pub y_end: [f64; N],
    /// Work done during this run.
    pub stats: Stats,
}

impl<const N: usize> Solution<N> {
    fn start(t0: f64, y0: &[f64; N], capacity: usize) -> Self {
        Self {
            t: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            events: Vec::new(),
            status: Status::Completed,
            t_end: t0,
            y_end: *y0,
            stats: Stats::default(),
        }
    }

    fn push(&mut self, t: f64, y: [f64; N]) {
        self.t.push(t);
        self.y.push(y);
    }

    /// Whether the run ended without a stepping failure.
    pub fn success(&self) -> bool {
        !matches!(self.status, Status::Failed(_))
    }
}

/// One accepted step with its end-point derivatives, enough for cubic
/// Hermite interpolation inside the step.
struct Segment<const N: usize> {
    t_a: f64,
    y_a: [f64; N],
    f_a: [f64; N],
    t_b: f64,
    y_b: [f64; N],
    f_b: [f64; N],
}

impl<const N: usize> Segment<N> {
    /// O(h⁴) state at `t ∈ [t_a, t_b]`.
    fn interpolate(&self, t: f64) -> [f64; N] {
        let dt = self.t_b - self.t_a;
        let s = (t - self.t_a) / dt;
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 1.0 - 3.0 * s2 + 2.0 * s3;
        let h10 = s - 2.0 * s2 + s3;
        let h01 = 3.0 * s2 - 2.0 * s3;
        let h11 = s3 - s2;

        let mut y = [0.0; N];
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = h00 * self.y_a[i]
                + h10 * dt * self.f_a[i]
                + h01 * self.y_b[i]
                + h11 * dt * self.f_b[i];
        }
        y
    }
}

/// Trigger that never fires, for plain propagation.
struct Never;

impl<const N: usize> EventFunction<N> for Never {
    fn eval(&self, _t: f64, _y: &[f64; N]) -> f64 {
        1.0
    }
}

/// Runge-Kutta-Fehlberg 7(8) integrator
///
/// # Example
/// ```
/// use poincare_tomography::{OdeSystem, Rkf78, Tolerances};
///
/// struct Oscillator;
///
/// impl OdeSystem<2> for Oscillator {
///     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
///         dydt[0] = y[1];
///         dydt[1] = -y[0];
///     }
/// }
///
/// let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-12));
/// let sol = solver
///     .propagate(&Oscillator, 0.0, &[1.0, 0.0], std::f64::consts::TAU, 0.1, &[])
///     .unwrap();
/// assert!((sol.y_end[0] - 1.0).abs() < 1e-9);
/// ```
#[derive(Clone)]
pub struct Rkf78<const N: usize> {
    tol: Tolerances<N>,
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Step budget per run
    pub max_steps: u64,
    /// Wall-clock budget per run
    pub max_wall_time: Option<Duration>,
    k: [[f64; N]; STAGES],
    /// Statistics of the last run
    pub stats: Stats,
}

impl<const N: usize> Rkf78<N> {
    /// Solver with the given tolerances and default limits.
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 10_000_000,
            max_wall_time: None,
            k: [[0.0; N]; STAGES],
            stats: Stats::default(),
        }
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Trial step of size `h` from `(t, y)`.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let mut dydt = [0.0; N];
        sys.rhs(t, y, &mut dydt);
        self.stats.fn_evals += 1;
        self.step_from(sys, t, y, &dydt, h)
    }

    /// Trial step reusing a known `f(t, y)` as the first stage.
    fn step_from<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        dydt: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let h = h.clamp(self.h_min, self.h_max);

        self.compute_stages(sys, t, y, dydt, h);
        let y8 = self.compute_solution(y, h);
        let error = self.compute_error(&y8, h);
        let accepted = error <= 1.0;
        let h_next = (h * self.controller.compute_factor(error)).clamp(self.h_min, self.h_max);

        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        StepResult {
            y: y8,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    /// 8th order state after a step of exactly `h`, without error control.
    ///
    /// Only used for sub-steps of an already accepted step, which keeps the
    /// local error within tolerance.
    fn advance_exact<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        dydt: &[f64; N],
        h: f64,
    ) -> [f64; N] {
        self.compute_stages(sys, t, y, dydt, h);
        self.compute_solution(y, h)
    }

    /// Stages 1..13 into the workspace; stage 0 is the supplied derivative.
    #[allow(clippy::needless_range_loop)]
    fn compute_stages<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        dydt: &[f64; N],
        h: f64,
    ) {
        let mut y_temp = [0.0; N];
        self.k[0] = *dydt;

        for i in 1..STAGES {
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }
            sys.rhs(t + C[i] * h, &y_temp, &mut self.k[i]);
        }
        self.stats.fn_evals += (STAGES - 1) as u64;
    }

    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];
        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..STAGES {
                sum += B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }
        y_new
    }

    /// Infinity norm of the scaled error estimate.
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y8: &[f64; N], h: f64) -> f64 {
        let mut max_err: f64 = 0.0;
        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..STAGES {
                err_n += B_ERR[i] * self.k[i][n];
            }
            let scale = self.tol.atol[n] + self.tol.rtol[n] * y8[n].abs();
            max_err = max_err.max((h * err_n).abs() / scale);
        }
        max_err
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        t_eval: &[f64],
    ) -> Result<(), IntegrationError> {
        let invalid = |message: String| Err(IntegrationError::InvalidInput { message });

        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return invalid("t0, tf and h0 must be finite".to_string());
        }
        if tf < t0 {
            return invalid(format!("tf = {tf} precedes t0 = {t0}"));
        }
        if h0 <= 0.0 {
            return invalid(format!("h0 = {h0} must be positive"));
        }
        if let Some(i) = y0.iter().position(|v| !v.is_finite()) {
            return invalid(format!("y0[{i}] is not finite"));
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return invalid(format!("atol[{i}] must be positive and finite"));
            }
            if !r.is_finite() || r < 0.0 {
                return invalid(format!("rtol[{i}] must be non-negative and finite"));
            }
        }
        if t_eval.iter().any(|&te| !(t0..=tf).contains(&te)) {
            return invalid(format!("t_eval must lie within [{t0}, {tf}]"));
        }
        if t_eval.windows(2).any(|w| w[1] < w[0]) {
            return invalid("t_eval must be sorted in increasing order".to_string());
        }
        Ok(())
    }

    /// Integrate from `t0` to `tf` without events.
    ///
    /// See [`solve`](Self::solve) for the meaning of `t_eval`.
    pub fn propagate<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        t_eval: &[f64],
    ) -> Result<Solution<N>, IntegrationError> {
        let mut ignore = |_: &EventResult<N>| EventAction::Continue;
        self.solve(
            sys,
            &Never,
            &EventConfig::default(),
            &mut ignore,
            t0,
            y0,
            tf,
            h0,
            t_eval,
        )
    }

    /// Integrate from `t0` towards `tf`, recording events of `event`.
    ///
    /// Every crossing that passes the direction filter in `config` is located,
    /// appended to [`Solution::events`] and handed to `handler`; integration
    /// ends at that event when the handler returns [`EventAction::Stop`].
    ///
    /// The trajectory is sampled at the times in `t_eval` (sorted, within
    /// `[t0, tf]`) by cubic Hermite interpolation across each accepted step.
    /// Grid points past the termination time are not produced. With an empty
    /// `t_eval` every accepted step is recorded instead.
    ///
    /// Invalid inputs are rejected with an error before any stepping. Failures
    /// during stepping are reported through [`Status::Failed`] so the partial
    /// trajectory stays available.
    #[allow(clippy::too_many_arguments)]
    pub fn solve<S, E, H>(
        &mut self,
        sys: &S,
        event: &E,
        config: &EventConfig,
        handler: &mut H,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
        t_eval: &[f64],
    ) -> Result<Solution<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        E: EventFunction<N>,
        H: EventHandler<N>,
    {
        self.validate_inputs(t0, y0, tf, h0, t_eval)?;
        self.reset_stats();

        let mut sol = Solution::start(t0, y0, t_eval.len().max(64));
        let mut grid = t_eval.iter().copied().peekable();
        if t_eval.is_empty() {
            sol.push(t0, *y0);
        }
        while let Some(te) = grid.next_if(|&te| te <= t0) {
            sol.push(te, *y0);
        }

        let mut t = t0;
        let mut y = *y0;
        let mut dydt = [0.0; N];
        sys.rhs(t, &y, &mut dydt);
        self.stats.fn_evals += 1;

        let mut h = h0.min(tf - t0);
        let mut g_prev = event.eval(t, &y);
        let started = Instant::now();
        let mut step_count = 0u64;

        let status = loop {
            if tf - t <= self.h_min {
                break Status::Completed;
            }
            h = h.min(self.h_max);
            let last_step = t + h >= tf;
            if last_step {
                h = tf - t;
            }

            let mut result = self.step_from(sys, t, &y, &dydt, h);
            step_count += 1;
            if last_step && result.accepted {
                result.t = tf;
            }

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    break Status::Failed(IntegrationError::NonFiniteState { t: result.t });
                }
                let mut f_new = [0.0; N];
                sys.rhs(result.t, &result.y, &mut f_new);
                self.stats.fn_evals += 1;

                let segment = Segment {
                    t_a: t,
                    y_a: y,
                    f_a: dydt,
                    t_b: result.t,
                    y_b: result.y,
                    f_b: f_new,
                };
                let g_new = event.eval(result.t, &result.y);

                if sign_change_detected(g_prev, g_new, config.direction) {
                    let found = match self.locate_event(sys, event, config, &segment, g_prev, g_new)
                    {
                        Ok(found) => found,
                        Err(err) => break Status::Failed(err),
                    };
                    let action = handler.on_event(&found);
                    if action == EventAction::Stop {
                        if t_eval.is_empty() {
                            sol.push(found.t, found.y);
                        } else {
                            emit_samples(&mut sol, &mut grid, false, &segment, found.t);
                        }
                        t = found.t;
                        y = found.y;
                        sol.events.push(found);
                        break Status::Stopped;
                    }
                    sol.events.push(found);
                }

                emit_samples(&mut sol, &mut grid, t_eval.is_empty(), &segment, segment.t_b);
                t = result.t;
                y = result.y;
                dydt = f_new;
                g_prev = g_new;
            }

            h = result.h_next;

            if step_count > self.max_steps {
                break Status::Failed(IntegrationError::MaxStepsExceeded { t });
            }
            if !result.accepted && result.h_next <= self.h_min && tf - t > self.h_min {
                break Status::Failed(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
            if let Some(budget) = self.max_wall_time {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    break Status::Failed(IntegrationError::WallClockExceeded { t, elapsed });
                }
            }
        };

        sol.status = status;
        sol.t_end = t;
        sol.y_end = y;
        sol.stats = self.stats.clone();
        trace!(
            t_end = t,
            accepted = self.stats.accepted_steps,
            rejected = self.stats.rejected_steps,
            fn_evals = self.stats.fn_evals,
            "integration finished"
        );
        Ok(sol)
    }

    /// Pin down the crossing inside an accepted step.
    ///
    /// Brent's method runs on the exact sub-step map `τ -> Φ(t_a, τ)`, so the
    /// event time and state carry the integrator's own accuracy rather than
    /// the interpolant's.
    fn locate_event<S, E>(
        &mut self,
        sys: &S,
        event: &E,
        config: &EventConfig,
        segment: &Segment<N>,
        g_a: f64,
        g_b: f64,
    ) -> Result<EventResult<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        E: EventFunction<N>,
    {
        let brent = BrentSolver::new(config.root_tol, config.max_iter);
        let (t_a, t_b) = (segment.t_a, segment.t_b);

        let state_at = |solver: &mut Self, t: f64| -> [f64; N] {
            if t <= t_a {
                segment.y_a
            } else if t >= t_b {
                segment.y_b
            } else {
                solver.advance_exact(sys, t_a, &segment.y_a, &segment.f_a, t - t_a)
            }
        };

        let found = brent.find_root(
            |t| {
                let y = state_at(self, t);
                event.eval(t, &y)
            },
            t_a,
            t_b,
            Some(g_a),
            Some(g_b),
        );

        let (t_event, g_value, iterations) = match found {
            Ok(root) => root,
            Err(BrentError::MaxIterations {
                current_best,
                f_value,
                iterations,
            }) => (current_best, f_value, iterations),
            Err(err @ BrentError::NotBracketed { .. }) => {
                return Err(IntegrationError::EventFindingFailed {
                    message: format!("sign change lost while refining: {err}"),
                });
            }
        };

        Ok(EventResult {
            t: t_event,
            y: state_at(self, t_event),
            g_value,
            iterations,
        })
    }
}

/// Append samples up to `t_limit` from one accepted step.
fn emit_samples<const N: usize, I>(
    sol: &mut Solution<N>,
    grid: &mut std::iter::Peekable<I>,
    every_step: bool,
    segment: &Segment<N>,
    t_limit: f64,
) where
    I: Iterator<Item = f64>,
{
    if every_step {
        sol.push(segment.t_b, segment.y_b);
        return;
    }
    while let Some(te) = grid.next_if(|&te| te <= t_limit) {
        let y = if te >= segment.t_b {
            segment.y_b
        } else {
            segment.interpolate(te)
        };
        sol.push(te, y);
    }
}

/// Errors that can occur during integration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    /// Step size collapsed below the minimum.
    #[error("step size {h} too small at t = {t}")]
    StepSizeTooSmall {
        /// Time at which it happened
        t: f64,
        /// Offending step size
        h: f64,
    },
    /// Step budget exhausted.
    #[error("maximum number of integration steps exceeded at t = {t}")]
    MaxStepsExceeded {
        /// Time reached
        t: f64,
    },
    /// Wall-clock budget exhausted.
    #[error("wall-clock budget exceeded after {elapsed:?} at t = {t}")]
    WallClockExceeded {
        /// Time reached
        t: f64,
        /// Time spent
        elapsed: Duration,
    },
    /// An event could not be located.
    #[error("event finding failed: {message}")]
    EventFindingFailed {
        /// Description of the failure
        message: String,
    },
    /// Rejected before stepping.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// NaN or infinity in the state.
    #[error("non-finite state detected at t = {t}")]
    NonFiniteState {
        /// Time at which it was detected
        t: f64,
    },
}
