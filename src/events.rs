//! Event detection during orbit integration.
//!
//! A scalar trigger `g(t, y)` is watched across every accepted step. When it
//! changes sign in the requested direction the crossing time is pinned down
//! with Brent's method and the caller's [`EventHandler`] decides whether the
//! integration keeps going.
//!
//! For surface-of-section work the trigger is a coordinate (`y`), the
//! direction is [`EventDirection::Rising`], and the handler is a
//! [`CrossingLimit`] that stops after a target number of crossings.

use thiserror::Error;

/// Scalar trigger function monitored by the integrator.
///
/// # Example
///
/// ```
/// use poincare_tomography::EventFunction;
///
/// // Fires when the second coordinate passes through zero.
/// struct Plane;
///
/// impl EventFunction<4> for Plane {
///     fn eval(&self, _t: f64, y: &[f64; 4]) -> f64 {
///         y[1]
///     }
/// }
/// ```
pub trait EventFunction<const N: usize> {
    /// Value of the trigger at `(t, y)`. An event is a zero crossing.
    fn eval(&self, t: f64, y: &[f64; N]) -> f64;
}

/// Direction of zero crossing that counts as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDirection {
    /// `g` goes from negative to positive.
    Rising,
    /// `g` goes from positive to negative.
    Falling,
    /// Either direction.
    #[default]
    Any,
}

/// Signal returned by an [`EventHandler`] after each recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventAction {
    /// Terminate integration at this event.
    Stop,
    /// Keep the event and carry on.
    #[default]
    Continue,
}

/// Root-location settings for event detection.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Which crossings register.
    pub direction: EventDirection,
    /// Tolerance on the event time (default: 1e-12)
    pub root_tol: f64,
    /// Iteration cap for Brent's method (default: 50)
    pub max_iter: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            direction: EventDirection::Any,
            root_tol: 1e-12,
            max_iter: 50,
        }
    }
}

/// A located event.
#[derive(Debug, Clone)]
pub struct EventResult<const N: usize> {
    /// Event time.
    pub t: f64,
    /// State at the event time.
    pub y: [f64; N],
    /// Trigger value at the event (close to zero).
    pub g_value: f64,
    /// Brent iterations spent locating it.
    pub iterations: usize,
}

/// Stateful callback consulted at every detected event.
///
/// Early termination is driven entirely by the return value; the integrator
/// never unwinds to stop.
pub trait EventHandler<const N: usize> {
    /// Called once per event, in time order.
    fn on_event(&mut self, event: &EventResult<N>) -> EventAction;
}

impl<const N: usize, F> EventHandler<N> for F
where
    F: FnMut(&EventResult<N>) -> EventAction,
{
    fn on_event(&mut self, event: &EventResult<N>) -> EventAction {
        self(event)
    }
}

/// Stops after `target` events, or never when `target` is `None`.
#[derive(Debug, Clone, Default)]
pub struct CrossingLimit {
    target: Option<usize>,
    seen: usize,
}

impl CrossingLimit {
    /// Limit to `target` events; `None` counts without ever stopping.
    pub fn new(target: Option<usize>) -> Self {
        Self { target, seen: 0 }
    }

    /// Events seen so far.
    pub fn seen(&self) -> usize {
        self.seen
    }

    /// Whether the target has been reached.
    pub fn reached(&self) -> bool {
        matches!(self.target, Some(k) if self.seen >= k)
    }
}

impl<const N: usize> EventHandler<N> for CrossingLimit {
    fn on_event(&mut self, _event: &EventResult<N>) -> EventAction {
        self.seen += 1;
        if self.reached() {
            EventAction::Stop
        } else {
            EventAction::Continue
        }
    }
}

/// Brent's bracketing root finder (inverse quadratic interpolation, secant
/// and bisection).
///
/// Reference: R.P. Brent, "Algorithms for Minimization without Derivatives",
/// Prentice-Hall, 1973.
#[derive(Debug, Clone)]
pub struct BrentSolver {
    /// Convergence tolerance on the bracket width.
    pub tol: f64,
    /// Iteration cap.
    pub max_iter: usize,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 50,
        }
    }
}

impl BrentSolver {
    /// Solver with the given tolerance and iteration cap.
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self { tol, max_iter }
    }

    /// Root of `f` inside `[a, b]`.
    ///
    /// `fa` and `fb` may be passed in when already known. Returns
    /// `(root, f(root), iterations)`.
    pub fn find_root<F>(
        &self,
        mut f: F,
        a: f64,
        b: f64,
        fa: Option<f64>,
        fb: Option<f64>,
    ) -> Result<(f64, f64, usize), BrentError>
    where
        F: FnMut(f64) -> f64,
    {
        let (mut lo, mut hi) = (a, b);
        let mut f_lo = fa.unwrap_or_else(|| f(lo));
        let mut f_hi = fb.unwrap_or_else(|| f(hi));

        if f_lo * f_hi > 0.0 {
            return Err(BrentError::NotBracketed {
                a,
                b,
                fa: f_lo,
                fb: f_hi,
            });
        }

        // `hi` always holds the best estimate, `prev` the last one.
        if f_lo.abs() < f_hi.abs() {
            std::mem::swap(&mut lo, &mut hi);
            std::mem::swap(&mut f_lo, &mut f_hi);
        }
        let mut prev = lo;
        let mut f_prev = f_lo;
        let mut older = hi - lo;
        let mut bisected = true;

        for iter in 0..self.max_iter {
            if f_lo.abs() < f_hi.abs() {
                std::mem::swap(&mut lo, &mut hi);
                std::mem::swap(&mut f_lo, &mut f_hi);
            }

            if f_hi == 0.0 || (hi - lo).abs() <= self.tol {
                return Ok((hi, f_hi, iter + 1));
            }

            let candidate = if f_lo != f_prev && f_hi != f_prev && f_lo != f_hi {
                lo * f_hi * f_prev / ((f_lo - f_hi) * (f_lo - f_prev))
                    + hi * f_lo * f_prev / ((f_hi - f_lo) * (f_hi - f_prev))
                    + prev * f_lo * f_hi / ((f_prev - f_lo) * (f_prev - f_hi))
            } else if f_hi != f_lo {
                hi - f_hi * (hi - lo) / (f_hi - f_lo)
            } else {
                0.5 * (lo + hi)
            };

            let step = (candidate - hi).abs();
            let reject = (candidate - (3.0 * lo + hi) / 4.0) * (candidate - hi) > 0.0
                || (bisected && step >= (hi - prev).abs() / 2.0)
                || (!bisected && step >= (prev - older).abs() / 2.0)
                || (bisected && (hi - prev).abs() < self.tol)
                || (!bisected && (prev - older).abs() < self.tol);

            let s = if reject { 0.5 * (lo + hi) } else { candidate };
            bisected = reject;

            let fs = f(s);
            older = prev;
            prev = hi;
            f_prev = f_hi;

            if f_lo * fs < 0.0 {
                hi = s;
                f_hi = fs;
            } else {
                lo = s;
                f_lo = fs;
            }
        }

        Err(BrentError::MaxIterations {
            current_best: hi,
            f_value: f_hi,
            iterations: self.max_iter,
        })
    }
}

/// Failures of [`BrentSolver::find_root`].
#[derive(Debug, Clone, Error)]
pub enum BrentError {
    /// Both endpoints have the same sign.
    #[error("root not bracketed: f({a}) = {fa}, f({b}) = {fb}")]
    NotBracketed {
        /// Left endpoint
        a: f64,
        /// Right endpoint
        b: f64,
        /// f at the left endpoint
        fa: f64,
        /// f at the right endpoint
        fb: f64,
    },
    /// Ran out of iterations.
    #[error("no convergence after {iterations} iterations, best estimate {current_best} (f = {f_value})")]
    MaxIterations {
        /// Best estimate
        current_best: f64,
        /// f at the best estimate
        f_value: f64,
        /// Iterations performed
        iterations: usize,
    },
}

/// Whether `g_old -> g_new` is a crossing in `direction`.
///
/// Landing exactly on zero counts when the approach side matches the
/// direction. Leaving zero never counts, so a trajectory launched on the
/// trigger surface does not register at `t0`, and a crossing that lands
/// on zero is not counted twice.
pub fn sign_change_detected(g_old: f64, g_new: f64, direction: EventDirection) -> bool {
    if g_old == 0.0 || g_old * g_new > 0.0 {
        return false;
    }
    match direction {
        EventDirection::Rising => g_old < 0.0,
        EventDirection::Falling => g_old > 0.0,
        EventDirection::Any => true,
    }
}
