//! Planar gravitational potentials.
//!
//! Every model implements [`Potential`]: a scalar field `φ(x, y)`, the
//! acceleration acting on a particle with phase-space state
//! `(x, y, vx, vy)`, the admissible energy range and a description string.
//! The acceleration takes the whole state so that velocity-dependent
//! (rotating-frame) terms fit the same interface.
//!
//! Models compose through [`CombinedPotential`], which sums the fields of its
//! parts. [`EquationsOfMotion`] turns any potential into the first-order
//! system integrated by [`Rkf78`](crate::Rkf78).

use crate::solver::OdeSystem;

/// Phase-space state `[x, y, vx, vy]`.
pub type OrbitState = [f64; 4];

/// A planar potential field acting on a test particle.
pub trait Potential: Send + Sync {
    /// Potential energy per unit mass at `[x, y]`.
    fn phi(&self, position: [f64; 2]) -> f64;

    /// Acceleration `[ax, ay]` for the phase-space state `[x, y, vx, vy]`.
    fn accel(&self, state: &OrbitState) -> [f64; 2];

    /// Open interval `(min, max)` of energies with bound, non-trivial orbits.
    fn energy_range(&self) -> (f64, f64);

    /// Human-readable description of the model and its parameters.
    fn describe(&self) -> String;
}

impl<P: Potential + ?Sized> Potential for Box<P> {
    fn phi(&self, position: [f64; 2]) -> f64 {
        (**self).phi(position)
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        (**self).accel(state)
    }

    fn energy_range(&self) -> (f64, f64) {
        (**self).energy_range()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Isotropic harmonic oscillator, `φ = ½ ω² |r - c|²`.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicPotential {
    /// Angular frequency.
    pub omega: f64,
    /// Centre of the well.
    pub center: [f64; 2],
}

impl HarmonicPotential {
    /// Well of frequency `omega` at the origin.
    pub fn new(omega: f64) -> Self {
        Self {
            omega,
            center: [0.0, 0.0],
        }
    }
}

impl Potential for HarmonicPotential {
    fn phi(&self, [x, y]: [f64; 2]) -> f64 {
        let (dx, dy) = (x - self.center[0], y - self.center[1]);
        0.5 * self.omega * self.omega * (dx * dx + dy * dy)
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        let w2 = self.omega * self.omega;
        [
            -w2 * (state[0] - self.center[0]),
            -w2 * (state[1] - self.center[1]),
        ]
    }

    fn energy_range(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn describe(&self) -> String {
        format!(
            "Harmonic potential: omega = {}, center = ({}, {})",
            self.omega, self.center[0], self.center[1]
        )
    }
}

/// Flattened logarithmic potential,
/// `φ = ½ v0² ln(rc² + Δx² + Δy²/q²)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogarithmicPotential {
    /// Asymptotic circular velocity.
    pub v0: f64,
    /// Core radius.
    pub rc: f64,
    /// Flattening along y.
    pub q: f64,
    /// Centre of the potential.
    pub center: [f64; 2],
}

impl Default for LogarithmicPotential {
    fn default() -> Self {
        Self {
            v0: 10.0,
            rc: 1.0,
            q: 0.8,
            center: [0.0, 0.0],
        }
    }
}

impl LogarithmicPotential {
    fn core(&self, dx: f64, dy: f64) -> f64 {
        self.rc * self.rc + dx * dx + dy * dy / (self.q * self.q)
    }
}

impl Potential for LogarithmicPotential {
    fn phi(&self, [x, y]: [f64; 2]) -> f64 {
        let d = self.core(x - self.center[0], y - self.center[1]);
        0.5 * self.v0 * self.v0 * d.ln()
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        let (dx, dy) = (state[0] - self.center[0], state[1] - self.center[1]);
        let scale = -self.v0 * self.v0 / self.core(dx, dy);
        [scale * dx, scale * dy / (self.q * self.q)]
    }

    fn energy_range(&self) -> (f64, f64) {
        (self.phi(self.center), f64::INFINITY)
    }

    fn describe(&self) -> String {
        format!(
            "Logarithmic potential: v0 = {}, rc = {}, q = {}, center = ({}, {})",
            self.v0, self.rc, self.q, self.center[0], self.center[1]
        )
    }
}

/// Homogeneous sphere of radius `a` and mass `mass` (G = 1).
///
/// Harmonic inside the sphere, Keplerian outside.
#[derive(Debug, Clone, PartialEq)]
pub struct HomospherePotential {
    /// Sphere radius.
    pub a: f64,
    /// Total mass.
    pub mass: f64,
    /// Centre of the sphere.
    pub center: [f64; 2],
}

impl Default for HomospherePotential {
    fn default() -> Self {
        Self {
            a: 5.0,
            mass: 1000.0,
            center: [0.0, 0.0],
        }
    }
}

impl Potential for HomospherePotential {
    fn phi(&self, [x, y]: [f64; 2]) -> f64 {
        let (dx, dy) = (x - self.center[0], y - self.center[1]);
        let r2 = dx * dx + dy * dy;
        if r2 < self.a * self.a {
            -self.mass * (3.0 * self.a * self.a - r2) / (2.0 * self.a.powi(3))
        } else {
            -self.mass / r2.sqrt()
        }
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        let (dx, dy) = (state[0] - self.center[0], state[1] - self.center[1]);
        let r2 = dx * dx + dy * dy;
        let scale = if r2 < self.a * self.a {
            -self.mass / self.a.powi(3)
        } else {
            -self.mass / (r2 * r2.sqrt())
        };
        [scale * dx, scale * dy]
    }

    fn energy_range(&self) -> (f64, f64) {
        (-1.5 * self.mass / self.a, 0.0)
    }

    fn describe(&self) -> String {
        format!(
            "Homogeneous sphere potential: a = {}, M = {}, center = ({}, {})",
            self.a, self.mass, self.center[0], self.center[1]
        )
    }
}

/// Co-rotating frame spinning at `omega` about the z axis.
///
/// Contributes the centrifugal potential `-½ Ω² r²` and the velocity
/// dependent Coriolis acceleration `(2Ω vy, -2Ω vx)`. Energies measured in
/// this frame are Jacobi integrals.
///
/// The centrifugal term vanishes on the rotation axis, so in a sum it leaves
/// the lower energy bound of the other parts unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RotatingFrame {
    /// Pattern speed.
    pub omega: f64,
}

impl Potential for RotatingFrame {
    fn phi(&self, [x, y]: [f64; 2]) -> f64 {
        -0.5 * self.omega * self.omega * (x * x + y * y)
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        let w = self.omega;
        [
            w * w * state[0] + 2.0 * w * state[3],
            w * w * state[1] - 2.0 * w * state[2],
        ]
    }

    fn energy_range(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn describe(&self) -> String {
        format!("Rotating frame: omega = {}", self.omega)
    }
}

/// Sum of several potentials.
#[derive(Default)]
pub struct CombinedPotential {
    parts: Vec<Box<dyn Potential>>,
}

impl CombinedPotential {
    /// Combine the given parts.
    pub fn new(parts: Vec<Box<dyn Potential>>) -> Self {
        Self { parts }
    }

    /// Add one more part.
    pub fn with(mut self, part: impl Potential + 'static) -> Self {
        self.parts.push(Box::new(part));
        self
    }

    /// Constituent potentials.
    pub fn parts(&self) -> &[Box<dyn Potential>] {
        &self.parts
    }
}

impl Potential for CombinedPotential {
    fn phi(&self, position: [f64; 2]) -> f64 {
        self.parts.iter().map(|p| p.phi(position)).sum()
    }

    fn accel(&self, state: &OrbitState) -> [f64; 2] {
        self.parts.iter().fold([0.0, 0.0], |acc, p| {
            let a = p.accel(state);
            [acc[0] + a[0], acc[1] + a[1]]
        })
    }

    /// Bounds add up: the combined minimum is no lower than the sum of the
    /// parts' minima, and likewise for the maximum.
    fn energy_range(&self) -> (f64, f64) {
        self.parts.iter().fold((0.0, 0.0), |(lo, hi), p| {
            let (plo, phi) = p.energy_range();
            (lo + plo, hi + phi)
        })
    }

    fn describe(&self) -> String {
        let inner: Vec<String> = self.parts.iter().map(|p| p.describe()).collect();
        format!("Combined potential [{}]", inner.join("; "))
    }
}

/// Hamilton's equations for a test particle in a potential:
/// `d/dt (x, y, vx, vy) = (vx, vy, ax, ay)`.
pub struct EquationsOfMotion<'a> {
    potential: &'a dyn Potential,
}

impl<'a> EquationsOfMotion<'a> {
    /// Equations of motion in `potential`.
    pub fn new(potential: &'a dyn Potential) -> Self {
        Self { potential }
    }
}

impl OdeSystem<4> for EquationsOfMotion<'_> {
    fn rhs(&self, _t: f64, y: &OrbitState, dydt: &mut OrbitState) {
        let [ax, ay] = self.potential.accel(y);
        dydt[0] = y[2];
        dydt[1] = y[3];
        dydt[2] = ax;
        dydt[3] = ay;
    }
}

/// Energy per unit mass of a phase-space state.
pub fn energy(potential: &dyn Potential, state: &OrbitState) -> f64 {
    0.5 * (state[2] * state[2] + state[3] * state[3]) + potential.phi([state[0], state[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Central-difference gradient of φ.
    fn numeric_force(p: &dyn Potential, x: f64, y: f64) -> [f64; 2] {
        let h = 1e-6;
        [
            -(p.phi([x + h, y]) - p.phi([x - h, y])) / (2.0 * h),
            -(p.phi([x, y + h]) - p.phi([x, y - h])) / (2.0 * h),
        ]
    }

    fn assert_conservative(p: &dyn Potential, points: &[[f64; 2]]) {
        for &[x, y] in points {
            let a = p.accel(&[x, y, 0.0, 0.0]);
            let f = numeric_force(p, x, y);
            assert_relative_eq!(a[0], f[0], epsilon = 1e-6, max_relative = 1e-6);
            assert_relative_eq!(a[1], f[1], epsilon = 1e-6, max_relative = 1e-6);
        }
    }

    const POINTS: [[f64; 2]; 4] = [[0.3, -0.2], [1.5, 2.0], [-4.0, 0.5], [7.0, -6.0]];

    #[test]
    fn harmonic_force_is_gradient() {
        let p = HarmonicPotential {
            omega: 1.3,
            center: [0.5, -1.0],
        };
        assert_conservative(&p, &POINTS);
        assert_eq!(p.phi([0.5, -1.0]), 0.0);
    }

    #[test]
    fn logarithmic_force_is_gradient() {
        let p = LogarithmicPotential {
            center: [2.0, 2.0],
            ..Default::default()
        };
        assert_conservative(&p, &POINTS);
        assert_eq!(p.energy_range().0, p.phi([2.0, 2.0]));
    }

    #[test]
    fn homosphere_force_is_gradient_on_both_sides() {
        let p = HomospherePotential::default();
        assert_conservative(&p, &POINTS);
        // continuity at the surface
        let inside = p.phi([5.0 - 1e-9, 0.0]);
        let outside = p.phi([5.0 + 1e-9, 0.0]);
        assert_relative_eq!(inside, outside, max_relative = 1e-8);
        assert_relative_eq!(p.phi([0.0, 0.0]), p.energy_range().0);
    }

    #[test]
    fn rotating_frame_adds_coriolis() {
        let frame = RotatingFrame { omega: 0.3 };
        assert_conservative(&frame, &POINTS);
        let a = frame.accel(&[0.0, 0.0, 1.0, 0.0]);
        assert_relative_eq!(a[0], 0.0);
        assert_relative_eq!(a[1], -0.6);
    }

    #[test]
    fn combined_sums_parts() {
        let log = LogarithmicPotential::default();
        let frame = RotatingFrame { omega: 0.3 };
        let combined = CombinedPotential::default()
            .with(log.clone())
            .with(frame.clone());

        let state = [1.0, -0.5, 0.2, 0.7];
        let pos = [state[0], state[1]];
        assert_relative_eq!(combined.phi(pos), log.phi(pos) + frame.phi(pos));
        let a = combined.accel(&state);
        assert_relative_eq!(a[0], log.accel(&state)[0] + frame.accel(&state)[0]);
        assert_relative_eq!(a[1], log.accel(&state)[1] + frame.accel(&state)[1]);
        assert_eq!(combined.parts().len(), 2);

        let (lo, hi) = combined.energy_range();
        assert_eq!(lo, 0.0);
        assert_eq!(lo, combined.phi([0.0, 0.0]));
        assert_eq!(hi, f64::INFINITY);

        let text = combined.describe();
        assert!(text.contains("Logarithmic"));
        assert!(text.contains("Rotating frame"));
    }

    #[test]
    fn equations_of_motion_layout() {
        let p = HarmonicPotential::new(2.0);
        let eom = EquationsOfMotion::new(&p);
        let mut dydt = [0.0; 4];
        eom.rhs(0.0, &[1.0, 2.0, 3.0, 4.0], &mut dydt);
        assert_eq!(dydt, [3.0, 4.0, -4.0, -8.0]);
        assert_relative_eq!(energy(&p, &[1.0, 0.0, 0.0, 2.0]), 2.0 + 2.0);
    }
}
