//! Butcher tableau of the Fehlberg 7(8) embedded pair.
//!
//! Source: E. Fehlberg, NASA TR R-287 (1968), Table X.
//! The 8th-order weights advance the orbit, the 7th-order companion only
//! feeds the error estimate. The stage layout is shared by the adaptive step
//! and by the exact sub-step used to place section points.

/// Number of stages.
pub const STAGES: usize = 13;

/// Order of the propagating solution.
pub const ORDER: u8 = 8;

/// Order of the embedded error estimator.
pub const EMBEDDED_ORDER: u8 = 7;

/// Nodes `c_i`: stage `i` is evaluated at `t + c_i * h`.
pub const C: [f64; STAGES] = [
    0.0,
    2.0 / 27.0,
    1.0 / 9.0,
    1.0 / 6.0,
    5.0 / 12.0,
    1.0 / 2.0,
    5.0 / 6.0,
    1.0 / 6.0,
    2.0 / 3.0,
    1.0 / 3.0,
    1.0,
    0.0,
    1.0,
];

/// Stage matrix `a_ij`, strictly lower triangular (`j < i`).
#[rustfmt::skip]
pub const A: [[f64; STAGES - 1]; STAGES] = [
    [0.0; 12],
    [2.0 / 27.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 36.0, 1.0 / 12.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 24.0, 0.0, 1.0 / 8.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [5.0 / 12.0, 0.0, -25.0 / 16.0, 25.0 / 16.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 20.0, 0.0, 0.0, 1.0 / 4.0, 1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-25.0 / 108.0, 0.0, 0.0, 125.0 / 108.0, -65.0 / 27.0, 125.0 / 54.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [31.0 / 300.0, 0.0, 0.0, 0.0, 61.0 / 225.0, -2.0 / 9.0, 13.0 / 900.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [2.0, 0.0, 0.0, -53.0 / 6.0, 704.0 / 45.0, -107.0 / 9.0, 67.0 / 90.0, 3.0, 0.0, 0.0, 0.0, 0.0],
    [-91.0 / 108.0, 0.0, 0.0, 23.0 / 108.0, -976.0 / 135.0, 311.0 / 54.0, -19.0 / 60.0, 17.0 / 6.0, -1.0 / 12.0, 0.0, 0.0, 0.0],
    [2383.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -301.0 / 82.0, 2133.0 / 4100.0, 45.0 / 82.0, 45.0 / 164.0, 18.0 / 41.0, 0.0, 0.0],
    [3.0 / 205.0, 0.0, 0.0, 0.0, 0.0, -6.0 / 41.0, -3.0 / 205.0, -3.0 / 41.0, 3.0 / 41.0, 6.0 / 41.0, 0.0, 0.0],
    [-1777.0 / 4100.0, 0.0, 0.0, -341.0 / 164.0, 4496.0 / 1025.0, -289.0 / 82.0, 2193.0 / 4100.0, 51.0 / 82.0, 33.0 / 164.0, 12.0 / 41.0, 0.0, 1.0],
];

/// 8th-order weights. Stages 11 and 12 do not contribute.
#[rustfmt::skip]
pub const B: [f64; STAGES] = [
    41.0 / 840.0, 0.0, 0.0, 0.0, 0.0,
    34.0 / 105.0, 9.0 / 35.0, 9.0 / 35.0, 9.0 / 280.0, 9.0 / 280.0,
    41.0 / 840.0, 0.0, 0.0,
];

/// 7th-order weights.
#[rustfmt::skip]
pub const B_HAT: [f64; STAGES] = [
    0.0, 0.0, 0.0, 0.0, 0.0,
    34.0 / 105.0, 9.0 / 35.0, 9.0 / 35.0, 9.0 / 280.0, 9.0 / 280.0,
    0.0, 41.0 / 840.0, 41.0 / 840.0,
];

/// `B - B_HAT`. The truncation error reduces to
/// `(41/840) * h * (k0 + k10 - k11 - k12)`.
#[rustfmt::skip]
pub const B_ERR: [f64; STAGES] = [
    41.0 / 840.0, 0.0, 0.0, 0.0, 0.0,
    0.0, 0.0, 0.0, 0.0, 0.0,
    41.0 / 840.0, -41.0 / 840.0, -41.0 / 840.0,
];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rows_sum_to_nodes() {
        for (i, row) in A.iter().enumerate() {
            let sum: f64 = row.iter().sum();
            assert_abs_diff_eq!(sum, C[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn weights_are_consistent() {
        assert_abs_diff_eq!(B.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(B_HAT.iter().sum::<f64>(), 1.0, epsilon = 1e-14);
        for i in 0..STAGES {
            assert_abs_diff_eq!(B[i] - B_HAT[i], B_ERR[i], epsilon = 1e-15);
        }
    }

    #[test]
    fn quadrature_order_conditions() {
        // sum b_i c_i^(k-1) = 1/k up to the method order
        for k in 1..=ORDER as i32 {
            let sum: f64 = B.iter().zip(C.iter()).map(|(b, c)| b * c.powi(k - 1)).sum();
            assert_abs_diff_eq!(sum, 1.0 / k as f64, epsilon = 1e-13);
        }
        assert!(EMBEDDED_ORDER < ORDER);
    }
}
