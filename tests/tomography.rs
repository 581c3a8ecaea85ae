//! End-to-end sweeps: turning points, launches, sectioning and storage.

use std::f64::consts::PI;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use poincare_tomography::potential::energy;
use poincare_tomography::{
    EnergySweep, EquationsOfMotion, HarmonicPotential, HomospherePotential, IntegrationSettings,
    OrbitStatus, PoincareCollection, Potential, PotentialConfig, Rkf78, Scenario, Silent,
    SweepError, Tolerances, TurningPointError,
};
use tempfile::tempdir;

/// Short runs in the default rotating logarithmic potential.
fn galaxy_settings(crossings: Option<usize>) -> IntegrationSettings {
    IntegrationSettings {
        t_final: 100.0,
        n_samples: 500,
        crossings,
        ..Default::default()
    }
}

fn galaxy_sweep(potential: &dyn Potential, parallel: bool) -> PoincareCollection {
    EnergySweep::new(potential)
        .with_integration(galaxy_settings(Some(3)))
        .parallel(parallel)
        .run(&[60.0, 120.0], 3, &mut Silent)
        .unwrap()
}

#[test]
fn golden_harmonic_section() {
    // φ = x² + y², ω = √2
    let omega = 2.0_f64.sqrt();
    let potential = HarmonicPotential::new(omega);
    let collection = EnergySweep::new(&potential)
        .with_integration(IntegrationSettings {
            crossings: Some(4),
            rtol: 1e-12,
            atol: 1e-14,
            ..Default::default()
        })
        .run(&[2.0], 1, &mut Silent)
        .unwrap();

    assert_eq!(collection.energies(), vec![2.0]);
    let level = &collection.levels()[0];
    assert_relative_eq!(level.turning_points.low, -0.999 * omega, max_relative = 1e-12);
    assert_relative_eq!(level.turning_points.high, 0.999 * omega, max_relative = 1e-12);

    let orbits = collection.orbits(0).unwrap();
    assert_eq!(orbits.len(), 1);
    let orbit = &orbits[0];
    let x0 = -0.999 * omega;
    assert_eq!(orbit.launch[0], level.turning_points.low);
    assert_relative_eq!(orbit.launch[3], (2.0 * (2.0 - x0 * x0)).sqrt(), max_relative = 1e-9);

    // x = x0 cos ωt, y ∝ sin ωt: upward passes every 2π/ω, launch excluded
    assert_eq!(orbit.status, OrbitStatus::ReachedCrossingTarget);
    assert_eq!(orbit.section.len(), 4);
    assert_relative_eq!(orbit.t_end, 4.0 * 2.0 * PI / omega, epsilon = 1e-8);
    for &[x, vx] in orbit.section.points() {
        assert_relative_eq!(x, x0, epsilon = 1e-8);
        assert_abs_diff_eq!(vx, 0.0, epsilon = 1e-8);
        assert_relative_eq!(x * x + vx * vx / (omega * omega), x0 * x0, epsilon = 1e-8);
    }

    // the dense grid stops at the fourth crossing
    let dt = 100.0 / 19_999.0;
    let last_sample = (orbit.trajectory.len() - 1) as f64 * dt;
    assert!(last_sample <= orbit.t_end && orbit.t_end - last_sample < dt);
}

#[test]
fn one_orbit_per_energy() {
    let potential = PotentialConfig::default().build();
    let collection = EnergySweep::new(potential.as_ref())
        .with_integration(galaxy_settings(Some(2)))
        .run(&[40.0, 80.0, 160.0], 1, &mut Silent)
        .unwrap();
    assert_eq!(collection.len(), 3);
    for i in 0..3 {
        assert_eq!(collection.orbits(i).unwrap().len(), 1);
        assert_eq!(collection.sections(i).unwrap().len(), 1);
    }
}

#[test]
fn boundary_energy_rejected_inside_accepted() {
    let potential = HomospherePotential::default();
    let (min, max) = potential.energy_range();
    let sweep = EnergySweep::new(&potential).with_integration(IntegrationSettings {
        t_final: 20.0,
        n_samples: 200,
        crossings: Some(2),
        ..Default::default()
    });

    for boundary in [min, max] {
        match sweep.run(&[boundary], 1, &mut Silent) {
            Err(SweepError::EnergyOutOfRange {
                energy,
                min: lo,
                max: hi,
            }) => {
                assert_eq!(energy, boundary);
                assert_eq!((lo, hi), (min, max));
            }
            other => panic!("expected a range error, got {other:?}"),
        }
    }

    let inside = min + 1e-3;
    let collection = sweep.run(&[inside], 1, &mut Silent).unwrap();
    let orbit = &collection.orbits(0).unwrap()[0];
    assert!(orbit.launch[3] > 0.0);
    assert_eq!(orbit.status, OrbitStatus::ReachedCrossingTarget);
    assert_eq!(orbit.section.len(), 2);
}

#[test]
fn crossing_target_is_exact() {
    let potential = PotentialConfig::default().build();
    let collection = galaxy_sweep(potential.as_ref(), false);
    for level in collection.levels() {
        for orbit in &level.orbits {
            assert_eq!(orbit.status, OrbitStatus::ReachedCrossingTarget);
            assert_eq!(orbit.section.len(), 3);
            assert!(orbit.t_end < 100.0);
        }
    }
}

#[test]
fn no_count_mode_spans_the_horizon() {
    let potential = PotentialConfig::default().build();
    let collection = EnergySweep::new(potential.as_ref())
        .with_integration(IntegrationSettings {
            t_final: 30.0,
            n_samples: 300,
            crossings: None,
            ..Default::default()
        })
        .run(&[100.0], 3, &mut Silent)
        .unwrap();
    for orbit in collection.orbits(0).unwrap() {
        assert_eq!(orbit.status, OrbitStatus::ReachedHorizon);
        assert_eq!(orbit.t_end, 30.0);
        assert_eq!(orbit.trajectory.len(), 300);
        assert!(!orbit.section.is_empty());
    }
}

#[test]
fn sweeps_are_reproducible_and_order_preserving() {
    let potential = PotentialConfig::default().build();
    let first = galaxy_sweep(potential.as_ref(), false);
    let second = galaxy_sweep(potential.as_ref(), false);
    assert_eq!(first, second);

    let parallel = galaxy_sweep(potential.as_ref(), true);
    assert_eq!(first, parallel);
}

#[test]
fn saved_collection_round_trips() {
    let potential = PotentialConfig::default().build();
    let collection = galaxy_sweep(potential.as_ref(), false);

    let dir = tempdir().unwrap();
    let path = dir.path().join("PoincareCollection.bin");
    collection.save(&path).unwrap();
    let loaded = PoincareCollection::load(&path).unwrap();

    assert_eq!(loaded, collection);
    assert_eq!(loaded.energies(), vec![60.0, 120.0]);
    assert_eq!(loaded.description(), potential.describe());
}

#[test]
fn jacobi_integral_is_conserved() {
    let potential = PotentialConfig::default().build();
    let e0 = 100.0;
    let x0 = 1.0;
    let launch = [x0, 0.0, 0.0, (2.0 * (e0 - potential.phi([x0, 0.0]))).sqrt()];
    assert_relative_eq!(energy(potential.as_ref(), &launch), e0, max_relative = 1e-14);

    let eom = EquationsOfMotion::new(potential.as_ref());
    let mut solver = Rkf78::new(Tolerances::new(1e-12, 1e-10));

    // accepted steps carry the full 8th order accuracy
    let steps = solver.propagate(&eom, 0.0, &launch, 100.0, 1e-3, &[]).unwrap();
    assert!(steps.success());
    for y in &steps.y {
        assert_relative_eq!(energy(potential.as_ref(), y), e0, max_relative = 1e-6);
    }

    // interpolated grid samples are only cubic
    let grid: Vec<f64> = (0..2000).map(|i| i as f64 * 0.05).collect();
    let samples = solver.propagate(&eom, 0.0, &launch, 100.0, 1e-3, &grid).unwrap();
    assert_eq!(samples.t.len(), grid.len());
    for y in &samples.y {
        assert_relative_eq!(energy(potential.as_ref(), y), e0, max_relative = 1e-3);
    }
}

#[test]
fn turning_point_divergence_aborts_the_sweep() {
    // -M/r = E puts the root at r = 1e6, beyond the sanity threshold
    let potential = HomospherePotential::default();
    let err = EnergySweep::new(&potential)
        .run(&[-1e-3, -100.0], 2, &mut Silent)
        .unwrap_err();
    match err {
        SweepError::TurningPoint(TurningPointError::Divergence {
            energy, threshold, ..
        }) => {
            assert_eq!(energy, -1e-3);
            assert_eq!(threshold, 1e5);
        }
        other => panic!("expected divergence, got {other}"),
    }
}

#[test]
fn scenario_file_drives_a_sweep() {
    let yaml = "
potential:
  type: combined
  parts:
    - type: harmonic
      omega: 1.0
    - type: harmonic
      omega: 1.0
integration:
  t_final: 50.0
  n_samples: 100
  crossings: 2
sweep:
  e_min: 0.5
  e_max: 1.5
  n_energies: 3
  orbits_per_energy: 2
";
    let scenario = Scenario::from_reader(yaml.as_bytes()).unwrap();
    let potential = scenario.potential.build();
    // two unit wells add up to ω² = 2
    assert_relative_eq!(potential.phi([1.0, 0.0]), 1.0);

    let collection = EnergySweep::new(potential.as_ref())
        .with_integration(scenario.integration.clone())
        .run_settings(&scenario.sweep, &mut Silent)
        .unwrap();
    assert_eq!(collection.energies(), vec![0.5, 1.0, 1.5]);
    for level in collection.levels() {
        assert_eq!(level.orbits.len(), 2);
        assert_eq!(level.mean_crossings(), 2.0);
        let width = level.turning_points.width();
        assert_relative_eq!(width, 2.0 * 0.999 * level.energy.sqrt(), max_relative = 1e-10);
    }
}
