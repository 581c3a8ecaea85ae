//! Progress reporting for energy sweeps.
//!
//! The sweep driver is handed a `&mut dyn Progress` and reports one tick per
//! completed energy level. Reporting never influences the computed results.

/// Receives sweep progress.
pub trait Progress {
    /// The sweep is about to integrate `total` energy levels.
    fn start(&mut self, total: usize);
    /// The level at `energy` is done.
    fn advance(&mut self, energy: f64);
    /// The sweep is over, successfully or not.
    fn finish(&mut self);
}

/// Reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _energy: f64) {}
    fn finish(&mut self) {}
}

#[cfg(feature = "progress")]
pub use bar::ProgressBar;

#[cfg(feature = "progress")]
mod bar {
    use std::time::{Duration, Instant};

    use indicatif::ProgressStyle;

    use super::Progress;

    /// Terminal progress bar over energy levels.
    pub struct ProgressBar {
        bar: Option<indicatif::ProgressBar>,
        last_tick: Option<Instant>,
    }

    impl Default for ProgressBar {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProgressBar {
        /// Bar drawn on stderr once the sweep starts.
        pub fn new() -> Self {
            Self {
                bar: None,
                last_tick: None,
            }
        }
    }

    impl Progress for ProgressBar {
        fn start(&mut self, total: usize) {
            let pb = indicatif::ProgressBar::new(total.max(1) as u64);
            let style = ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} energies ({percent:>3}%) | ETA {eta_precise} | {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(200));
            self.bar = Some(pb);
            self.last_tick = Some(Instant::now());
        }

        fn advance(&mut self, energy: f64) {
            if let Some(pb) = &self.bar {
                let took = self.last_tick.map(|t| t.elapsed()).unwrap_or_default();
                pb.set_message(format!("E = {energy:.3} in {:.2?}", took));
                pb.inc(1);
            }
            self.last_tick = Some(Instant::now());
        }

        fn finish(&mut self) {
            if let Some(pb) = self.bar.take() {
                pb.finish_and_clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every call.
    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl Progress for Recorder {
        fn start(&mut self, total: usize) {
            self.0.push(format!("start {total}"));
        }
        fn advance(&mut self, energy: f64) {
            self.0.push(format!("advance {energy}"));
        }
        fn finish(&mut self) {
            self.0.push("finish".into());
        }
    }

    #[test]
    fn trait_objects_dispatch() {
        let mut rec = Recorder::default();
        {
            let p: &mut dyn Progress = &mut rec;
            p.start(2);
            p.advance(1.5);
            p.finish();
        }
        assert_eq!(rec.0, ["start 2", "advance 1.5", "finish"]);

        let mut silent = Silent;
        silent.start(3);
        silent.advance(0.0);
        silent.finish();
    }

    #[cfg(feature = "progress")]
    #[test]
    fn bar_survives_a_full_cycle() {
        let mut bar = ProgressBar::new();
        bar.advance(1.0);
        bar.start(2);
        bar.advance(1.0);
        bar.advance(2.0);
        bar.finish();
        bar.finish();
    }
}
