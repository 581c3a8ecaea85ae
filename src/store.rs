//! Persistence and export of [`PoincareCollection`]s.
//!
//! Collections are stored with `bincode`, which round-trips every `f64`
//! bit for bit. Sections can also be flattened to CSV for external plotting.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::sweep::PoincareCollection;

/// File name used when saving without an explicit path.
pub const DEFAULT_FILE: &str = "PoincareCollection.bin";

/// Storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Binary encoding or decoding failed.
    #[error("cannot encode or decode collection: {0}")]
    Encode(#[from] bincode::Error),
    /// CSV writing failed.
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
}

impl PoincareCollection {
    /// Serialize into `writer`.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    /// Deserialize from `reader`.
    pub fn read_from<R: Read>(reader: R) -> Result<Self, StoreError> {
        Ok(bincode::deserialize_from(reader)?)
    }

    /// Save to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), levels = self.len(), "saved collection");
        Ok(())
    }

    /// Load a collection written by [`save`](Self::save).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let collection = Self::read_from(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), levels = collection.len(), "loaded collection");
        Ok(collection)
    }
}

#[derive(Serialize)]
struct SectionRow {
    energy_index: usize,
    energy: f64,
    orbit: usize,
    crossing: usize,
    x: f64,
    vx: f64,
}

/// Write every section point as a CSV row
/// `energy_index, energy, orbit, crossing, x, vx`.
pub fn write_sections<W: Write>(
    collection: &PoincareCollection,
    writer: W,
) -> Result<(), StoreError> {
    let mut csv = csv::Writer::from_writer(writer);
    for (energy_index, level) in collection.levels().iter().enumerate() {
        for (orbit, section) in level.sections().enumerate() {
            for (crossing, &[x, vx]) in section.points().iter().enumerate() {
                csv.serialize(SectionRow {
                    energy_index,
                    energy: level.energy,
                    orbit,
                    crossing,
                    x,
                    vx,
                })?;
            }
        }
    }
    csv.flush()?;
    Ok(())
}

/// [`write_sections`] into a file at `path`.
pub fn write_sections_csv(
    collection: &PoincareCollection,
    path: impl AsRef<Path>,
) -> Result<(), StoreError> {
    let path = path.as_ref();
    write_sections(collection, BufWriter::new(File::create(path)?))?;
    info!(path = %path.display(), "exported sections");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Orbit, OrbitStatus, Section};
    use crate::sweep::EnergyLevel;
    use crate::turning::TurningPoints;
    use crate::EventResult;
    use tempfile::tempdir;

    fn crossing(x: f64, vx: f64) -> EventResult<4> {
        EventResult {
            t: 0.0,
            y: [x, 0.0, vx, 1.0],
            g_value: 0.0,
            iterations: 0,
        }
    }

    fn sample() -> PoincareCollection {
        let orbit = |x0: f64, n: usize| Orbit {
            launch: [x0, 0.0, 0.0, 1.0],
            trajectory: vec![[x0, 0.0], [x0 + 0.1, 0.2]],
            section: Section::from_events(
                &(0..n).map(|k| crossing(x0 + k as f64, 0.1 * k as f64)).collect::<Vec<_>>(),
            ),
            status: if n == 0 {
                OrbitStatus::Failed {
                    reason: "step size collapsed".into(),
                }
            } else {
                OrbitStatus::ReachedCrossingTarget
            },
            t_end: 1.0 / 3.0,
        };
        PoincareCollection::new(
            "test potential",
            vec![
                EnergyLevel {
                    energy: 1.5,
                    turning_points: TurningPoints {
                        low: -1.0,
                        high: 1.0,
                    },
                    orbits: vec![orbit(-0.5, 2), orbit(0.5, 0)],
                },
                EnergyLevel {
                    energy: 2.5,
                    turning_points: TurningPoints {
                        low: -2.0,
                        high: 2.0,
                    },
                    orbits: vec![orbit(0.25, 1)],
                },
            ],
        )
    }

    #[test]
    fn bincode_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        let collection = sample();
        collection.save(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
        let loaded = PoincareCollection::load(&path).unwrap();
        assert_eq!(loaded, collection);
    }

    #[test]
    fn truncated_stream_is_an_encode_error() {
        let mut bytes = Vec::new();
        sample().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);
        let err = PoincareCollection::read_from(bytes.as_slice()).unwrap_err();
        assert!(matches!(err, StoreError::Encode(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = PoincareCollection::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn csv_has_one_row_per_crossing() {
        let mut out = Vec::new();
        write_sections(&sample(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "energy_index,energy,orbit,crossing,x,vx");
        assert_eq!(lines.len(), 1 + 3);
        assert_eq!(lines[1], "0,1.5,0,0,-0.5,0.0");
        assert!(lines[3].starts_with("1,2.5,0,0,0.25,"));
    }

    #[test]
    fn csv_file_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sections.csv");
        write_sections_csv(&sample(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
