use crate::collectors::scalar::{max_of, read_scalar};
use crate::collectors::status::read_status_line;
use crate::collectors::{FieldValue, Snapshot};
use crate::config::{ConfigError, SourcesConfig};
use tracing::debug;

/// Assembles one snapshot per call from a fixed, validated set of sources.
#[derive(Debug, Clone)]
pub struct Sampler {
    sources: SourcesConfig,
}

impl Sampler {
    pub fn new(sources: SourcesConfig) -> Result<Self, ConfigError> {
        sources.validate()?;
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &SourcesConfig {
        &self.sources
    }

    /// Reads every configured source once. Never fails: unreadable sources
    /// leave their fields absent and add a fault.
    pub fn collect(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        let thermal = &self.sources.thermal;

        if let Some(path) = thermal.separate() {
            let value = match read_scalar(path) {
                Ok(v) => Some(v),
                Err(fault) => {
                    debug!(path = %path, error = %fault, "first sensor read failed");
                    snapshot.faults.push(fault);
                    None
                }
            };
            snapshot.insert(&thermal.first_field, value);
        }

        let reading = max_of(thermal.pool());
        snapshot.insert(&thermal.field, reading.value);
        snapshot.faults.extend(reading.faults);

        for scalar in &self.sources.scalars {
            let value = match read_scalar(&scalar.path) {
                Ok(v) => Some(v),
                Err(fault) => {
                    debug!(source = %scalar.name, error = %fault, "scalar read failed");
                    snapshot.faults.push(fault);
                    None
                }
            };
            snapshot.insert(&scalar.name, value);
        }

        if let Some(storage) = &self.sources.storage {
            match read_status_line(&storage.path, storage.numeric) {
                Ok(record) => {
                    snapshot.insert(&storage.name_field(), record.label);
                    snapshot.insert(&storage.used_field(), record.used);
                    snapshot.insert(&storage.total_field(), record.total);
                }
                Err(fault) => {
                    debug!(path = %storage.path, error = %fault, "storage status read failed");
                    snapshot.faults.push(fault);
                    for field in [
                        storage.name_field(),
                        storage.used_field(),
                        storage.total_field(),
                    ] {
                        snapshot.insert(&field, FieldValue::Absent);
                    }
                }
            }
        }

        snapshot
    }
}
