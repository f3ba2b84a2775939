use crate::collectors::{Fault, FieldValue, Snapshot};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Receiver of collected snapshots.
pub trait Sink: Send + Sync {
    fn add_fields(&self, measurement: &str, fields: &BTreeMap<String, FieldValue>);
    fn add_fault(&self, fault: &Fault);
}

/// Hands one snapshot to a sink: the fields once, then every fault.
pub fn emit(snapshot: &Snapshot, measurement: &str, sink: &dyn Sink) {
    sink.add_fields(measurement, &snapshot.fields);
    for fault in &snapshot.faults {
        sink.add_fault(fault);
    }
}

/// Writes snapshots to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn add_fields(&self, measurement: &str, fields: &BTreeMap<String, FieldValue>) {
        let rendered = serde_json::to_string(fields).unwrap_or_else(|_| format!("{fields:?}"));
        let absent = fields.values().filter(|v| v.is_absent()).count();
        info!(
            measurement = %measurement,
            fields = %rendered,
            absent,
            "snapshot collected"
        );
    }

    fn add_fault(&self, fault: &Fault) {
        warn!(kind = fault.kind(), path = %fault.path(), error = %fault, "source fault");
    }
}
