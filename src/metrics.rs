use crate::collectors::scalar::NO_READING;
use crate::collectors::{Fault, FieldValue};
use crate::sink::Sink;
use crate::state::State;
use prometheus::core::Collector;
use prometheus::{opts, Counter, CounterVec, Encoder, Gauge, GaugeVec, Registry, TextEncoder};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub edgeprobe_field_value: GaugeVec,
    pub edgeprobe_field_present: GaugeVec,
    pub edgeprobe_field_info: GaugeVec,
    pub edgeprobe_faults_total: CounterVec,
    pub edgeprobe_collect_cycles_total: Counter,
    pub edgeprobe_last_collect_timestamp_seconds: Gauge,
    pub edgeprobe_uptime_seconds: Gauge,
    pub edgeprobe_scrape_count_total: Counter,
}

impl Metrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let edgeprobe_field_value = GaugeVec::new(
            opts!(
                "edgeprobe_field_value",
                "Latest integer value per snapshot field (-1 when the field has no reading)"
            ),
            &["field"],
        )?;
        let edgeprobe_field_present = GaugeVec::new(
            opts!(
                "edgeprobe_field_present",
                "1 if the field had a reading in the last cycle, 0 otherwise"
            ),
            &["field"],
        )?;
        let edgeprobe_field_info = GaugeVec::new(
            opts!(
                "edgeprobe_field_info",
                "Text snapshot fields, exported as a label with constant value 1"
            ),
            &["field", "value"],
        )?;
        let edgeprobe_faults_total = CounterVec::new(
            opts!(
                "edgeprobe_faults_total",
                "Non-fatal source faults by kind"
            ),
            &["kind"],
        )?;
        let edgeprobe_collect_cycles_total = Counter::with_opts(opts!(
            "edgeprobe_collect_cycles_total",
            "Number of completed collection cycles"
        ))?;
        let edgeprobe_last_collect_timestamp_seconds = Gauge::with_opts(opts!(
            "edgeprobe_last_collect_timestamp_seconds",
            "Unix time of the last completed collection cycle"
        ))?;
        let edgeprobe_uptime_seconds = Gauge::with_opts(opts!(
            "edgeprobe_uptime_seconds",
            "Seconds since the agent started"
        ))?;
        let edgeprobe_scrape_count_total = Counter::with_opts(opts!(
            "edgeprobe_scrape_count_total",
            "Number of /metrics scrapes"
        ))?;

        register(&registry, &edgeprobe_field_value)?;
        register(&registry, &edgeprobe_field_present)?;
        register(&registry, &edgeprobe_field_info)?;
        register(&registry, &edgeprobe_faults_total)?;
        register(&registry, &edgeprobe_collect_cycles_total)?;
        register(&registry, &edgeprobe_last_collect_timestamp_seconds)?;
        register(&registry, &edgeprobe_uptime_seconds)?;
        register(&registry, &edgeprobe_scrape_count_total)?;

        Ok(Arc::new(Self {
            registry,
            edgeprobe_field_value,
            edgeprobe_field_present,
            edgeprobe_field_info,
            edgeprobe_faults_total,
            edgeprobe_collect_cycles_total,
            edgeprobe_last_collect_timestamp_seconds,
            edgeprobe_uptime_seconds,
            edgeprobe_scrape_count_total,
        }))
    }

    pub fn update_from_state(&self, state: &State) {
        self.edgeprobe_last_collect_timestamp_seconds
            .set(state.last_collect_timestamp_seconds as f64);
        let uptime = now_unix().saturating_sub(state.started_at_unix) as f64;
        self.edgeprobe_uptime_seconds.set(uptime);
    }

    pub fn inc_collect_cycle(&self) {
        self.edgeprobe_collect_cycles_total.inc();
    }

    pub fn inc_scrape_count(&self) {
        self.edgeprobe_scrape_count_total.inc();
    }

    pub fn encode_metrics(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        encoder.encode(&mf, &mut buf)?;
        Ok(buf)
    }
}

impl Sink for Metrics {
    fn add_fields(&self, _measurement: &str, fields: &BTreeMap<String, FieldValue>) {
        // text values become labels; drop the previous cycle's label sets
        self.edgeprobe_field_info.reset();
        for (name, value) in fields {
            let labels = [name.as_str()];
            match value {
                FieldValue::Int(v) => {
                    self.edgeprobe_field_value
                        .with_label_values(&labels)
                        .set(*v as f64);
                    self.edgeprobe_field_present
                        .with_label_values(&labels)
                        .set(1.0);
                }
                FieldValue::Text(text) => {
                    // a previous Absent cycle may have left the sentinel behind
                    let _ = self.edgeprobe_field_value.remove_label_values(&labels);
                    self.edgeprobe_field_info
                        .with_label_values(&[name.as_str(), text.as_str()])
                        .set(1.0);
                    self.edgeprobe_field_present
                        .with_label_values(&labels)
                        .set(1.0);
                }
                FieldValue::Absent => {
                    self.edgeprobe_field_value
                        .with_label_values(&labels)
                        .set(NO_READING as f64);
                    self.edgeprobe_field_present
                        .with_label_values(&labels)
                        .set(0.0);
                }
            }
        }
    }

    fn add_fault(&self, fault: &Fault) {
        self.edgeprobe_faults_total
            .with_label_values(&[fault.kind()])
            .inc();
    }
}

fn register<T: Collector + Clone + 'static>(
    registry: &Registry,
    collector: &T,
) -> Result<(), prometheus::Error> {
    registry.register(Box::new(collector.clone()))
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::Snapshot;
    use crate::sink::emit;

    fn encoded(metrics: &Metrics) -> String {
        String::from_utf8(metrics.encode_metrics().expect("encode metrics")).unwrap()
    }

    #[test]
    fn absent_fields_export_sentinel_and_not_present() {
        let metrics = Metrics::new().expect("metrics init");
        let mut snapshot = Snapshot::default();
        snapshot.insert("thermo", 41500);
        snapshot.insert("gpu", FieldValue::Absent);
        snapshot.insert("sd_card_name", "SD Card".to_string());
        snapshot.faults.push(Fault::Io {
            path: "/gpu".to_string(),
            cause: "No such file or directory (os error 2)".to_string(),
        });

        emit(&snapshot, "core", metrics.as_ref());
        let text = encoded(&metrics);

        assert!(text.contains(r#"edgeprobe_field_value{field="thermo"} 41500"#));
        assert!(text.contains(r#"edgeprobe_field_value{field="gpu"} -1"#));
        assert!(text.contains(r#"edgeprobe_field_present{field="gpu"} 0"#));
        assert!(text.contains(r#"edgeprobe_field_present{field="thermo"} 1"#));
        assert!(text.contains(r#"edgeprobe_field_info{field="sd_card_name",value="SD Card"} 1"#));
        assert!(text.contains(r#"edgeprobe_faults_total{kind="io"} 1"#));
    }

    #[test]
    fn text_labels_are_replaced_between_cycles() {
        let metrics = Metrics::new().expect("metrics init");

        let mut first = Snapshot::default();
        first.insert("sd_card_name", "Old Card".to_string());
        emit(&first, "core", metrics.as_ref());

        let mut second = Snapshot::default();
        second.insert("sd_card_name", "New Card".to_string());
        emit(&second, "core", metrics.as_ref());

        let text = encoded(&metrics);
        assert!(!text.contains("Old Card"));
        assert!(text.contains("New Card"));
    }

    #[test]
    fn text_field_recovering_from_absent_drops_sentinel() {
        let metrics = Metrics::new().expect("metrics init");

        let mut missing = Snapshot::default();
        missing.insert("sd_card_name", FieldValue::Absent);
        emit(&missing, "core", metrics.as_ref());
        assert!(encoded(&metrics).contains(r#"edgeprobe_field_value{field="sd_card_name"} -1"#));

        let mut back = Snapshot::default();
        back.insert("sd_card_name", "SD Card".to_string());
        emit(&back, "core", metrics.as_ref());

        let text = encoded(&metrics);
        assert!(!text.contains(r#"edgeprobe_field_value{field="sd_card_name"}"#));
        assert!(text.contains(r#"edgeprobe_field_present{field="sd_card_name"} 1"#));
        assert!(text.contains(r#"edgeprobe_field_info{field="sd_card_name",value="SD Card"} 1"#));
    }

    #[test]
    fn state_updates_timestamp_gauge() {
        let metrics = Metrics::new().expect("metrics init");
        let mut state = State::new(0, "core");
        state.update_collected(1_700_000_000, Snapshot::default());
        metrics.update_from_state(&state);
        metrics.inc_collect_cycle();

        let text = encoded(&metrics);
        assert!(text.contains("edgeprobe_last_collect_timestamp_seconds 1700000000"));
        assert!(text.contains("edgeprobe_collect_cycles_total 1"));
        assert!(text.contains("edgeprobe_uptime_seconds"));
    }
}
