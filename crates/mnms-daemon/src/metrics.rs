//! Time-series points derived from decoded telemetry

use chrono::{DateTime, Utc};
use mnms_core::{InterfaceRecord, TelemetryEnvelope};
use std::collections::BTreeMap;
use std::fmt::Write as _;
#[cfg(test)]
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const INTERFACE_MEASUREMENT: &str = "interfaces_telemetry";
pub const DEVICE_MEASUREMENT: &str = "device_telemetry";

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Point {0} has no fields")]
    EmptyPoint(String),
}

/// Typed field value of a point
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

/// One time-series sample
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.to_string(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_string(), value.into());
        self
    }

    pub fn field(mut self, key: &str, value: FieldValue) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    /// Add a float field only when a value is present
    pub fn float_opt(self, key: &str, value: Option<f64>) -> Self {
        match value {
            Some(v) => self.field(key, FieldValue::Float(v)),
            None => self,
        }
    }

    pub fn bool_opt(self, key: &str, value: Option<bool>) -> Self {
        match value {
            Some(v) => self.field(key, FieldValue::Bool(v)),
            None => self,
        }
    }

    /// Render as InfluxDB line protocol with second precision. Line protocol
    /// needs at least one field.
    pub fn to_line_protocol(&self) -> Result<String, MetricsError> {
        if self.fields.is_empty() {
            return Err(MetricsError::EmptyPoint(self.measurement.clone()));
        }
        let mut line = escape_key(&self.measurement, false);
        for (key, value) in &self.tags {
            let _ = write!(line, ",{}={}", escape_key(key, true), escape_key(value, true));
        }
        for (i, (key, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape_key(key, true));
            line.push('=');
            match value {
                FieldValue::Float(v) => {
                    let _ = write!(line, "{}", v);
                }
                FieldValue::Int(v) => {
                    let _ = write!(line, "{}i", v);
                }
                FieldValue::Bool(v) => {
                    let _ = write!(line, "{}", v);
                }
            }
        }
        let _ = write!(line, " {}", self.timestamp.timestamp());
        Ok(line)
    }
}

/// Escape measurement names (`,` and space) and tag/field keys (also `=`)
fn escape_key(s: &str, escape_equals: bool) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ',' || c == ' ' || (escape_equals && c == '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Metrics-write capability used by the telemetry route
pub trait MetricsSink: Send + Sync {
    fn write_points(&self, points: Vec<Point>) -> Result<(), MetricsError>;
}

/// Emits points as line protocol through `tracing`
#[derive(Debug, Default)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn write_points(&self, points: Vec<Point>) -> Result<(), MetricsError> {
        for point in &points {
            let line = point.to_line_protocol()?;
            debug!(target: "mnms::metrics", %line, "Point");
        }
        Ok(())
    }
}

/// Keeps every written point, for inspection in tests
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryMetricsSink {
    points: Mutex<Vec<Point>>,
}

#[cfg(test)]
impl MemoryMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> Vec<Point> {
        self.points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
impl MetricsSink for MemoryMetricsSink {
    fn write_points(&self, points: Vec<Point>) -> Result<(), MetricsError> {
        self.points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(points);
        Ok(())
    }
}

/// Point for one interface.
///
/// An unreadable rate is logged and written as 0, like a missing one.
pub fn interface_point(device_id: Uuid, iface: &InterfaceRecord, at: DateTime<Utc>) -> Point {
    let rate = match iface.rate_mbps() {
        Some(Ok(mbps)) => mbps as i64,
        Some(Err(e)) => {
            warn!(device = %device_id, interface = ?iface.name(), error = %e, "Ignoring link rate");
            0
        }
        None => 0,
    };

    let mut point = Point::new(INTERFACE_MEASUREMENT, at)
        .tag("device_id", device_id.to_string())
        .tag("id", iface.id().unwrap_or_default())
        .float_opt("rx_bits_per_second", iface.get("rx-bits-per-second").as_f64())
        .float_opt("tx_bits_per_second", iface.get("tx-bits-per-second").as_f64())
        .float_opt("rx_packets_per_second", iface.get("rx-packets-per-second").as_f64())
        .float_opt("tx_packets_per_second", iface.get("tx-packets-per-second").as_f64())
        .field("status", FieldValue::Bool(iface.link_up()))
        .field("rate", FieldValue::Int(rate));

    if iface.is_sfp() {
        point = point
            .bool_opt("sfp_rx_loss", iface.get("sfp-rx-loss").as_bool())
            .bool_opt("sfp_module_present", iface.get("sfp-module-present").as_bool())
            .field("sfp_rx_power", FieldValue::Float(iface.number_or_zero("sfp-rx-power")))
            .field(
                "sfp_supply_voltage",
                FieldValue::Float(iface.number_or_zero("sfp-supply-voltage")),
            )
            .field(
                "sfp_temperature",
                FieldValue::Float(iface.number_or_zero("sfp-temperature")),
            )
            .field("sfp_tx_power", FieldValue::Float(iface.number_or_zero("sfp-tx-power")));
    }
    point
}

/// All points for one report: one per interface plus the device point
/// (omitted when the device reported none of its readings)
pub fn telemetry_points(device_id: Uuid, envelope: &TelemetryEnvelope, at: DateTime<Utc>) -> Vec<Point> {
    let mut points: Vec<Point> = envelope
        .interfaces
        .iter()
        .map(|iface| interface_point(device_id, iface, at))
        .collect();

    let device = Point::new(DEVICE_MEASUREMENT, at)
        .tag("device_id", device_id.to_string())
        .float_opt("voltage", envelope.device.voltage.as_f64())
        .float_opt("temperature", envelope.device.temperature.as_f64())
        .float_opt("cpu_load", envelope.device.cpu_load.as_f64());
    if !device.fields.is_empty() {
        points.push(device);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use mnms_core::{CoercedValue, DeviceFacts, Record};

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn iface(line: &str) -> InterfaceRecord {
        InterfaceRecord::from_record(Record::tokenize(line))
    }

    #[test]
    fn test_copper_interface_point() {
        let id = Uuid::nil();
        let point = interface_point(
            id,
            &iface("id=*1;rx-bits-per-second=1200;tx-bits-per-second=800;status=link-ok;rate=100Mbps;default-name=ether1;sfp-rx-power=-3;"),
            at(),
        );
        assert_eq!(point.measurement, INTERFACE_MEASUREMENT);
        assert_eq!(point.tags["id"], "*1");
        assert_eq!(point.fields["rx_bits_per_second"], FieldValue::Float(1200.0));
        assert_eq!(point.fields["status"], FieldValue::Bool(true));
        assert_eq!(point.fields["rate"], FieldValue::Int(100));
        assert!(!point.fields.contains_key("rx_packets_per_second"));
        // Not an SFP port, readings are ignored
        assert!(!point.fields.contains_key("sfp_rx_power"));
    }

    #[test]
    fn test_sfp_interface_point() {
        let point = interface_point(
            Uuid::nil(),
            &iface("id=*2;status=no-link;rate=10Gbps;default-name=sfp-sfpplus1;sfp-rx-loss=true;sfp-module-present=true;sfp-temperature=38;"),
            at(),
        );
        assert_eq!(point.fields["status"], FieldValue::Bool(false));
        assert_eq!(point.fields["rate"], FieldValue::Int(10000));
        assert_eq!(point.fields["sfp_rx_loss"], FieldValue::Bool(true));
        assert_eq!(point.fields["sfp_temperature"], FieldValue::Float(38.0));
        assert_eq!(point.fields["sfp_rx_power"], FieldValue::Float(0.0));
    }

    #[test]
    fn test_unparsable_rate_written_as_zero() {
        let point = interface_point(Uuid::nil(), &iface("id=*3;rate=auto;"), at());
        assert_eq!(point.fields["rate"], FieldValue::Int(0));
    }

    #[test]
    fn test_telemetry_points_include_device() {
        let envelope = TelemetryEnvelope {
            interfaces: vec![iface("id=*1;"), iface("id=*2;")],
            device: DeviceFacts {
                voltage: CoercedValue::Number(24.0),
                cpu_load: CoercedValue::Number(7.0),
                ..DeviceFacts::default()
            },
            warnings: Vec::new(),
        };
        let points = telemetry_points(Uuid::nil(), &envelope, at());
        assert_eq!(points.len(), 3);
        let device = &points[2];
        assert_eq!(device.measurement, DEVICE_MEASUREMENT);
        assert_eq!(device.fields.len(), 2);

        let empty = TelemetryEnvelope::default();
        assert!(telemetry_points(Uuid::nil(), &empty, at()).is_empty());
    }

    #[test]
    fn test_line_protocol() {
        let point = Point::new("device_telemetry", at())
            .tag("device_id", "a b")
            .field("cpu_load", FieldValue::Float(7.5))
            .field("rate", FieldValue::Int(1000))
            .field("status", FieldValue::Bool(true));
        assert_eq!(
            point.to_line_protocol().unwrap(),
            "device_telemetry,device_id=a\\ b cpu_load=7.5,rate=1000i,status=true 1700000000"
        );

        let empty = Point::new("device_telemetry", at()).tag("device_id", "x");
        assert!(matches!(
            empty.to_line_protocol(),
            Err(MetricsError::EmptyPoint(m)) if m == "device_telemetry"
        ));
        assert!(LogMetricsSink.write_points(vec![empty]).is_err());
    }

    #[test]
    fn test_memory_sink_collects() {
        let sink = MemoryMetricsSink::new();
        let point = Point::new("m", at()).field("v", FieldValue::Int(1));
        sink.write_points(vec![point.clone()]).unwrap();
        sink.write_points(vec![point]).unwrap();
        assert_eq!(sink.points().len(), 2);
        assert!(LogMetricsSink.write_points(sink.points()).is_ok());
    }
}
