//! Merged interface view built from the four interface listings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use tracing::warn;

use crate::error::DecodeError;
use crate::rate::parse_rate_mbps;
use crate::record::Record;
use crate::value::CoercedValue;

/// The interface listings in the order they are merged. Later sources win
/// on key collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceSource {
    TrafficMonitor,
    InterfaceList,
    EthernetMonitor,
    EthernetList,
}

impl InterfaceSource {
    pub const ALL: [InterfaceSource; 4] = [
        Self::TrafficMonitor,
        Self::InterfaceList,
        Self::EthernetMonitor,
        Self::EthernetList,
    ];
}

impl fmt::Display for InterfaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TrafficMonitor => "traffic-monitor",
            Self::InterfaceList => "interface-list",
            Self::EthernetMonitor => "ethernet-monitor",
            Self::EthernetList => "ethernet-list",
        };
        f.write_str(name)
    }
}

/// One network interface with the fields of all four listings unioned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceRecord(Record);

impl InterfaceRecord {
    pub fn from_record(record: Record) -> Self {
        Self(record)
    }

    pub fn into_record(self) -> Record {
        self.0
    }

    /// RouterOS internal id (e.g. `*1`)
    pub fn id(&self) -> Option<String> {
        self.0.get("id").to_text()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").as_str()
    }

    /// Factory port name from the ethernet listing (e.g. `sfp-sfpplus1`)
    pub fn default_name(&self) -> Option<&str> {
        self.0.get("default-name").as_str()
    }

    /// Whether the `sfp-*` readings of this interface are meaningful
    pub fn is_sfp(&self) -> bool {
        self.default_name().is_some_and(|n| n.contains("sfp"))
    }

    /// Link state from the ethernet monitor. Anything other than `no-link`
    /// counts as up.
    pub fn link_up(&self) -> bool {
        self.0.get("status").as_str() != Some("no-link")
    }

    /// Negotiated rate in Mbps, `None` when the device did not report one
    pub fn rate_mbps(&self) -> Option<Result<f64, DecodeError>> {
        match self.0.get("rate") {
            CoercedValue::Absent => None,
            CoercedValue::Number(n) => Some(Ok(*n)),
            other => Some(parse_rate_mbps(&other.to_string())),
        }
    }

    /// Numeric field, `0.0` when missing or non-numeric
    pub fn number_or_zero(&self, key: &str) -> f64 {
        self.0.get(key).as_f64().unwrap_or(0.0)
    }
}

impl Deref for InterfaceRecord {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.0
    }
}

/// Non-fatal inconsistency between the interface listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthMismatch {
    /// Entity count per source, in [`InterfaceSource::ALL`] order
    pub lengths: [usize; 4],
    /// Number of interfaces actually merged
    pub merged: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "interface listings differ in length (")?;
        for (i, (source, len)) in InterfaceSource::ALL.iter().zip(self.lengths).enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", source, len)?;
        }
        write!(f, "); merged first {}", self.merged)
    }
}

/// Result of merging the interface listings
#[derive(Debug, Clone, Default)]
pub struct InterfaceMerge {
    pub interfaces: Vec<InterfaceRecord>,
    pub mismatch: Option<LengthMismatch>,
}

/// Merge the four listings positionally.
///
/// Index `i` of every listing describes the same interface because the
/// device issues all four commands over the same `[find]` selection; there
/// is no shared key to join on. If the lengths disagree, only the common
/// prefix is merged and the mismatch is reported.
pub fn merge_interfaces(sources: [Vec<Record>; 4]) -> InterfaceMerge {
    let lengths = sources.each_ref().map(Vec::len);
    let merged = lengths.iter().copied().min().unwrap_or(0);

    let mismatch = if lengths.iter().any(|&len| len != merged) {
        let mismatch = LengthMismatch { lengths, merged };
        warn!(%mismatch, "Interface listings are not aligned");
        Some(mismatch)
    } else {
        None
    };

    let mut iters = sources.map(Vec::into_iter);
    let mut interfaces = Vec::with_capacity(merged);
    for _ in 0..merged {
        let mut record = Record::new();
        for iter in iters.iter_mut() {
            if let Some(next) = iter.next() {
                record.merge_from(next);
            }
        }
        interfaces.push(InterfaceRecord(record));
    }

    InterfaceMerge {
        interfaces,
        mismatch,
    }
}
