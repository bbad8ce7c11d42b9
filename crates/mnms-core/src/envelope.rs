//! The eight-section telemetry envelope
//!
//! A device reports by running eight CLI listings, converting each result
//! to a string and joining them with [`SECTION_SEPARATOR`]. The order is
//! fixed and given by [`Section::ALL`].

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::device::DeviceFacts;
use crate::error::DecodeError;
use crate::health::reduce_health;
use crate::interface::{merge_interfaces, InterfaceRecord, LengthMismatch};
use crate::record::Record;
use crate::section::split_section;

/// Literal joining the sections of an envelope
pub const SECTION_SEPARATOR: &str = "|~*%|";

/// Number of sections in a well-formed envelope
pub const SECTION_COUNT: usize = 8;

/// One listing carried by the envelope, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    InterfaceTraffic,
    InterfaceList,
    EthernetMonitor,
    EthernetList,
    Health,
    Resources,
    Routerboard,
    Identity,
}

impl Section {
    pub const ALL: [Section; SECTION_COUNT] = [
        Self::InterfaceTraffic,
        Self::InterfaceList,
        Self::EthernetMonitor,
        Self::EthernetList,
        Self::Health,
        Self::Resources,
        Self::Routerboard,
        Self::Identity,
    ];

    /// RouterOS command whose `as-value` output fills this section
    pub fn command(&self) -> &'static str {
        match self {
            Self::InterfaceTraffic => "interface/monitor-traffic [find] as-value once",
            Self::InterfaceList => "interface/print from=[find] as-value",
            Self::EthernetMonitor => "interface/ethernet/monitor [find] as-value once",
            Self::EthernetList => {
                "interface/ethernet/print from=[find] proplist=default-name as-value"
            }
            Self::Health => "system/health/print as-value detail",
            Self::Resources => "system/resource/print as-value",
            Self::Routerboard => "system/routerboard/print as-value",
            Self::Identity => "system/identity/print as-value",
        }
    }

    /// Whether the listing holds several `.id`-delimited entities rather
    /// than a single record
    pub fn is_listing(&self) -> bool {
        !matches!(self, Self::Resources | Self::Routerboard | Self::Identity)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InterfaceTraffic => "interface-traffic",
            Self::InterfaceList => "interface-list",
            Self::EthernetMonitor => "ethernet-monitor",
            Self::EthernetList => "ethernet-list",
            Self::Health => "health",
            Self::Resources => "resources",
            Self::Routerboard => "routerboard",
            Self::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// Non-fatal anomaly found while decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeWarning {
    InterfaceLengthMismatch(LengthMismatch),
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterfaceLengthMismatch(m) => m.fmt(f),
        }
    }
}

/// Decoded content of one device report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEnvelope {
    pub interfaces: Vec<InterfaceRecord>,
    pub device: DeviceFacts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<DecodeWarning>,
}

/// Split a payload into its eight raw sections without decoding them
pub fn split_envelope(payload: &str) -> Result<[&str; SECTION_COUNT], DecodeError> {
    let parts: Vec<&str> = payload.split(SECTION_SEPARATOR).collect();
    let found = parts.len();
    parts
        .try_into()
        .map_err(|_| DecodeError::MalformedEnvelope {
            expected: SECTION_COUNT,
            found,
        })
}

/// Join eight raw sections into a payload, as the device-side script does
pub fn encode_envelope(sections: &[&str; SECTION_COUNT]) -> String {
    sections.join(SECTION_SEPARATOR)
}

/// Decode a full device payload.
///
/// Only a wrong section count is fatal; every field-level oddity degrades
/// into `Absent` or text values, and listing misalignment becomes a
/// warning on the result.
pub fn decode_envelope(payload: &str) -> Result<TelemetryEnvelope, DecodeError> {
    let [traffic, interfaces, ethernet_monitor, ethernet_list, health, resources, routerboard, identity] =
        split_envelope(payload)?;

    let merge = merge_interfaces([
        split_section(traffic),
        split_section(interfaces),
        split_section(ethernet_monitor),
        split_section(ethernet_list),
    ]);

    let health = reduce_health(split_section(health));
    let device = DeviceFacts::project(
        &health,
        &Record::tokenize(resources),
        &Record::tokenize(routerboard),
        &Record::tokenize(identity),
    );

    let warnings = merge
        .mismatch
        .into_iter()
        .map(DecodeWarning::InterfaceLengthMismatch)
        .collect();

    debug!(
        interfaces = merge.interfaces.len(),
        bytes = payload.len(),
        "Decoded telemetry envelope"
    );

    Ok(TelemetryEnvelope {
        interfaces: merge.interfaces,
        device,
        warnings,
    })
}
