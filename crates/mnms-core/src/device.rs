//! Device facts projected from the system listings

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::value::CoercedValue;

/// Canonical per-device facts.
///
/// Every field is a plain lookup into one of the flattened system listings;
/// fields the device did not report are `Absent`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFacts {
    /// System identity (`/system/identity`)
    pub name: CoercedValue,
    /// RouterBOARD serial number
    pub serial: CoercedValue,
    /// Supply voltage (V)
    pub voltage: CoercedValue,
    /// Board temperature (C)
    pub temperature: CoercedValue,
    pub architecture_name: CoercedValue,
    pub board_name: CoercedValue,
    pub build_time: CoercedValue,
    pub cpu: CoercedValue,
    pub cpu_count: CoercedValue,
    /// MHz
    pub cpu_frequency: CoercedValue,
    /// Percent
    pub cpu_load: CoercedValue,
    pub free_hdd_space: CoercedValue,
    pub free_memory: CoercedValue,
    pub platform: CoercedValue,
    pub total_hdd_space: CoercedValue,
    pub total_memory: CoercedValue,
    pub uptime: CoercedValue,
    /// RouterOS version string
    pub version: CoercedValue,
    pub write_sect_since_reboot: CoercedValue,
    pub write_sect_total: CoercedValue,
    pub current_firmware: CoercedValue,
    pub factory_firmware: CoercedValue,
    pub firmware_type: CoercedValue,
    pub model: CoercedValue,
    pub routerboard: CoercedValue,
}

impl DeviceFacts {
    /// Map raw RouterOS field names onto the canonical schema.
    ///
    /// `health` is the output of [`crate::health::reduce_health`]; the other
    /// three are tokenized single-record listings.
    pub fn project(health: &Record, resources: &Record, routerboard: &Record, identity: &Record) -> Self {
        Self {
            name: identity.get("name").clone(),
            serial: routerboard.get("serial-number").clone(),
            voltage: health.get("voltage").clone(),
            temperature: health.get("temperature").clone(),
            architecture_name: resources.get("architecture-name").clone(),
            board_name: resources.get("board-name").clone(),
            build_time: resources.get("build-time").clone(),
            cpu: resources.get("cpu").clone(),
            cpu_count: resources.get("cpu-count").clone(),
            cpu_frequency: resources.get("cpu-frequency").clone(),
            cpu_load: resources.get("cpu-load").clone(),
            free_hdd_space: resources.get("free-hdd-space").clone(),
            free_memory: resources.get("free-memory").clone(),
            platform: resources.get("platform").clone(),
            total_hdd_space: resources.get("total-hdd-space").clone(),
            total_memory: resources.get("total-memory").clone(),
            uptime: resources.get("uptime").clone(),
            version: resources.get("version").clone(),
            write_sect_since_reboot: resources.get("write-sect-since-reboot").clone(),
            write_sect_total: resources.get("write-sect-total").clone(),
            current_firmware: routerboard.get("current-firmware").clone(),
            factory_firmware: routerboard.get("factory-firmware").clone(),
            firmware_type: routerboard.get("firmware-type").clone(),
            model: routerboard.get("model").clone(),
            routerboard: routerboard.get("routerboard").clone(),
        }
    }

    /// Serial number as a lookup key.
    ///
    /// All-digit serials are coerced to numbers on the way in, so this
    /// renders them back without a fractional part.
    pub fn serial_text(&self) -> Option<String> {
        self.serial.to_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_renames_fields() {
        let health = Record::tokenize("voltage=24.1;temperature=41;");
        let resources = Record::tokenize(
            "architecture-name=arm64;board-name=CCR2004-1G-12S+2XS;cpu-load=3;total-memory=4294967296;uptime=1w2d03:04:05;version=7.15.3 (stable);",
        );
        let routerboard = Record::tokenize(
            "serial-number=HEF08AB1CDE;model=CCR2004-1G-12S+2XS;routerboard=true;current-firmware=7.15.3;",
        );
        let identity = Record::tokenize("name=core-router;");

        let facts = DeviceFacts::project(&health, &resources, &routerboard, &identity);
        assert_eq!(facts.name, CoercedValue::Text("core-router".to_string()));
        assert_eq!(facts.serial, CoercedValue::Text("HEF08AB1CDE".to_string()));
        assert_eq!(facts.voltage, CoercedValue::Number(24.1));
        assert_eq!(facts.temperature, CoercedValue::Number(41.0));
        assert_eq!(facts.architecture_name, CoercedValue::Text("arm64".to_string()));
        assert_eq!(facts.cpu_load, CoercedValue::Number(3.0));
        assert_eq!(facts.total_memory, CoercedValue::Number(4294967296.0));
        assert_eq!(facts.routerboard, CoercedValue::Bool(true));
        assert_eq!(facts.version, CoercedValue::Text("7.15.3 (stable)".to_string()));
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let empty = Record::new();
        let facts = DeviceFacts::project(&empty, &empty, &empty, &empty);
        assert_eq!(facts, DeviceFacts::default());
        assert!(facts.serial.is_absent());
        assert_eq!(facts.serial_text(), None);
    }

    #[test]
    fn test_numeric_serial_key() {
        let routerboard = Record::tokenize("serial-number=8123456;");
        let empty = Record::new();
        let facts = DeviceFacts::project(&empty, &empty, &routerboard, &empty);
        assert_eq!(facts.serial_text().as_deref(), Some("8123456"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let resources = Record::tokenize("board-name=hAP ax3;");
        let empty = Record::new();
        let facts = DeviceFacts::project(&empty, &resources, &empty, &empty);
        let json = serde_json::to_value(&facts).unwrap();
        assert_eq!(json["boardName"], "hAP ax3");
        assert!(json["writeSectTotal"].is_null());
    }
}
