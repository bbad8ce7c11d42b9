//! Device registry and enrollment keys
//!
//! Persistence is a collaborator of the decoder, so the daemon only talks
//! to these traits. The in-memory implementations back the default daemon
//! and the tests.

use chrono::{DateTime, Utc};
use mnms_core::{DeviceFacts, InterfaceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EnrollmentKeyConfig;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Device not found: {0}")]
    NotFound(Uuid),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A registered device with its latest facts and interfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub serial: String,
    pub facts: DeviceFacts,
    pub interfaces: Vec<InterfaceRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage-write capability used by the routes
pub trait DeviceStore: Send + Sync {
    /// Return the device registered under `serial`, registering it with
    /// `facts` and `interfaces` if there is none. The lookup and the insert
    /// are atomic, so one serial never maps to two devices. The flag is
    /// true when the device was created by this call.
    fn find_or_create(
        &self,
        serial: &str,
        facts: DeviceFacts,
        interfaces: Vec<InterfaceRecord>,
    ) -> Result<(DeviceRecord, bool), StoreError>;

    /// Replace facts and interfaces of an existing device
    fn update(
        &self,
        id: Uuid,
        facts: DeviceFacts,
        interfaces: Vec<InterfaceRecord>,
    ) -> Result<DeviceRecord, StoreError>;

    fn get(&self, id: Uuid) -> Result<Option<DeviceRecord>, StoreError>;

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError>;
}

/// Device registry held in memory
#[derive(Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<HashMap<Uuid, DeviceRecord>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<Uuid, DeviceRecord>>, StoreError> {
        self.devices
            .read()
            .map_err(|_| StoreError::Backend("device registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<Uuid, DeviceRecord>>, StoreError> {
        self.devices
            .write()
            .map_err(|_| StoreError::Backend("device registry lock poisoned".to_string()))
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn find_or_create(
        &self,
        serial: &str,
        facts: DeviceFacts,
        interfaces: Vec<InterfaceRecord>,
    ) -> Result<(DeviceRecord, bool), StoreError> {
        let mut devices = self.write()?;
        if let Some(existing) = devices.values().find(|d| d.serial == serial) {
            return Ok((existing.clone(), false));
        }

        let now = Utc::now();
        let record = DeviceRecord {
            id: Uuid::new_v4(),
            serial: serial.to_string(),
            facts,
            interfaces,
            created_at: now,
            updated_at: now,
        };
        devices.insert(record.id, record.clone());
        info!(device = %record.id, serial = %serial, "Registered device");
        Ok((record, true))
    }

    fn update(
        &self,
        id: Uuid,
        facts: DeviceFacts,
        interfaces: Vec<InterfaceRecord>,
    ) -> Result<DeviceRecord, StoreError> {
        let mut devices = self.write()?;
        let record = devices.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.facts = facts;
        record.interfaces = interfaces;
        record.updated_at = Utc::now();
        debug!(device = %id, interfaces = record.interfaces.len(), "Updated device");
        Ok(record.clone())
    }

    fn get(&self, id: Uuid) -> Result<Option<DeviceRecord>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn list(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let mut list: Vec<DeviceRecord> = self.read()?.values().cloned().collect();
        list.sort_by_key(|d| d.created_at);
        Ok(list)
    }
}

/// Why an enrollment key was refused. The messages are shown verbatim to
/// whoever pastes the enrollment command on the router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Unauthorized")]
    Unknown,
    #[error("Expired key, extend the duration or generate a new token from your controller")]
    Expired,
    #[error("Record limit exceeded, expand the limit or generate a new token from your controller")]
    LimitExceeded,
}

/// Enrollment key checks
pub trait KeyStore: Send + Sync {
    /// Validate a key and use up one enrollment from its budget
    fn consume(&self, key_id: &str) -> Result<(), KeyError>;
}

#[derive(Debug, Clone)]
struct KeyEntry {
    remaining: Option<u32>,
    expires_at: Option<DateTime<Utc>>,
}

/// Enrollment keys held in memory, seeded from configuration
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: Mutex<HashMap<String, KeyEntry>>,
}

impl MemoryKeyStore {
    pub fn from_config(keys: &[EnrollmentKeyConfig]) -> Self {
        let keys = keys
            .iter()
            .map(|k| {
                (
                    k.id.clone(),
                    KeyEntry {
                        remaining: k.max_devices,
                        expires_at: k.expires_at,
                    },
                )
            })
            .collect();
        Self {
            keys: Mutex::new(keys),
        }
    }
}

impl KeyStore for MemoryKeyStore {
    fn consume(&self, key_id: &str) -> Result<(), KeyError> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = keys.get_mut(key_id).ok_or(KeyError::Unknown)?;

        if entry.expires_at.is_some_and(|exp| Utc::now() > exp) {
            return Err(KeyError::Expired);
        }

        match entry.remaining.as_mut() {
            Some(0) => return Err(KeyError::LimitExceeded),
            Some(n) => *n -= 1,
            None => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mnms_core::{CoercedValue, Record};
    use std::sync::Arc;

    fn facts(name: &str) -> DeviceFacts {
        DeviceFacts {
            name: CoercedValue::Text(name.to_string()),
            ..DeviceFacts::default()
        }
    }

    #[test]
    fn test_find_or_create_by_serial() {
        let store = MemoryDeviceStore::new();
        let (created, new) = store.find_or_create("ABC123", facts("r1"), Vec::new()).unwrap();
        assert!(new);

        let (found, new) = store.find_or_create("ABC123", facts("r2"), Vec::new()).unwrap();
        assert!(!new);
        assert_eq!(found.id, created.id);
        // The first registration is kept
        assert_eq!(found.facts.name, CoercedValue::Text("r1".to_string()));

        let (other, new) = store.find_or_create("XYZ789", facts("r3"), Vec::new()).unwrap();
        assert!(new);
        assert_ne!(other.id, created.id);
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_registration_of_one_serial() {
        let store = Arc::new(MemoryDeviceStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .find_or_create("ABC123", facts(&format!("r{i}")), Vec::new())
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<(DeviceRecord, bool)> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, new)| *new).count(), 1);
        assert!(results.iter().all(|(d, _)| d.id == results[0].0.id));
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_poisoned_registry_reports_backend_error() {
        let store = Arc::new(MemoryDeviceStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.devices.write().unwrap();
            panic!("poison the registry");
        })
        .join();

        assert!(matches!(store.list(), Err(StoreError::Backend(_))));
        assert!(matches!(
            store.find_or_create("ABC123", DeviceFacts::default(), Vec::new()),
            Err(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_update_replaces_facts_and_interfaces() {
        let store = MemoryDeviceStore::new();
        let (created, _) = store.find_or_create("ABC123", facts("r1"), Vec::new()).unwrap();

        let iface = InterfaceRecord::from_record(Record::tokenize("id=*1;name=ether1;"));
        let updated = store.update(created.id, facts("r1-renamed"), vec![iface]).unwrap();
        assert_eq!(updated.facts.name, CoercedValue::Text("r1-renamed".to_string()));
        assert_eq!(updated.interfaces.len(), 1);
        assert!(updated.updated_at >= created.updated_at);

        let stored = store.get(created.id).unwrap().unwrap();
        assert_eq!(stored.interfaces.len(), 1);
    }

    #[test]
    fn test_update_unknown_device() {
        let store = MemoryDeviceStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.update(id, DeviceFacts::default(), Vec::new()),
            Err(StoreError::NotFound(missing)) if missing == id
        ));
    }

    #[test]
    fn test_key_budget() {
        let keys = MemoryKeyStore::from_config(&[EnrollmentKeyConfig {
            id: "site-a".to_string(),
            max_devices: Some(2),
            expires_at: None,
        }]);
        assert_eq!(keys.consume("site-a"), Ok(()));
        assert_eq!(keys.consume("site-a"), Ok(()));
        assert_eq!(keys.consume("site-a"), Err(KeyError::LimitExceeded));
        assert_eq!(keys.consume("site-b"), Err(KeyError::Unknown));
    }

    #[test]
    fn test_unlimited_and_expired_keys() {
        let keys = MemoryKeyStore::from_config(&[
            EnrollmentKeyConfig {
                id: "open".to_string(),
                max_devices: None,
                expires_at: Some(Utc::now() + Duration::hours(1)),
            },
            EnrollmentKeyConfig {
                id: "old".to_string(),
                max_devices: None,
                expires_at: Some(Utc::now() - Duration::hours(1)),
            },
        ]);
        for _ in 0..10 {
            assert_eq!(keys.consume("open"), Ok(()));
        }
        assert_eq!(keys.consume("old"), Err(KeyError::Expired));
    }
}
