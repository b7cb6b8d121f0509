//! 设备注册表
//!
//! Maps swarm-local ids to radio handles. Populated once per discovery and
//! read-only afterwards; callers publish a whole new registry instead of
//! mutating a shared one.

use crate::{DeviceId, RemoteHandle};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, RemoteHandle>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from discovery results, assigning ids `1, 2, ...`
    /// in discovery order. Handles beyond the id range are dropped.
    pub fn from_discovered(handles: impl IntoIterator<Item = RemoteHandle>) -> Self {
        let mut registry = Self::new();
        for handle in handles {
            if registry.register(handle).is_none() {
                break;
            }
        }
        registry
    }

    /// Register a handle under the next free id.
    pub fn register(&mut self, handle: RemoteHandle) -> Option<DeviceId> {
        let next = self.devices.keys().next_back().map_or(1, |id| id.get().saturating_add(1));
        let id = DeviceId::new(next)?;
        debug!("Registered {} as {}", handle, id);
        self.devices.insert(id, handle);
        Some(id)
    }

    /// Register a handle under an explicit id, replacing any previous entry.
    pub fn insert(&mut self, id: DeviceId, handle: RemoteHandle) -> Option<RemoteHandle> {
        self.devices.insert(id, handle)
    }

    pub fn get(&self, id: DeviceId) -> Option<&RemoteHandle> {
        self.devices.get(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    /// Devices in id order.
    pub fn iter(&self) -> impl Iterator<Item = (DeviceId, &RemoteHandle)> {
        self.devices.iter().map(|(id, h)| (*id, h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(n: u64) -> RemoteHandle {
        RemoteHandle::new(0x0013_A200_0000_0000 + n, format!("SMART{:02}", n * 7))
    }

    #[test]
    fn test_ids_assigned_in_discovery_order() {
        let registry = DeviceRegistry::from_discovered([handle(1), handle(2), handle(3)]);
        let ids: Vec<u8> = registry.ids().map(DeviceId::get).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        // node id digits ("SMART14") play no part in the id
        assert_eq!(registry.get(DeviceId::new(2).unwrap()), Some(&handle(2)));
    }

    #[test]
    fn test_register_after_explicit_insert() {
        let mut registry = DeviceRegistry::new();
        registry.insert(DeviceId::new(10).unwrap(), handle(1));
        let id = registry.register(handle(2)).unwrap();
        assert_eq!(id.get(), 11);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_id() {
        let registry = DeviceRegistry::from_discovered([handle(1)]);
        assert!(!registry.contains(DeviceId::new(5).unwrap()));
        assert!(registry.get(DeviceId::new(5).unwrap()).is_none());
    }
}
