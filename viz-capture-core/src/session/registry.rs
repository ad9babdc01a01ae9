use std::collections::BTreeMap;

use crate::models::audio_models::{
    DeviceDescriptor, EndpointInfo, DEFAULT_DEVICE_NAME, DEFAULT_ORDINAL,
};
use crate::traits::backend::CaptureBackend;

/// An immutable device enumeration snapshot.
///
/// Real endpoints are assigned ordinals `0..real_count` in the order the
/// backend listed them; the synthetic "system default output, loopback"
/// entry always resolves at ordinal −1, even when enumeration fails or
/// returns zero real devices. Ordinals are only meaningful against the
/// snapshot that produced them.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceSnapshot {
    pub fn from_endpoints(endpoints: Vec<EndpointInfo>) -> Self {
        let devices = endpoints
            .into_iter()
            .enumerate()
            .map(|(i, ep)| DeviceDescriptor {
                ordinal: i as i32,
                display_name: ep.display_name,
                direction: ep.direction,
            })
            .collect();
        Self { devices }
    }

    /// Take a fresh snapshot from the backend's endpoint listing.
    ///
    /// Enumeration is a pure query; a failed enumeration is logged and
    /// degrades to a snapshot holding only the synthetic default entry, so
    /// the engine always has at least one selectable target.
    pub fn capture<B: CaptureBackend>(backend: &mut B) -> Self {
        match backend.list_endpoints() {
            Ok(endpoints) => Self::from_endpoints(endpoints),
            Err(e) => {
                log::warn!("{}; falling back to default loopback only", e);
                Self::default()
            }
        }
    }

    /// Number of real devices (the synthetic entry not included).
    pub fn real_count(&self) -> usize {
        self.devices.len()
    }

    /// Resolve an ordinal against this snapshot.
    ///
    /// −1 always resolves to the synthetic default descriptor; anything
    /// out of range means the device vanished since it was selected.
    pub fn resolve(&self, ordinal: i32) -> Option<DeviceDescriptor> {
        if ordinal == DEFAULT_ORDINAL {
            return Some(DeviceDescriptor::default_loopback());
        }
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.devices.get(i))
            .cloned()
    }

    /// Ordinal → display name for every selectable target, default included.
    pub fn names(&self) -> BTreeMap<i32, String> {
        let mut names: BTreeMap<i32, String> = self
            .devices
            .iter()
            .map(|d| (d.ordinal, d.display_name.clone()))
            .collect();
        names.insert(DEFAULT_ORDINAL, DEFAULT_DEVICE_NAME.into());
        names
    }
}

/// Cyclic successor of `current` over the closed range `[-1, real_count − 1]`.
///
/// With no real devices the only selectable ordinal is −1, so the cycle is
/// a fixed point there.
pub fn next_ordinal(current: i32, real_count: usize) -> i32 {
    if current + 1 >= real_count as i32 {
        DEFAULT_ORDINAL
    } else {
        current + 1
    }
}
