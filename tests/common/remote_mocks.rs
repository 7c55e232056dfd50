#![allow(missing_docs, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chirp_fs::remote::{DeviceDescriptor, LocationDescriptor, RemoteClient, RemoteError};

/// Which remote call a counter refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Location,
    LocationDevices,
    DeviceInfo,
}

/// Canned remote data plus per-call counters and failure switches.
#[derive(Debug, Default)]
pub struct MockRemoteState {
    /// `location_id -> descriptor`
    pub locations: HashMap<String, LocationDescriptor>,
    /// `location_id -> devices placed directly in it`
    pub devices: HashMap<String, Vec<DeviceDescriptor>>,
    /// `device_id -> detailed descriptor`
    pub device_info: HashMap<String, DeviceDescriptor>,
    /// Artificial latency added to every call, to make concurrent callers overlap.
    pub latency: Option<Duration>,
    calls: Mutex<HashMap<(Call, String), usize>>,
    failing: Mutex<HashSet<(Call, String)>>,
}

impl MockRemoteState {
    /// Add a location with the given ordered child ids.
    pub fn location(mut self, id: &str, name: &str, children: &[&str]) -> Self {
        self.locations.insert(
            id.to_owned(),
            LocationDescriptor {
                id: id.to_owned(),
                name: name.to_owned(),
                children: children.iter().map(|c| (*c).to_owned()).collect(),
            },
        );
        self
    }

    /// Add a device to the end of a location's device listing.
    pub fn device(mut self, location: &str, id: &str, name: &str, owner: &str, email: &str) -> Self {
        let descriptor = DeviceDescriptor {
            id: id.to_owned(),
            name: name.to_owned(),
            owner_name: owner.to_owned(),
            owner_email: email.to_owned(),
        };
        self.devices
            .entry(location.to_owned())
            .or_default()
            .push(descriptor.clone());
        self.device_info.insert(id.to_owned(), descriptor);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

/// A clonable, fetch-counting `RemoteClient`.
#[derive(Debug, Clone)]
pub struct MockRemote {
    pub state: Arc<MockRemoteState>,
}

impl MockRemote {
    pub fn new(state: MockRemoteState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// How many times `call` was issued for `id`.
    pub fn calls(&self, call: Call, id: &str) -> usize {
        self.state
            .calls
            .lock()
            .unwrap()
            .get(&(call, id.to_owned()))
            .copied()
            .unwrap_or(0)
    }

    /// Total number of calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.state.calls.lock().unwrap().values().sum()
    }

    /// Make every subsequent `call` for `id` fail until [`heal`](Self::heal) is called.
    pub fn fail(&self, call: Call, id: &str) {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert((call, id.to_owned()));
    }

    pub fn heal(&self, call: Call, id: &str) {
        self.state
            .failing
            .lock()
            .unwrap()
            .remove(&(call, id.to_owned()));
    }

    async fn record(&self, call: Call, id: &str) -> Result<(), RemoteError> {
        *self
            .state
            .calls
            .lock()
            .unwrap()
            .entry((call, id.to_owned()))
            .or_default() += 1;

        if let Some(latency) = self.state.latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self
            .state
            .failing
            .lock()
            .unwrap()
            .contains(&(call, id.to_owned()));
        if failing {
            return Err(RemoteError::new(format!("{call:?} {id} unavailable")));
        }
        Ok(())
    }
}

impl RemoteClient for MockRemote {
    async fn fetch_location(&self, id: &str) -> Result<LocationDescriptor, RemoteError> {
        self.record(Call::Location, id).await?;
        self.state
            .locations
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("location {id} does not exist")))
    }

    async fn fetch_location_devices(&self, id: &str) -> Result<Vec<DeviceDescriptor>, RemoteError> {
        self.record(Call::LocationDevices, id).await?;
        Ok(self.state.devices.get(id).cloned().unwrap_or_default())
    }

    async fn fetch_device_info(&self, id: &str) -> Result<DeviceDescriptor, RemoteError> {
        self.record(Call::DeviceInfo, id).await?;
        self.state
            .device_info
            .get(id)
            .cloned()
            .ok_or_else(|| RemoteError::new(format!("device {id} does not exist")))
    }
}
