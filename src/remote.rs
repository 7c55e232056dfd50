//! [`RemoteClient`] backed by the OpenChirp REST API.

use chirp_fs::remote::{DeviceDescriptor, LocationDescriptor, RemoteClient, RemoteError};
use openchirp::OpenChirp;
use openchirp::models::{Device, Location};

/// Serves the namespace from a live OpenChirp deployment.
#[derive(Debug, Clone)]
pub struct ChirpRemote(OpenChirp);

impl ChirpRemote {
    pub fn new(client: OpenChirp) -> Self {
        Self(client)
    }
}

fn location_descriptor(location: Location) -> LocationDescriptor {
    LocationDescriptor {
        id: location.id,
        name: location.name,
        children: location.children,
    }
}

fn device_descriptor(device: Device) -> DeviceDescriptor {
    DeviceDescriptor {
        id: device.id,
        name: device.name,
        owner_name: device.owner.name,
        owner_email: device.owner.email,
    }
}

impl RemoteClient for ChirpRemote {
    async fn fetch_location(&self, id: &str) -> Result<LocationDescriptor, RemoteError> {
        self.0
            .location(id)
            .get()
            .await
            .map(location_descriptor)
            .map_err(RemoteError::new)
    }

    async fn fetch_location_devices(&self, id: &str) -> Result<Vec<DeviceDescriptor>, RemoteError> {
        let devices = self
            .0
            .location(id)
            .devices()
            .await
            .map_err(RemoteError::new)?;
        Ok(devices.into_iter().map(device_descriptor).collect())
    }

    async fn fetch_device_info(&self, id: &str) -> Result<DeviceDescriptor, RemoteError> {
        self.0
            .device(id)
            .get()
            .await
            .map(device_descriptor)
            .map_err(RemoteError::new)
    }
}

#[cfg(test)]
mod tests {
    use openchirp::models::Owner;

    use super::*;

    #[test]
    fn device_owner_is_flattened() {
        let descriptor = device_descriptor(Device {
            id: "abc123".to_owned(),
            name: "Temp01".to_owned(),
            owner: Owner {
                name: "Alice".to_owned(),
                email: "a@x.com".to_owned(),
            },
        });
        assert_eq!(descriptor.owner_name, "Alice");
        assert_eq!(descriptor.owner_email, "a@x.com");
    }
}
