//! Device resource.

use crate::client::OpenChirp;
use crate::error::Error;
use crate::models::Device;

/// Operations on one device.
pub struct DeviceResource<'c> {
    client: &'c OpenChirp,
    id: String,
}

impl<'c> DeviceResource<'c> {
    pub(crate) fn new(client: &'c OpenChirp, id: String) -> Self {
        Self { client, id }
    }

    /// Fetch the full device descriptor.
    pub async fn get(&self) -> Result<Device, Error> {
        let path = format!("device/{}", self.id);
        self.client.get(&path, &[]).await
    }
}
