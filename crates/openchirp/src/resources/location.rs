//! Location resource.

use crate::client::OpenChirp;
use crate::error::Error;
use crate::models::{Device, Location};

/// Operations on one location.
pub struct LocationResource<'c> {
    client: &'c OpenChirp,
    id: String,
}

impl<'c> LocationResource<'c> {
    pub(crate) fn new(client: &'c OpenChirp, id: String) -> Self {
        Self { client, id }
    }

    /// Fetch the location descriptor, including its child ids.
    pub async fn get(&self) -> Result<Location, Error> {
        let path = format!("location/{}", self.id);
        self.client.get(&path, &[]).await
    }

    /// Fetch the devices placed directly in this location (not in sub-locations).
    pub async fn devices(&self) -> Result<Vec<Device>, Error> {
        let path = format!("location/{}/devices", self.id);
        self.client.get(&path, &[("recursive", "false")]).await
    }
}
