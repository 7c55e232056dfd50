//! Response models.
//!
//! The API carries many more fields than these; unknown fields are ignored.

use serde::Deserialize;

/// A location node together with the ids of its direct sub-locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Location {
    /// Opaque location id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name of the location.
    #[serde(default)]
    pub name: String,
    /// Ids of the direct children, in the order the API returns them.
    #[serde(default)]
    pub children: Vec<String>,
}

/// The owner of a device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Owner {
    /// Owner display name.
    #[serde(default)]
    pub name: String,
    /// Owner email address.
    #[serde(default)]
    pub email: String,
}

/// A device as returned by both the location device listing and the device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Device {
    /// Opaque device id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name of the device.
    #[serde(default)]
    pub name: String,
    /// The user owning the device.
    #[serde(default)]
    pub owner: Owner,
}
