//! The seam between the namespace cache and whatever serves the location graph.

use std::future::Future;

use thiserror::Error;

/// An opaque failure from the remote service.
///
/// The namespace never inspects it beyond logging; callers only learn that the fetch failed.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct RemoteError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl RemoteError {
    /// Wrap any error type.
    pub fn new<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self(error.into())
    }
}

/// A location as described by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationDescriptor {
    /// Remote identity.
    pub id: String,
    /// Display name, not necessarily unique among siblings.
    pub name: String,
    /// Ids of the direct sub-locations, in remote order.
    pub children: Vec<String>,
}

/// A device as described by the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Remote identity.
    pub id: String,
    /// Display name, not necessarily unique among siblings.
    pub name: String,
    /// Name of the owning user.
    pub owner_name: String,
    /// Email of the owning user.
    pub owner_email: String,
}

/// Read access to a remote location graph.
///
/// Implementations are shared by every concurrent request and must be safe to call from many
/// tasks at once.
pub trait RemoteClient: Send + Sync + 'static {
    /// Fetch one location, including the ids of its sub-locations.
    fn fetch_location(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<LocationDescriptor, RemoteError>> + Send;

    /// Fetch the devices placed directly inside a location.
    fn fetch_location_devices(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Vec<DeviceDescriptor>, RemoteError>> + Send;

    /// Fetch the detailed descriptor of one device.
    fn fetch_device_info(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<DeviceDescriptor, RemoteError>> + Send;
}
