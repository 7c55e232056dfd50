//! Resource namespaces for the OpenChirp API.

mod device;
mod location;

pub use device::DeviceResource;
pub use location::LocationResource;
