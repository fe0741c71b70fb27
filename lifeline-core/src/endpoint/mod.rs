//! Backend endpoint selection

pub mod registry;

pub use registry::{Endpoint, EndpointRegistry, EndpointSnapshot};
