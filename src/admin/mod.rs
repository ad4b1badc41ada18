pub mod client;
pub mod endpoints;

pub use client::{AdminApi, AdminApiClient, AdminResponse};
pub use endpoints::{AdminSession, GATEWAYS_PATH, LISTENERS_PATH, NODES_PATH};
