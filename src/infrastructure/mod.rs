//! Infrastructure layer - Storage backends, network access and observability

pub mod cache;
pub mod logging;
pub mod network;
pub mod observability;
