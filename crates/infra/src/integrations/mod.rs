//! External service integrations

pub mod matomo;
pub mod nexus;

pub use matomo::MatomoClient;
pub use nexus::NexusClient;
