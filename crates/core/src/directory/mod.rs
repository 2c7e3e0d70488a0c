//! Nexus directory synchronization

pub mod change_tracker;
pub mod commit_queue;
pub mod ports;
pub mod service;

pub use change_tracker::ChangeTracker;
pub use commit_queue::CommitQueue;
pub use service::DirectorySyncService;
