//! Collaborator and writer implementations
//!
//! In-process stand-ins for the network and the local store, plus the
//! pass-through and manifest writers used to finish a pipeline.

mod log;
mod manifest;
mod memory;
mod network;

pub use self::log::LogWriter;
pub use self::manifest::ManifestWriter;
pub use self::memory::MemoryStore;
pub use self::network::SimulatedNetwork;
