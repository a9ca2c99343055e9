//! Storage backends implementing the data access contract.

pub mod memory;

pub use memory::{MemoryDataAccess, MemoryDataFactory, MemoryStore};
