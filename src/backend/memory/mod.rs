//! A process-local backend: tables of rows behind one async lock.

pub mod access;
pub mod change;
pub mod factory;
pub mod store;
pub mod table;

pub use access::MemoryDataAccess;
pub use change::{Change, ChangeSet};
pub use factory::MemoryDataFactory;
pub use store::MemoryStore;
pub use table::{Table, TableSchema};
