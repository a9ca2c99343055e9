//! The storage-agnostic data access contract and the pieces every backend
//! shares: filters, write-time validation and the file collaborator.

pub mod access;
pub mod factory;
pub mod file;
pub mod filter;
pub mod validation;

pub use access::DataAccess;
pub use factory::DataFactory;
pub use file::{FileProcessor, FileRequest, FileResponse, NullFileProcessor, UploadedFile};
pub use filter::{Condition, Filter, FilterOperator};
