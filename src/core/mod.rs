pub mod error;
pub mod types;
pub mod value;

pub use error::{CrudError, ErrorKind, FieldError, Result, ValidationErrors};
pub use types::{
    CREATED_AT, DELETED_AT, HIDDEN_FIELDS, ID, READ_ONLY_FIELDS, Row,
    UPDATED_AT, VERSION, is_read_only,
};
pub use value::{ReferenceValue, Value};
