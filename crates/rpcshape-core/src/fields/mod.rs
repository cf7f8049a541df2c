mod path;
mod request;
mod types;
mod union;
mod processor;

pub use path::FieldPath;
pub use request::FieldNode;
pub use types::*;
pub use processor::FieldsProcessor;
