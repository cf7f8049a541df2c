//! Field selection, load planning and result extraction for typed RPC actions

pub mod error;
pub mod executor;
pub mod extract;
pub mod fields;
pub mod formatter;
pub mod introspect;
pub mod pipeline;
pub mod registry;
pub mod request;
pub mod response;
pub mod restrict;
pub mod schema;
pub mod value;

pub use error::*;
pub use executor::*;
pub use extract::*;
pub use fields::*;
pub use formatter::*;
pub use introspect::*;
pub use pipeline::*;
pub use registry::*;
pub use request::*;
pub use response::*;
pub use restrict::*;
pub use schema::*;
pub use value::*;
