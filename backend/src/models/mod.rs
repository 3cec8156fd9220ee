//! Domain models shared by the repository, service and HTTP layers.

pub mod macros;
pub mod note;
pub mod query;

pub use note::*;
pub use query::*;
