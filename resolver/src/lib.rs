pub mod error;
pub mod fgd;
pub mod resolve;
pub mod schema;
pub mod transform;

pub use error::ResolveError;
pub use resolve::{DirLoader, FixupStyle, FragmentLoader, ResolveOptions, Resolver};
pub use schema::{SchemaRegistry, Treatment};
