pub mod types;
pub mod registry;
pub mod loader;
pub mod validator;

pub use types::*;
pub use registry::*;
pub use loader::*;
pub use validator::*;
