pub mod context;

pub use context::{RequestContext, ROLES_HEADER, TENANT_ID_HEADER};
