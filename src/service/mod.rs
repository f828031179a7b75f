//! Request preparation: defaults, conversion, named validators and attribute policy.

pub mod convert;
pub mod policy;
pub mod request;
pub mod validation;

pub use policy::{Action, Policy};
pub use request::{
    check_allow_put, convert_value, fill_default_value, populate_tenant_id, prepare_request_body,
    verify_attributes,
};
pub use validation::{is_known_validator, run_validator};
