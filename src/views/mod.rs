//! Response builders: shape plugin records into client-visible bodies.

pub mod portprofile;
pub mod resource;

pub use portprofile::PortProfileView;
pub use resource::ResourceView;
