//! HTTP handlers for the generic resource API and the port-profile extension.

pub mod params;
pub mod portprofile;
pub mod resource;
