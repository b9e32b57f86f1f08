//! Low-level representations for buildpack, stack and builder image metadata.

pub mod api;
pub mod buildpack;
pub mod buildpackage;
pub mod layers;
pub mod mixins;
pub mod stack;
