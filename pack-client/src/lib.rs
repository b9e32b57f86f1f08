#![doc = include_str!("../README.md")]

pub mod build;
pub mod builder;
pub mod buildpack;
pub mod download;
pub mod image;
pub mod layer;
pub mod lifecycle;
pub mod mixins;
pub mod package;
pub mod paths;
pub mod reference;
pub mod stack_image;

#[cfg(test)]
pub(crate) mod fakes;

pub use crate::build::{BuildOptions, Client, ContainerConfig, ProxyConfig};
pub use crate::package::PackageBuilder;
