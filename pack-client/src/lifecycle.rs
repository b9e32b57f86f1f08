//! The external lifecycle executor contract.
//!
//! The lifecycle runs detect/build/export inside containers and is opaque to
//! this crate; the orchestrator only resolves its inputs and hands off.

use std::path::Path;

use pack_data::api::Api;

use crate::build::ProxyConfig;
use crate::builder::Builder;
use crate::reference::TagReference;

/// The Platform API version this client implements when talking to a lifecycle.
pub const PLATFORM_API: Api = Api { major: 0, minor: 2 };

/// Everything a lifecycle invocation needs, resolved by the orchestrator.
pub struct LifecycleOptions<'a> {
    pub app_path: &'a Path,
    pub image_ref: &'a TagReference,
    pub builder: &'a Builder,
    pub run_image: &'a str,
    pub clear_cache: bool,
    pub publish: bool,
    pub proxy: &'a ProxyConfig,
    pub network: &'a str,
}

pub trait Lifecycle {
    fn execute(&self, opts: LifecycleOptions<'_>) -> Result<(), LifecycleError>;
}

#[derive(thiserror::Error, Debug)]
#[error("lifecycle execution failed: {0}")]
pub struct LifecycleError(#[from] pub Box<dyn std::error::Error + Send + Sync>);
