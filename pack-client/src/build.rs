//! The build orchestrator: resolves builder, run image and buildpacks,
//! validates compatibility, composes an ephemeral builder and hands off to
//! the lifecycle executor.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use pack_data::api::Api;
use pack_data::buildpack::{BuildpackInfo, BuildpackRef, OrderEntry};

use crate::builder::{Builder, BuilderError, StackMetadata};
use crate::buildpack::{Buildpack, BuildpackError};
use crate::download::{DownloadError, Downloader};
use crate::image::{ImageError, ImageFetcher, ImageRemover};
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleOptions, PLATFORM_API};
use crate::mixins::{BuildImage, MixinValidationError, validate_mixins};
use crate::paths::{file_uri_to_path, is_uri, is_zip};
use crate::reference::{ReferenceError, TagReference};
use crate::stack_image::StackImage;

/// One build request.
#[derive(Default)]
pub struct BuildOptions {
    /// The image to build, required.
    pub image: String,
    /// The builder image to build with, required.
    pub builder: String,
    /// Defaults to the current working directory.
    pub app_path: Option<PathBuf>,
    /// Defaults to the best mirror from the builder metadata or `additional_mirrors`.
    pub run_image: Option<String>,
    /// Extra run-image mirrors keyed by run-image name, only considered when
    /// `run_image` is not set.
    pub additional_mirrors: BTreeMap<String, Vec<String>>,
    /// Build-time environment for the detection and build phases.
    pub env: BTreeMap<String, String>,
    pub publish: bool,
    pub no_pull: bool,
    pub clear_cache: bool,
    /// Buildpack locators: IDs (optionally `id@version`) resolved against the
    /// builder, or paths/URIs to fetch.
    pub buildpacks: Vec<String>,
    /// Defaults to the proxy environment variables.
    pub proxy_config: Option<ProxyConfig>,
    pub container_config: ContainerConfig,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ProxyConfig {
    pub http_proxy: String,
    pub https_proxy: String,
    pub no_proxy: String,
}

impl ProxyConfig {
    /// Resolves the proxy configuration from the environment, upper-case
    /// variables first. Meant to be called once at the entry point; nothing
    /// below the orchestrator reads ambient state.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            http_proxy: env_with_fallback("HTTP_PROXY", "http_proxy"),
            https_proxy: env_with_fallback("HTTPS_PROXY", "https_proxy"),
            no_proxy: env_with_fallback("NO_PROXY", "no_proxy"),
        }
    }
}

fn env_with_fallback(upper: &str, lower: &str) -> String {
    env::var(upper)
        .or_else(|_| env::var(lower))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ContainerConfig {
    pub network: String,
}

/// The client core. All side effects go through the collaborator contracts,
/// so the whole build flow can run against fakes.
pub struct Client<'a> {
    image_fetcher: &'a dyn ImageFetcher,
    downloader: &'a dyn Downloader,
    lifecycle: &'a dyn Lifecycle,
    image_remover: &'a dyn ImageRemover,
}

impl<'a> Client<'a> {
    #[must_use]
    pub fn new(
        image_fetcher: &'a dyn ImageFetcher,
        downloader: &'a dyn Downloader,
        lifecycle: &'a dyn Lifecycle,
        image_remover: &'a dyn ImageRemover,
    ) -> Self {
        Self {
            image_fetcher,
            downloader,
            lifecycle,
            image_remover,
        }
    }

    /// Runs one build end to end.
    pub fn build(&self, opts: &BuildOptions) -> Result<(), BuildError> {
        let image_ref =
            TagReference::parse(&opts.image).map_err(|source| BuildError::InvalidImageName {
                name: opts.image.clone(),
                source,
            })?;

        let app_path = process_app_path(opts.app_path.as_deref())?;

        let proxy = opts
            .proxy_config
            .clone()
            .unwrap_or_else(ProxyConfig::from_env);

        if opts.builder.is_empty() {
            return Err(BuildError::BuilderRequired);
        }
        let builder_ref =
            TagReference::parse(&opts.builder).map_err(|source| BuildError::InvalidBuilderName {
                name: opts.builder.clone(),
                source,
            })?;

        let raw_builder_image = self
            .image_fetcher
            .fetch(builder_ref.name(), true, !opts.no_pull)
            .map_err(|source| BuildError::FetchBuilderImage {
                name: String::from(builder_ref.name()),
                source,
            })?;

        let mut builder =
            Builder::from_image(raw_builder_image).map_err(|source| BuildError::InvalidBuilder {
                name: opts.builder.clone(),
                source,
            })?;

        let run_image_name = resolve_run_image(
            opts.run_image.as_deref(),
            image_ref.registry(),
            &builder.metadata().stack,
            &opts.additional_mirrors,
        )
        .ok_or(BuildError::NoRunImage)?;

        let run_image =
            self.validate_run_image(&run_image_name, opts.no_pull, opts.publish, builder.stack_id())?;

        let (fetched_buildpacks, group) = self.process_buildpacks(&opts.buildpacks)?;

        validate_mixins(&fetched_buildpacks, &builder, &run_image)?;

        self.create_ephemeral_builder(&mut builder, opts.env.clone(), group, fetched_buildpacks)?;

        // The scratch image is removed on every exit path from here on;
        // failure to remove is only logged.
        let result = self.finish_build(
            opts,
            &image_ref,
            &app_path,
            &builder,
            &run_image_name,
            &proxy,
        );

        if let Err(remove_err) = self.image_remover.remove_image(&builder.name()) {
            log::warn!(
                "failed to remove ephemeral builder image `{}`: {remove_err}",
                builder.name()
            );
        }

        result
    }

    fn finish_build(
        &self,
        opts: &BuildOptions,
        image_ref: &TagReference,
        app_path: &Path,
        builder: &Builder,
        run_image_name: &str,
        proxy: &ProxyConfig,
    ) -> Result<(), BuildError> {
        let builder_api = builder.platform_api();
        if !PLATFORM_API.supports(builder_api) {
            return Err(BuildError::IncompatiblePlatformApi {
                builder: opts.builder.clone(),
                supported: PLATFORM_API,
                builder_api,
            });
        }

        self.lifecycle
            .execute(LifecycleOptions {
                app_path,
                image_ref,
                builder,
                run_image: run_image_name,
                clear_cache: opts.clear_cache,
                publish: opts.publish,
                proxy,
                network: &opts.container_config.network,
            })
            .map_err(BuildError::Lifecycle)
    }

    fn validate_run_image(
        &self,
        name: &str,
        no_pull: bool,
        publish: bool,
        expected_stack: &str,
    ) -> Result<StackImage, BuildError> {
        let image = self
            .image_fetcher
            .fetch(name, !publish, !no_pull)
            .map_err(|source| BuildError::InvalidRunImage {
                name: String::from(name),
                source,
            })?;

        let stack_image =
            StackImage::from_image(&*image).map_err(|source| BuildError::InvalidRunImage {
                name: String::from(name),
                source,
            })?;

        if stack_image.stack_id() != expected_stack {
            return Err(BuildError::StackMismatch {
                run_stack: String::from(stack_image.stack_id()),
                builder_stack: String::from(expected_stack),
            });
        }

        Ok(stack_image)
    }

    /// Classifies each buildpack locator as either an ID reference (resolved
    /// against the builder at detection time) or a fetchable location, and
    /// downloads the latter. Returns the fetched buildpacks and the custom
    /// order group covering all requested buildpacks.
    fn process_buildpacks(
        &self,
        locators: &[String],
    ) -> Result<(Vec<Buildpack>, OrderEntry), BuildError> {
        let mut fetched = Vec::new();
        let mut group = OrderEntry::default();

        for locator in locators {
            if is_buildpack_id(locator) {
                let (id, version) = parse_buildpack_locator(locator);
                group
                    .group
                    .push(BuildpackRef::from(BuildpackInfo::new(id, version)));
            } else {
                ensure_buildpack_location_support(locator)?;

                let dir = self.downloader.download(locator).map_err(|source| {
                    BuildError::DownloadBuildpack {
                        location: locator.clone(),
                        source,
                    }
                })?;

                let buildpack =
                    Buildpack::from_dir(dir).map_err(|source| BuildError::CreateBuildpack {
                        location: locator.clone(),
                        source,
                    })?;

                group
                    .group
                    .push(BuildpackRef::from(buildpack.descriptor().info.clone()));
                fetched.push(buildpack);
            }
        }

        Ok((fetched, group))
    }

    /// Derives the transient builder for this build: renames the working copy
    /// to a collision-resistant scratch reference so the base reference is
    /// never overwritten, grafts the fetched buildpacks on, applies env and
    /// the custom order, and persists locally.
    fn create_ephemeral_builder(
        &self,
        builder: &mut Builder,
        env: BTreeMap<String, String>,
        group: OrderEntry,
        buildpacks: Vec<Buildpack>,
    ) -> Result<(), BuildError> {
        let orig_name = builder.name();
        builder.rename(&format!("pack.local/builder/{}:latest", scratch_suffix()));
        builder.set_env(env);

        for buildpack in buildpacks {
            log::debug!(
                "adding buildpack `{}` to builder",
                buildpack.descriptor().info
            );
            builder.add_buildpack(buildpack);
        }

        if !group.group.is_empty() {
            log::debug!("setting custom order");
            builder.set_order(vec![group]);
        }

        builder.save().map_err(|source| BuildError::InvalidBuilder {
            name: orig_name,
            source,
        })
    }
}

fn process_app_path(app_path: Option<&Path>) -> Result<PathBuf, BuildError> {
    let path = match app_path {
        Some(path) => path.to_path_buf(),
        None => env::current_dir().map_err(|source| BuildError::InvalidAppPath {
            path: PathBuf::from("."),
            source,
        })?,
    };

    // Resolves symlinks and produces an absolute path.
    let resolved = path
        .canonicalize()
        .map_err(|source| BuildError::InvalidAppPath {
            path: path.clone(),
            source,
        })?;

    let metadata = fs::metadata(&resolved).map_err(|source| BuildError::InvalidAppPath {
        path: resolved.clone(),
        source,
    })?;

    if !metadata.is_dir() {
        let zip = is_zip(&resolved).map_err(|source| BuildError::InvalidAppPath {
            path: resolved.clone(),
            source,
        })?;
        if !zip {
            return Err(BuildError::AppPathNotDirOrZip { path: resolved });
        }
    }

    Ok(resolved)
}

/// Picks the run image: an explicit override wins; otherwise the mirror
/// whose registry matches the target image's registry, with locally
/// configured mirrors taking precedence over the builder's; otherwise the
/// first locally configured mirror; otherwise the builder's default.
fn resolve_run_image(
    run_image: Option<&str>,
    registry: &str,
    stack: &StackMetadata,
    additional_mirrors: &BTreeMap<String, Vec<String>>,
) -> Option<String> {
    if let Some(name) = run_image.filter(|name| !name.is_empty()) {
        return Some(String::from(name));
    }

    let primary = &stack.run_image.image;
    if primary.is_empty() {
        return None;
    }

    let locally_configured = additional_mirrors
        .get(primary)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for mirror in locally_configured {
        if registry_matches(mirror, registry) {
            return Some(mirror.clone());
        }
    }

    for mirror in std::iter::once(primary).chain(stack.run_image.mirrors.iter()) {
        if registry_matches(mirror, registry) {
            return Some(mirror.clone());
        }
    }

    locally_configured
        .first()
        .cloned()
        .or_else(|| Some(primary.clone()))
}

fn registry_matches(mirror: &str, registry: &str) -> bool {
    TagReference::parse(mirror).is_ok_and(|reference| reference.registry() == registry)
}

// A locator is an ID reference when it is neither a URI nor an existing
// local path.
fn is_buildpack_id(locator: &str) -> bool {
    !is_uri(locator) && fs::metadata(locator).is_err()
}

fn parse_buildpack_locator(locator: &str) -> (String, String) {
    match locator.split_once('@') {
        Some((id, "latest")) => {
            log::warn!("@latest syntax is deprecated, will not work in future releases");
            (String::from(id), String::new())
        }
        Some((id, version)) => (String::from(id), String::from(version)),
        None => (String::from(locator), String::new()),
    }
}

// Directory buildpacks cannot be represented by the Windows transport.
fn ensure_buildpack_location_support(locator: &str) -> Result<(), BuildError> {
    if !cfg!(windows) {
        return Ok(());
    }

    let path = if is_uri(locator) {
        match file_uri_to_path(locator) {
            Ok(path) => Some(path),
            Err(_) => None, // remote URIs are always fine
        }
    } else {
        Some(PathBuf::from(locator))
    };

    if let Some(path) = path {
        if fs::metadata(&path).map(|metadata| metadata.is_dir()).unwrap_or(false) {
            return Err(BuildError::DirectoryBuildpackUnsupported {
                location: String::from(locator),
            });
        }
    }

    Ok(())
}

fn scratch_suffix() -> String {
    (0..10)
        .map(|_| format!("{:02x}", b'a' + fastrand::u8(..26)))
        .collect()
}

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("invalid image name `{name}`: {source}")]
    InvalidImageName {
        name: String,
        source: ReferenceError,
    },

    #[error("builder is a required parameter if the client has no default builder")]
    BuilderRequired,

    #[error("invalid builder `{name}`: {source}")]
    InvalidBuilderName {
        name: String,
        source: ReferenceError,
    },

    #[error("invalid app path `{}`: {source}", .path.display())]
    InvalidAppPath {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("app path `{}` must be a directory or zip", .path.display())]
    AppPathNotDirOrZip { path: PathBuf },

    #[error("failed to fetch builder image `{name}`: {source}")]
    FetchBuilderImage { name: String, source: ImageError },

    #[error("invalid builder `{name}`: {source}")]
    InvalidBuilder { name: String, source: BuilderError },

    #[error("run image must be specified")]
    NoRunImage,

    #[error("invalid run-image `{name}`: {source}")]
    InvalidRunImage { name: String, source: ImageError },

    #[error("run-image stack id `{run_stack}` does not match builder stack `{builder_stack}`")]
    StackMismatch {
        run_stack: String,
        builder_stack: String,
    },

    #[error("buildpack `{location}`: directory-based buildpacks are not currently supported on Windows")]
    DirectoryBuildpackUnsupported { location: String },

    #[error("downloading buildpack from `{location}`: {source}")]
    DownloadBuildpack {
        location: String,
        source: DownloadError,
    },

    #[error("creating buildpack from `{location}`: {source}")]
    CreateBuildpack {
        location: String,
        source: BuildpackError,
    },

    #[error("validating stack mixins: {0}")]
    ValidatingMixins(#[from] MixinValidationError),

    #[error(
        "pack (Platform API version {supported}) is incompatible with builder `{builder}` (Platform API version {builder_api})"
    )]
    IncompatiblePlatformApi {
        builder: String,
        supported: Api,
        builder_api: Api,
    },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
