//! In-memory collaborator fakes for exercising the core without a daemon,
//! registry or network.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::download::{DownloadError, Downloader};
use crate::image::{Image, ImageError, ImageFactory, ImageFetcher, ImageRemover};
use crate::lifecycle::{Lifecycle, LifecycleError, LifecycleOptions};

#[derive(Debug, Default)]
pub(crate) struct FakeImageState {
    pub(crate) name: String,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) layers: Vec<Vec<u8>>,
    pub(crate) local: bool,
    pub(crate) save_count: u32,
}

/// An image handle whose state can still be inspected after the handle was
/// moved into the code under test.
#[derive(Debug, Clone)]
pub(crate) struct FakeImage {
    state: Rc<RefCell<FakeImageState>>,
}

impl FakeImage {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            state: Rc::new(RefCell::new(FakeImageState {
                name: String::from(name),
                local: true,
                ..FakeImageState::default()
            })),
        }
    }

    pub(crate) fn with_label(self, key: &str, value: &str) -> Self {
        self.state
            .borrow_mut()
            .labels
            .insert(String::from(key), String::from(value));
        self
    }

    pub(crate) fn handle(&self) -> Rc<RefCell<FakeImageState>> {
        Rc::clone(&self.state)
    }

    // A detached copy sharing no state, like pulling a fresh handle from a
    // store.
    fn detached_copy(&self) -> Self {
        let state = self.state.borrow();
        Self {
            state: Rc::new(RefCell::new(FakeImageState {
                name: state.name.clone(),
                labels: state.labels.clone(),
                env: state.env.clone(),
                layers: state.layers.clone(),
                local: state.local,
                save_count: 0,
            })),
        }
    }
}

impl Image for FakeImage {
    fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    fn rename(&mut self, name: &str) {
        self.state.borrow_mut().name = String::from(name);
    }

    fn label(&self, key: &str) -> Result<Option<String>, ImageError> {
        Ok(self.state.borrow().labels.get(key).cloned())
    }

    fn set_label(&mut self, key: &str, value: &str) -> Result<(), ImageError> {
        self.state
            .borrow_mut()
            .labels
            .insert(String::from(key), String::from(value));
        Ok(())
    }

    fn set_env(&mut self, key: &str, value: &str) -> Result<(), ImageError> {
        self.state
            .borrow_mut()
            .env
            .insert(String::from(key), String::from(value));
        Ok(())
    }

    fn add_layer(&mut self, layer_tar: &Path) -> Result<(), ImageError> {
        let content = fs::read(layer_tar).map_err(|e| ImageError::backend("add layer", e))?;
        self.state.borrow_mut().layers.push(content);
        Ok(())
    }

    fn save(&mut self) -> Result<(), ImageError> {
        self.state.borrow_mut().save_count += 1;
        Ok(())
    }
}

/// A fake store acting as fetcher, factory and remover at once.
#[derive(Default)]
pub(crate) struct FakeImageStore {
    images: RefCell<BTreeMap<String, FakeImage>>,
    fetched: RefCell<Vec<FakeImage>>,
    created: RefCell<Vec<FakeImage>>,
    removed: RefCell<Vec<String>>,
}

impl FakeImageStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, image: FakeImage) {
        self.images.borrow_mut().insert(image.name(), image);
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.images.borrow().contains_key(name)
    }

    pub(crate) fn fetched(&self) -> Vec<Rc<RefCell<FakeImageState>>> {
        self.fetched.borrow().iter().map(FakeImage::handle).collect()
    }

    pub(crate) fn created(&self) -> Vec<Rc<RefCell<FakeImageState>>> {
        self.created.borrow().iter().map(FakeImage::handle).collect()
    }

    pub(crate) fn removed(&self) -> Vec<String> {
        self.removed.borrow().clone()
    }
}

impl ImageFetcher for FakeImageStore {
    fn fetch(&self, name: &str, _daemon: bool, _pull: bool) -> Result<Box<dyn Image>, ImageError> {
        let image = self
            .images
            .borrow()
            .get(name)
            .map(FakeImage::detached_copy)
            .ok_or_else(|| ImageError::backend("fetch", format!("image `{name}` not found")))?;

        self.fetched.borrow_mut().push(image.clone());
        Ok(Box::new(image))
    }
}

impl ImageFactory for FakeImageStore {
    fn new_image(&self, repo_name: &str, local: bool) -> Result<Box<dyn Image>, ImageError> {
        let image = FakeImage::new(repo_name);
        image.state.borrow_mut().local = local;
        self.created.borrow_mut().push(image.clone());
        Ok(Box::new(image))
    }
}

impl ImageRemover for FakeImageStore {
    fn remove_image(&self, name: &str) -> Result<(), ImageError> {
        self.removed.borrow_mut().push(String::from(name));
        Ok(())
    }
}

/// Maps buildpack locators to prepared local directories.
#[derive(Default)]
pub(crate) struct FakeDownloader {
    blobs: BTreeMap<String, PathBuf>,
}

impl FakeDownloader {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_blob(mut self, location: &str, dir: &Path) -> Self {
        self.blobs
            .insert(String::from(location), dir.to_path_buf());
        self
    }
}

impl Downloader for FakeDownloader {
    fn download(&self, location: &str) -> Result<PathBuf, DownloadError> {
        self.blobs
            .get(location)
            .cloned()
            .ok_or_else(|| DownloadError {
                location: String::from(location),
                source: "no blob registered".into(),
            })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ExecutedBuild {
    pub(crate) app_path: PathBuf,
    pub(crate) image_ref: String,
    pub(crate) builder_name: String,
    pub(crate) run_image: String,
    pub(crate) clear_cache: bool,
    pub(crate) publish: bool,
    pub(crate) http_proxy: String,
    pub(crate) network: String,
}

/// Records the handoff instead of running containers; optionally fails to
/// exercise cleanup paths.
#[derive(Default)]
pub(crate) struct FakeLifecycle {
    fail: bool,
    executed: RefCell<Option<ExecutedBuild>>,
}

impl FakeLifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn executed(&self) -> Option<ExecutedBuild> {
        self.executed.borrow().clone()
    }
}

impl Lifecycle for FakeLifecycle {
    fn execute(&self, opts: LifecycleOptions<'_>) -> Result<(), LifecycleError> {
        *self.executed.borrow_mut() = Some(ExecutedBuild {
            app_path: opts.app_path.to_path_buf(),
            image_ref: String::from(opts.image_ref.name()),
            builder_name: opts.builder.name(),
            run_image: String::from(opts.run_image),
            clear_cache: opts.clear_cache,
            publish: opts.publish,
            http_proxy: opts.proxy.http_proxy.clone(),
            network: String::from(opts.network),
        });

        if self.fail {
            Err(LifecycleError("lifecycle exploded".into()))
        } else {
            Ok(())
        }
    }
}
