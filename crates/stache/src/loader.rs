//! Template loaders
//!
//! The engine asks a loader for a readable stream by logical name and treats
//! the result as opaque. Two loaders are provided: one over an in-memory map
//! and one over a directory on disk.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::LoadError;

/// Source of template text by logical name.
pub trait TemplateLoader: Send + Sync {
    /// Open the template called `name`.
    ///
    /// Returns [`LoadError::NotFound`] when no template matches.
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError>;
}

impl<T: TemplateLoader + ?Sized> TemplateLoader for Arc<T> {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        (**self).reader(name)
    }
}

/// Templates held in memory.
///
/// # Example
///
/// ```
/// use stache::{MemoryLoader, TemplateLoader};
///
/// let loader = MemoryLoader::new().with("greeting.mustache", "Hello {{name}}");
/// assert!(loader.reader("greeting.mustache").is_ok());
/// assert!(loader.reader("missing.mustache").is_err());
/// ```
#[derive(Debug, Default)]
pub struct MemoryLoader {
    templates: DashMap<String, Arc<str>>,
}

impl MemoryLoader {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template, builder style
    pub fn with(self, name: impl Into<String>, source: impl Into<Arc<str>>) -> Self {
        self.insert(name, source);
        self
    }

    /// Add or replace a template
    pub fn insert(&self, name: impl Into<String>, source: impl Into<Arc<str>>) {
        self.templates.insert(name.into(), source.into());
    }

    /// Remove a template, returning its source
    pub fn remove(&self, name: &str) -> Option<Arc<str>> {
        self.templates.remove(name).map(|(_, source)| source)
    }

    /// Number of templates held
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are held
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateLoader for MemoryLoader {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        let source = self
            .templates
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
        Ok(Box::new(Cursor::new(source.as_bytes().to_vec())))
    }
}

/// Templates read from files under a root directory.
///
/// Names are relative paths below the root. Names that would escape the root
/// through `..` are reported as not found.
#[derive(Debug, Clone)]
pub struct FileLoader {
    root: PathBuf,
}

impl FileLoader {
    /// Create a loader rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl TemplateLoader for FileLoader {
    fn reader(&self, name: &str) -> Result<Box<dyn Read + Send>, LoadError> {
        let Some(path) = self.path(name) else {
            tracing::debug!(template = name, root = %self.root.display(), "template path escapes root");
            return Err(LoadError::NotFound(name.to_string()));
        };
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(LoadError::NotFound(name.to_string())),
            Err(e) => Err(LoadError::Io {
                name: name.to_string(),
                cause: Arc::new(e),
            }),
        }
    }
}

/// Read a whole template into a string.
pub(crate) fn read_source(loader: &dyn TemplateLoader, name: &str) -> Result<String, LoadError> {
    let mut reader = loader.reader(name)?;
    let mut source = String::new();
    reader
        .read_to_string(&mut source)
        .map_err(|e| LoadError::Io {
            name: name.to_string(),
            cause: Arc::new(e),
        })?;
    Ok(source)
}
