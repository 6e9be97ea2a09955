//! The template engine: compilation, caching and partial resolution

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::Options;
use crate::context::Delimiters;
use crate::dispatch::ObjectHandler;
use crate::error::{CompileError, Result};
use crate::executor::Executor;
use crate::loader::{read_source, MemoryLoader, TemplateLoader};
use crate::parser::parse;
use crate::template::{Template, Tree};

/// Key for templates compiled from lambda output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FragmentKey {
    text: String,
    delimiters: Delimiters,
    file: Arc<str>,
}

struct EngineInner {
    options: Options,
    loader: Arc<dyn TemplateLoader>,
    templates: DashMap<String, Arc<Tree>>,
    indented: DashMap<(String, String), Arc<Tree>>,
    fragments: DashMap<FragmentKey, Arc<Tree>>,
}

/// Compiles templates and caches the results.
///
/// Templates are looked up by logical name through the configured
/// [`TemplateLoader`]. Compiled trees are cached by name and reused by
/// partials and extends that refer to them. Cloning an engine shares its
/// caches.
///
/// # Example
///
/// ```
/// use stache::{Engine, MemoryLoader, Value};
///
/// let loader = MemoryLoader::new()
///     .with("page.mustache", "{{>header}} body")
///     .with("header.mustache", "<h1>{{title}}</h1>");
/// let engine = Engine::builder().loader(loader).build();
/// let page = engine.compile("page.mustache").unwrap();
/// let out = page.render_to_string(Value::map([("title", "Hi")])).unwrap();
/// assert_eq!(out, "<h1>Hi</h1> body");
/// ```
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with default options and an empty in-memory loader.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring an engine.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Create an engine from `options`, loading templates through `loader`.
    pub fn with_options(options: Options, loader: impl TemplateLoader + 'static) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                options,
                loader: Arc::new(loader),
                templates: DashMap::new(),
                indented: DashMap::new(),
                fragments: DashMap::new(),
            }),
        }
    }

    /// The engine's configuration
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Compile the template called `name`, or return the cached compilation.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn compile(&self, name: &str) -> Result<Template> {
        let tree = self.tree(name)?;
        Ok(Template::new(tree, self.clone()))
    }

    /// Compile `text` under the logical name `name`.
    ///
    /// The result is not cached; `name` is used for diagnostics and for
    /// resolving partials relative to it.
    pub fn compile_str(&self, text: &str, name: &str) -> Result<Template> {
        self.compile_with_delimiters(text, name, "{{", "}}")
    }

    /// Compile `text` with the given starting delimiters.
    pub fn compile_with_delimiters(&self, text: &str, name: &str, start: &str, end: &str) -> Result<Template> {
        let delimiters = Delimiters::new(start, end);
        if !delimiters.is_valid() {
            return Err(CompileError::InvalidDelimiters {
                file: name.to_string(),
                line: 1,
                column: 1,
                directive: delimiters.to_string(),
            }
            .into());
        }
        let tree = self.build(text, name, delimiters)?;
        Ok(Template::new(Arc::new(tree), self.clone()))
    }

    /// Drop the cached compilation of `name`.
    ///
    /// Templates already holding a reference to it, as a partial or parent,
    /// keep the old tree.
    pub fn invalidate(&self, name: &str) {
        self.inner.templates.remove(name);
        self.inner.indented.retain(|(path, _), _| path != name);
    }

    /// Drop every cached compilation.
    pub fn clear_cache(&self) {
        self.inner.templates.clear();
        self.inner.indented.clear();
        self.inner.fragments.clear();
    }

    /// Number of templates compiled by name and cached
    pub fn cache_len(&self) -> usize {
        self.inner.templates.len()
    }

    /// The logical name a partial `name` refers to from `including`.
    ///
    /// Relative names resolve against the directory of the including
    /// template; names starting with `/` resolve from the root. The including
    /// template's extension is appended unless `name` already ends with it.
    /// `.` and `..` segments are folded away.
    ///
    /// ```
    /// use stache::Engine;
    ///
    /// let engine = Engine::new();
    /// assert_eq!(engine.resolve_partial_path("item", "pages/list.html"), "pages/item.html");
    /// assert_eq!(engine.resolve_partial_path("../shared/nav", "pages/list.html"), "shared/nav.html");
    /// assert_eq!(engine.resolve_partial_path("/base.html", "pages/list.html"), "base.html");
    /// ```
    pub fn resolve_partial_path(&self, name: &str, including: &str) -> String {
        let (dir, file) = match including.rfind('/') {
            Some(i) => (&including[..=i], &including[i + 1..]),
            None => ("", including),
        };
        let extension = file.rfind('.').map_or("", |i| &file[i..]);

        let mut path = match name.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("{}{}", dir, name),
        };
        if !name.ends_with(extension) {
            path.push_str(extension);
        }
        normalize(&path)
    }

    /// The cached tree for `name`, compiling it on first use.
    pub(crate) fn tree(&self, name: &str) -> Result<Arc<Tree>> {
        if let Some(tree) = self.inner.templates.get(name) {
            return Ok(Arc::clone(tree.value()));
        }
        let source = read_source(self.inner.loader.as_ref(), name)?;
        let tree = Arc::new(self.build(&source, name, Delimiters::default())?);
        Ok(self.insert_bounded(&self.inner.templates, name.to_string(), tree))
    }

    /// The tree for partial `name` included from `including`.
    ///
    /// A non-empty `indent` is prefixed to every line of the partial's source
    /// before compiling; indented compilations are cached separately.
    pub(crate) fn partial(&self, name: &str, including: &str, indent: &str) -> Result<Arc<Tree>> {
        let path = self.resolve_partial_path(name, including);
        if indent.is_empty() {
            return self.tree(&path);
        }

        let key = (path, indent.to_string());
        if let Some(tree) = self.inner.indented.get(&key) {
            return Ok(Arc::clone(tree.value()));
        }
        let source = read_source(self.inner.loader.as_ref(), &key.0)?;
        let tree = Arc::new(self.build(&indent_lines(&source, indent), &key.0, Delimiters::default())?);
        Ok(self.insert_bounded(&self.inner.indented, key, tree))
    }

    /// The tree for template text produced at render time by a lambda.
    pub(crate) fn fragment(&self, text: &str, delimiters: &Delimiters, file: &Arc<str>) -> Result<Arc<Tree>> {
        let key = FragmentKey {
            text: text.to_string(),
            delimiters: delimiters.clone(),
            file: Arc::clone(file),
        };
        if let Some(tree) = self.inner.fragments.get(&key) {
            return Ok(Arc::clone(tree.value()));
        }
        let tree = Arc::new(self.build(text, file, delimiters.clone())?);
        Ok(self.insert_bounded(&self.inner.fragments, key, tree))
    }

    fn build(&self, source: &str, name: &str, delimiters: Delimiters) -> Result<Tree> {
        let codes = parse(source, name, delimiters, &self.inner.options.pragmas)?;
        tracing::debug!(template = name, nodes = codes.len(), "compiled template");
        Ok(Tree::new(name, source, codes))
    }

    /// Insert `tree` unless another thread got there first, evicting an
    /// arbitrary entry when the cache is full.
    pub(crate) fn insert_bounded<K>(&self, map: &DashMap<K, Arc<Tree>>, key: K, tree: Arc<Tree>) -> Arc<Tree>
    where
        K: Eq + Hash + Clone + fmt::Debug,
    {
        if let Some(limit) = self.inner.options.cache_limit {
            if limit == 0 {
                return tree;
            }
            if map.len() >= limit && !map.contains_key(&key) {
                let victim = map.iter().next().map(|entry| entry.key().clone());
                if let Some(victim) = victim {
                    map.remove(&victim);
                    tracing::debug!(evicted = ?victim, limit, "template cache full");
                }
            }
        }
        Arc::clone(map.entry(key).or_insert(tree).value())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.inner.options)
            .field("cached", &self.inner.templates.len())
            .finish()
    }
}

/// Prefix every non-empty line of `source` with `indent`.
fn indent_lines(source: &str, indent: &str) -> String {
    let mut out = String::with_capacity(source.len() + indent.len() * 4);
    for line in source.split_inclusive('\n') {
        if line != "\n" && line != "\r\n" {
            out.push_str(indent);
        }
        out.push_str(line);
    }
    out
}

/// Fold `.` and `..` segments out of a `/`-separated path.
fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ═══════════════════════════════════════════════════════════════════════
// Builder
// ═══════════════════════════════════════════════════════════════════════

/// Builder for [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    options: Options,
    loader: Option<Arc<dyn TemplateLoader>>,
}

impl EngineBuilder {
    /// Load templates through `loader`
    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Resolve names with `handler`
    pub fn handler(mut self, handler: impl ObjectHandler + 'static) -> Self {
        self.options = self.options.with_handler(handler);
        self
    }

    /// Render deferred values on `executor`
    pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
        self.options = self.options.with_executor(executor);
        self
    }

    /// Render deferred values on an already shared executor
    pub fn shared_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.options.executor = Some(executor);
        self
    }

    /// Enable strict diagnostics
    pub fn strict(mut self, strict: bool) -> Self {
        self.options = self.options.with_strict(strict);
        self
    }

    /// Fail renders on names found in no scope
    pub fn fail_on_miss(mut self, fail_on_miss: bool) -> Self {
        self.options = self.options.with_fail_on_miss(fail_on_miss);
        self
    }

    /// Bound partial nesting
    pub fn recursion_limit(mut self, limit: usize) -> Self {
        self.options = self.options.with_recursion_limit(limit);
        self
    }

    /// Bound each compiled template cache
    pub fn cache_limit(mut self, limit: usize) -> Self {
        self.options = self.options.with_cache_limit(limit);
        self
    }

    /// Register a pragma handler
    pub fn pragma(
        mut self,
        name: impl Into<String>,
        handler: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.options = self.options.with_pragma(name, handler);
        self
    }

    /// Replace all options at once
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Build the engine
    pub fn build(self) -> Engine {
        let loader: Arc<dyn TemplateLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(MemoryLoader::new()),
        };
        Engine {
            inner: Arc::new(EngineInner {
                options: self.options,
                loader,
                templates: DashMap::new(),
                indented: DashMap::new(),
                fragments: DashMap::new(),
            }),
        }
    }
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("options", &self.options)
            .field("loader", &self.loader.is_some())
            .finish()
    }
}
