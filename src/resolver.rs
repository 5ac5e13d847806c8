//! Template sources and the caching resolver in front of them.

use crate::catalog;
use crate::config::ResolverConfig;
use crate::error::{SourceError, TemplateError};
use crate::template::{Template, TemplateConstraints, TemplateSpec};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Where template definitions come from.
pub trait TemplateSource: Send + Sync {
    /// Ids this source can serve, in presentation order.
    fn ids(&self) -> Vec<String>;

    fn fetch(&self, id: &str) -> Result<TemplateSpec, SourceError>;
}

/// In-memory set of template definitions.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    specs: Vec<TemplateSpec>,
}

#[derive(Debug, Deserialize)]
struct TemplateBundle {
    #[serde(default)]
    version: u32,
    templates: Vec<TemplateSpec>,
}

impl StaticSource {
    pub fn new(specs: Vec<TemplateSpec>) -> Self {
        Self { specs }
    }

    /// The compiled-in production catalog.
    pub fn builtin() -> Self {
        Self::new(catalog::builtin_specs())
    }

    /// Loads a template bundle: `{"version": 1, "templates": [...]}`.
    pub fn from_json_file(path: &Path) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, SourceError> {
        let bundle: TemplateBundle = serde_json::from_str(contents)?;
        if bundle.version > 1 {
            return Err(SourceError::Malformed(format!(
                "unsupported bundle version {}",
                bundle.version
            )));
        }
        tracing::debug!(count = bundle.templates.len(), "loaded template bundle");
        Ok(Self::new(bundle.templates))
    }
}

impl TemplateSource for StaticSource {
    fn ids(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.id.clone()).collect()
    }

    fn fetch(&self, id: &str) -> Result<TemplateSpec, SourceError> {
        self.specs
            .iter()
            .find(|spec| spec.id == id)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }
}

pub const MANIFEST_FILE: &str = "templates.json";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestEntry {
    id: String,
    #[serde(default)]
    name: String,
    width_inches: f64,
    height_inches: f64,
    svg_file: String,
    #[serde(default)]
    safe_inset_px: Option<f64>,
    #[serde(default)]
    constraints: Option<TemplateConstraints>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    templates: Vec<ManifestEntry>,
}

static PATH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<path\b[^>]*>").expect("valid path tag regex"));
static ID_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\sid\s*=\s*["']([^"']*)["']"#).expect("valid id regex"));
static D_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\sd\s*=\s*["']([^"']*)["']"#).expect("valid d regex"));
static VIEW_BOX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<svg\b[^>]*\sviewBox\s*=\s*["']([^"']+)["']"#).expect("valid viewBox regex")
});

/// A directory of template artwork described by a `templates.json` manifest.
///
/// Each SVG carries a `<path id="Inner">` and optionally a
/// `<path id="Outline">`; ids match case-insensitively.
#[derive(Debug, Clone)]
pub struct SvgDirectorySource {
    root: PathBuf,
    entries: Vec<ManifestEntry>,
}

impl SvgDirectorySource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let root = root.into();
        let contents = std::fs::read_to_string(root.join(MANIFEST_FILE))?;
        let manifest: Manifest = serde_json::from_str(&contents)?;
        tracing::debug!(dir = %root.display(), count = manifest.templates.len(), "opened template directory");
        Ok(Self {
            root,
            entries: manifest.templates,
        })
    }
}

impl TemplateSource for SvgDirectorySource {
    fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.id.clone()).collect()
    }

    fn fetch(&self, id: &str) -> Result<TemplateSpec, SourceError> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        let svg = std::fs::read_to_string(self.root.join(&entry.svg_file))?;
        let mut constraints = entry.constraints.clone().unwrap_or_default();
        if constraints.safe_inset_px.is_none() {
            constraints.safe_inset_px = entry.safe_inset_px;
        }
        Ok(TemplateSpec {
            id: entry.id.clone(),
            name: entry.name.clone(),
            width_in: entry.width_inches,
            height_in: entry.height_inches,
            inner_path: extract_path(&svg, "inner"),
            outline_path: extract_path(&svg, "outline"),
            view_box: extract_view_box(&svg),
            constraints,
        })
    }
}

/// Path data of the first `<path>` whose id matches `id` ignoring case.
pub fn extract_path(svg: &str, id: &str) -> Option<String> {
    PATH_TAG.find_iter(svg).find_map(|tag| {
        let tag = tag.as_str();
        let tag_id = ID_ATTR.captures(tag)?.get(1)?.as_str();
        if !tag_id.eq_ignore_ascii_case(id) {
            return None;
        }
        D_ATTR
            .captures(tag)
            .and_then(|caps| caps.get(1))
            .map(|d| d.as_str().to_string())
    })
}

pub fn extract_view_box(svg: &str) -> Option<String> {
    VIEW_BOX
        .captures(svg)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

type Slot = Arc<OnceCell<Arc<Template>>>;

/// Resolves template ids to pixel-space templates and caches the results
/// for its own lifetime.
///
/// Concurrent first requests for one id share a single load. Failures are
/// not cached, so a later `get` retries.
pub struct TemplateResolver {
    source: Arc<dyn TemplateSource>,
    config: ResolverConfig,
    cache: Mutex<HashMap<String, Slot>>,
    fallback: OnceCell<Arc<Template>>,
}

impl TemplateResolver {
    pub fn new(source: Arc<dyn TemplateSource>, config: ResolverConfig) -> Self {
        Self {
            source,
            config,
            cache: Mutex::new(HashMap::new()),
            fallback: OnceCell::new(),
        }
    }

    /// Resolver over the compiled-in catalog with default settings.
    pub fn builtin() -> Self {
        Self::new(Arc::new(StaticSource::builtin()), ResolverConfig::default())
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn ids(&self) -> Vec<String> {
        self.source.ids()
    }

    pub fn get(&self, id: &str) -> Result<Arc<Template>, TemplateError> {
        let slot = self.slot(id);
        slot.get_or_try_init(|| self.load(id).map(Arc::new))
            .cloned()
    }

    /// Like [`Self::get`], but any failure yields the fallback template.
    pub fn get_or_fallback(&self, id: &str) -> Arc<Template> {
        match self.get(id) {
            Ok(template) => template,
            Err(err) => {
                tracing::warn!(template = id, error = %err, "template unavailable, using fallback");
                self.fallback()
            }
        }
    }

    /// Template for a badge: falls back or fails according to
    /// `fallback_on_error`.
    pub fn for_badge(&self, id: &str) -> Result<Arc<Template>, TemplateError> {
        if self.config.fallback_on_error {
            Ok(self.get_or_fallback(id))
        } else {
            self.get(id)
        }
    }

    pub fn fallback(&self) -> Arc<Template> {
        self.fallback
            .get_or_init(|| Arc::new(Template::fallback(self.config.dpi)))
            .clone()
    }

    pub fn invalidate(&self, id: &str) {
        self.lock_cache().remove(id);
    }

    pub fn clear(&self) {
        self.lock_cache().clear();
    }

    pub fn reload(&self, id: &str) -> Result<Arc<Template>, TemplateError> {
        self.invalidate(id);
        self.get(id)
    }

    /// Loads every id the source lists. One broken template never prevents
    /// the others from loading.
    pub fn load_all(&self) -> (Vec<Arc<Template>>, Vec<TemplateError>) {
        let mut loaded = Vec::new();
        let mut failures = Vec::new();
        for id in self.source.ids() {
            match self.get(&id) {
                Ok(template) => loaded.push(template),
                Err(err) => {
                    tracing::warn!(template = %id, error = %err, "template failed to load");
                    failures.push(err);
                }
            }
        }
        (loaded, failures)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, id: &str) -> Slot {
        self.lock_cache().entry(id.to_string()).or_default().clone()
    }

    fn load(&self, id: &str) -> Result<Template, TemplateError> {
        let attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self
                .fetch_with_timeout(id)
                .and_then(|spec| Template::resolve(&spec, self.config.dpi));
            match result {
                Ok(template) => {
                    tracing::debug!(template = id, attempt, "template loaded");
                    return Ok(template);
                }
                Err(err) if err.is_transient() && attempt < attempts => {
                    tracing::debug!(template = id, attempt, error = %err, "retrying template fetch");
                    thread::sleep(Duration::from_millis(
                        self.config.retry_backoff_ms * u64::from(attempt),
                    ));
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_with_timeout(&self, id: &str) -> Result<TemplateSpec, TemplateError> {
        let timeout_ms = self.config.fetch_timeout_ms;
        if timeout_ms == 0 {
            return self
                .source
                .fetch(id)
                .map_err(|err| TemplateError::from_source(id, err));
        }

        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(&self.source);
        let owned_id = id.to_string();
        thread::spawn(move || {
            // The receiver is gone once the fetch timed out.
            let _ = tx.send(source.fetch(&owned_id));
        });

        match rx.recv_timeout(Duration::from_millis(timeout_ms)) {
            Ok(result) => result.map_err(|err| TemplateError::from_source(id, err)),
            Err(RecvTimeoutError::Timeout) => Err(TemplateError::Timeout {
                id: id.to_string(),
                after_ms: timeout_ms,
            }),
            Err(RecvTimeoutError::Disconnected) => Err(TemplateError::from_source(
                id,
                SourceError::Unavailable("fetch worker exited".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::FALLBACK_TEMPLATE_ID;
    use crate::template::tests::rect_spec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Source that counts fetches and can be told to misbehave.
    struct FlakySource {
        spec: TemplateSpec,
        fetches: AtomicUsize,
        failures_before_success: usize,
        delay: Duration,
    }

    impl FlakySource {
        fn new(spec: TemplateSpec) -> Self {
            Self {
                spec,
                fetches: AtomicUsize::new(0),
                failures_before_success: 0,
                delay: Duration::ZERO,
            }
        }
    }

    impl TemplateSource for FlakySource {
        fn ids(&self) -> Vec<String> {
            vec![self.spec.id.clone()]
        }

        fn fetch(&self, id: &str) -> Result<TemplateSpec, SourceError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if id != self.spec.id {
                return Err(SourceError::NotFound(id.to_string()));
            }
            if n < self.failures_before_success {
                return Err(SourceError::Unavailable("busy".into()));
            }
            Ok(self.spec.clone())
        }
    }

    fn quick_config() -> ResolverConfig {
        ResolverConfig {
            retry_backoff_ms: 1,
            ..ResolverConfig::default()
        }
    }

    #[test]
    fn concurrent_first_requests_load_once() {
        let source = Arc::new(FlakySource {
            delay: Duration::from_millis(30),
            ..FlakySource::new(rect_spec("rect-1x3", 3.0, 1.0))
        });
        let resolver = TemplateResolver::new(source.clone(), quick_config());
        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let template = resolver.get("rect-1x3").unwrap();
                    assert_eq!(template.height_px, 96.0);
                });
            }
        });
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        let again = resolver.get("rect-1x3").unwrap();
        assert!(Arc::ptr_eq(&again, &resolver.get("rect-1x3").unwrap()));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn transient_failures_are_retried() {
        let source = Arc::new(FlakySource {
            failures_before_success: 2,
            ..FlakySource::new(rect_spec("rect-1x3", 3.0, 1.0))
        });
        let resolver = TemplateResolver::new(source.clone(), quick_config());
        assert!(resolver.get("rect-1x3").is_ok());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let source = Arc::new(FlakySource {
            failures_before_success: 10,
            ..FlakySource::new(rect_spec("rect-1x3", 3.0, 1.0))
        });
        let resolver = TemplateResolver::new(source.clone(), quick_config());
        assert!(matches!(
            resolver.get("rect-1x3"),
            Err(TemplateError::Source { .. })
        ));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn geometry_errors_are_not_retried_or_cached() {
        let spec = TemplateSpec {
            inner_path: None,
            ..rect_spec("blank", 3.0, 1.0)
        };
        let source = Arc::new(FlakySource::new(spec));
        let resolver = TemplateResolver::new(source.clone(), quick_config());
        assert!(matches!(
            resolver.get("blank"),
            Err(TemplateError::MissingGeometry { .. })
        ));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
        let _ = resolver.get("blank");
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn slow_fetch_times_out() {
        let source = Arc::new(FlakySource {
            delay: Duration::from_millis(300),
            ..FlakySource::new(rect_spec("rect-1x3", 3.0, 1.0))
        });
        let config = ResolverConfig {
            fetch_timeout_ms: 20,
            max_attempts: 1,
            ..quick_config()
        };
        let resolver = TemplateResolver::new(source, config);
        assert!(matches!(
            resolver.get("rect-1x3"),
            Err(TemplateError::Timeout { after_ms: 20, .. })
        ));
    }

    #[test]
    fn unknown_id_falls_back() {
        let resolver = TemplateResolver::new(Arc::new(StaticSource::builtin()), quick_config());
        assert!(matches!(
            resolver.get("no-such-shape"),
            Err(TemplateError::NotFound { .. })
        ));
        let template = resolver.get_or_fallback("no-such-shape");
        assert_eq!(template.id, FALLBACK_TEMPLATE_ID);
        assert_eq!(resolver.for_badge("no-such-shape").unwrap().id, FALLBACK_TEMPLATE_ID);

        let strict = TemplateResolver::new(
            Arc::new(StaticSource::builtin()),
            ResolverConfig {
                fallback_on_error: false,
                ..quick_config()
            },
        );
        assert!(strict.for_badge("no-such-shape").is_err());
    }

    #[test]
    fn invalidate_forces_reload() {
        let source = Arc::new(FlakySource::new(rect_spec("rect-1x3", 3.0, 1.0)));
        let resolver = TemplateResolver::new(source.clone(), quick_config());
        let first = resolver.get("rect-1x3").unwrap();
        resolver.invalidate("rect-1x3");
        let second = resolver.get("rect-1x3").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        let third = resolver.reload("rect-1x3").unwrap();
        assert!(!Arc::ptr_eq(&second, &third));
        resolver.clear();
        let _ = resolver.get("rect-1x3").unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn load_all_isolates_failures() {
        let mut specs = vec![rect_spec("rect-1x3", 3.0, 1.0)];
        specs.push(TemplateSpec {
            inner_path: Some("M0 0 L10 0".into()),
            ..rect_spec("open", 3.0, 1.0)
        });
        specs.push(rect_spec("rect-1_5x3", 3.0, 1.5));
        let resolver = TemplateResolver::new(Arc::new(StaticSource::new(specs)), quick_config());
        let (loaded, failures) = resolver.load_all();
        let ids: Vec<_> = loaded.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["rect-1x3", "rect-1_5x3"]);
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], TemplateError::InvalidPath { id, .. } if id == "open"));
    }

    #[test]
    fn builtin_catalog_loads_completely() {
        let resolver = TemplateResolver::builtin();
        let (loaded, failures) = resolver.load_all();
        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(loaded.len(), 6);
    }

    #[test]
    fn bundle_json_is_read() {
        let json = r#"{
            "version": 1,
            "templates": [
                { "id": "tiny", "name": "Tiny", "widthIn": 1, "heightIn": 1,
                  "innerPath": "M0 0 L10 0 L10 10 L0 10 Z", "viewBox": "0 0 10 10" }
            ]
        }"#;
        let source = StaticSource::from_json_str(json).unwrap();
        assert_eq!(source.ids(), ["tiny"]);
        let template = Template::resolve(&source.fetch("tiny").unwrap(), 96.0).unwrap();
        assert_eq!(template.design_box.width, 96.0);
        assert!(StaticSource::from_json_str(r#"{"version": 7, "templates": []}"#).is_err());
    }

    #[test]
    fn svg_paths_are_found_in_any_attribute_order() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 100">
            <path fill="none" d="M0 0 L300 0 L300 100 L0 100 Z" id="OUTLINE"/>
            <path id="inner" class="cut" d="M10 10 L290 10 L290 90 L10 90 Z"/>
        </svg>"#;
        assert_eq!(
            extract_path(svg, "Inner").as_deref(),
            Some("M10 10 L290 10 L290 90 L10 90 Z")
        );
        assert_eq!(
            extract_path(svg, "Outline").as_deref(),
            Some("M0 0 L300 0 L300 100 L0 100 Z")
        );
        assert_eq!(extract_view_box(svg).as_deref(), Some("0 0 300 100"));
        assert_eq!(extract_path(svg, "missing"), None);
    }

    #[test]
    fn svg_directory_source_reads_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            r#"{ "version": 1, "templates": [
                { "id": "rect-1x3", "name": "Rect", "widthInches": 3, "heightInches": 1,
                  "svgFile": "rect.svg", "safeInsetPx": 6 },
                { "id": "gone", "widthInches": 3, "heightInches": 1, "svgFile": "gone.svg" }
            ] }"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("rect.svg"),
            r#"<svg viewBox="0 0 3150 1150"><path id="Inner" d="M0 0 L3150 0 L3150 1150 L0 1150 Z"/></svg>"#,
        )
        .unwrap();

        let source = SvgDirectorySource::open(dir.path()).unwrap();
        assert_eq!(source.ids(), ["rect-1x3", "gone"]);
        let spec = source.fetch("rect-1x3").unwrap();
        assert_eq!(spec.constraints.safe_inset_px, Some(6.0));
        assert!(spec.outline_path.is_none());

        let resolver = TemplateResolver::new(Arc::new(source), quick_config());
        let (loaded, failures) = resolver.load_all();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].design_box.height, 96.0);
        assert!(matches!(&failures[0], TemplateError::Source { id, .. } if id == "gone"));
    }
}
