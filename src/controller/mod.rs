//! Incremental extraction controller.
//!
//! Owns every piece of build state: parser options, the fragment store, the
//! cache, the query engine, the dataset and the page registry. All work runs
//! on the calling thread; a change is handled to completion before the next.
//!
//! ```text
//!                     ┌──────────────────────────────┐
//!  extract_all() ────►│ for each source file:        │
//!  handle_change() ──►│   page span   ─► cache raw   │──► inject into pages
//!                     │   static span ─► rewrite ─►  │
//!                     │     evaluate ─► cache result │
//!                     └──────────────────────────────┘
//! ```
//!
//! Only cache write failures stop a batch or the watch loop; every other
//! failure is logged against its file or page and skipped.

use crate::cache::CacheStore;
use crate::config::ProjectConfig;
use crate::engine::{Dataset, QueryEngine};
use crate::error::{PipelineError, PipelineResult};
use crate::extract::{self, ParseOptions, QuerySpan, SourceParser};
use crate::logger::Progress;
use crate::pages::{Page, PageRegistry};
use crate::rewrite::{FragmentStore, JoinOptions, rewrite, strip_delimiters, substitute_context};
use crate::utils::files::{SourceFile, collect_source_files, is_source_file, normalize_path};
use crate::log;
use anyhow::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Paths and options the controller needs, resolved from the project config.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub root: PathBuf,
    pub src: PathBuf,
    pub cache_root: PathBuf,
    pub fragments_dir: Option<PathBuf>,
    pub fragments_entry: Option<PathBuf>,
    pub join_options: JoinOptions,
    pub parse_options: ParseOptions,
    /// Dataset file re-read before each incremental change, if any.
    pub dataset: Option<PathBuf>,
}

impl ControllerSettings {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            root: config.get_root().to_path_buf(),
            src: config.build.src.clone(),
            cache_root: config.cache_root().to_path_buf(),
            fragments_dir: config.fragments.dir.clone(),
            fragments_entry: config.fragments_entry(),
            join_options: JoinOptions {
                match_field: config.query.match_field.clone(),
                auto_refs: config.query.auto_refs,
            },
            parse_options: ParseOptions::from_babelrc(&config.build.babelrc),
            dataset: Some(config.query.dataset.clone()),
        }
    }
}

/// Evaluated query and the text it was evaluated from, before delimiter stripping.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub result: Value,
    pub final_query: String,
}

/// Counters of one batch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub files: usize,
    pub pages: usize,
    pub statics: usize,
    pub failed: usize,
}

/// What a single change did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeReport {
    pub fragments_reloaded: bool,
    pub page_cached: bool,
    pub pages_updated: usize,
    pub static_cached: bool,
}

#[derive(Debug, Default)]
struct FileOutcome {
    page: bool,
    statics: bool,
    failed: bool,
}

pub struct Controller<E: QueryEngine, R: PageRegistry> {
    settings: ControllerSettings,
    parser: SourceParser,
    fragments: FragmentStore,
    cache: CacheStore,
    engine: E,
    dataset: Dataset,
    registry: R,
}

impl<E: QueryEngine, R: PageRegistry> Controller<E, R> {
    pub fn new(settings: ControllerSettings, engine: E, dataset: Dataset, registry: R) -> Self {
        Self {
            parser: SourceParser::new(settings.parse_options.clone()),
            cache: CacheStore::new(&settings.cache_root),
            fragments: FragmentStore::new(),
            settings,
            engine,
            dataset,
            registry,
        }
    }

    pub const fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub const fn fragments(&self) -> &FragmentStore {
        &self.fragments
    }

    pub const fn registry(&self) -> &R {
        &self.registry
    }

    /// Clear the cache, publish the join options and load fragments once.
    pub fn prepare(&self) -> PipelineResult<()> {
        self.cache.reset()?;
        self.cache.write_options(&self.settings.join_options)?;
        log!("cache"; "using `{}`", self.rel(self.cache.root()));
        self.reload_fragments();
        Ok(())
    }

    /// Extract and cache every query under the source root.
    pub fn extract_all(&self) -> PipelineResult<BatchReport> {
        let files = collect_source_files(&self.settings.src);
        let mut report = BatchReport {
            files: files.len(),
            ..BatchReport::default()
        };

        let progress = Progress::start("extract", files.len());
        for path in &files {
            match self.process_file(path) {
                Ok(outcome) => {
                    report.pages += usize::from(outcome.page);
                    report.statics += usize::from(outcome.statics);
                    report.failed += usize::from(outcome.failed);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    report.failed += 1;
                    log!("error"; "{}: {e}", self.rel(path));
                }
            }
            if let Some(progress) = &progress {
                progress.inc();
            }
        }
        drop(progress);

        log!(
            "extract";
            "{} files, {} page queries, {} static queries, {} failed",
            report.files, report.pages, report.statics, report.failed
        );
        Ok(report)
    }

    /// Re-run extraction for one changed file.
    ///
    /// A change under the fragments directory reloads the fragment index
    /// first, since the fragments entry itself carries no query markers.
    /// The dataset is re-read before any query of the file is evaluated.
    pub fn handle_change(&mut self, path: &Path) -> PipelineResult<ChangeReport> {
        let path = normalize_path(path);
        let mut report = ChangeReport::default();

        if self
            .settings
            .fragments_dir
            .as_ref()
            .is_some_and(|dir| path.starts_with(dir))
        {
            report.fragments_reloaded = self.reload_fragments();
        }

        if !is_source_file(&path) || !path.is_file() {
            return Ok(report);
        }

        let file = SourceFile::read(&path).map_err(|e| PipelineError::Io(path.clone(), e))?;
        if !extract::has_page_marker(&file.text) && !extract::has_static_marker(&file.text) {
            return Ok(report);
        }

        let extraction = extract::extract(&self.parser, &file)?;
        self.reload_dataset();
        if let Some(span) = &extraction.page
            && self.settle(&file.path, self.cache_page(span))?
        {
            report.page_cached = true;
            report.pages_updated = self.refresh_pages(&file.path, &span.raw);
        }
        if let Some(span) = &extraction.statics {
            report.static_cached = self.settle(&file.path, self.process_static(span))?;
        }

        log!(
            "watch";
            "{} updated at {}",
            self.rel(&file.path),
            file.read_at.format("%H:%M:%S")
        );
        Ok(report)
    }

    /// Inject the cached page query into a newly created page, if its component has one.
    ///
    /// Returns whether the page was republished.
    pub fn on_create_page(&mut self, page: Page) -> Result<bool> {
        let Some(entry) = self.cache.read_page_entry(&page.component) else {
            return Ok(false);
        };
        self.inject_page_query(page, &entry.unprocessed)?;
        Ok(true)
    }

    /// Apply [`Self::on_create_page`] to every registered page, isolating failures.
    pub fn apply_page_queries(&mut self) -> usize {
        let mut updated = 0;
        for page in self.registry.pages() {
            let component = page.component.clone();
            match self.on_create_page(page) {
                Ok(true) => updated += 1,
                Ok(false) => {}
                Err(e) => log!("error"; "{}: {e:#}", self.rel(&component)),
            }
        }
        updated
    }

    /// Evaluate a page query with the page's context and republish the page.
    pub fn inject_page_query(&mut self, mut page: Page, raw: &str) -> Result<()> {
        let substituted = substitute_context(raw, &page.context)?;
        let outcome = self.run_query(&substituted, &page.component)?;

        page.set_data(outcome.result);
        let url = page.path.clone();
        self.registry.delete_page(&page)?;
        self.registry.create_page(page)?;
        log!("pages"; "{url}");
        Ok(())
    }

    /// Rewrite, strip delimiters and evaluate.
    ///
    /// `final_query` is the rewritten text before stripping, which is what
    /// static entries are keyed by.
    pub fn run_query(&self, raw: &str, path: &Path) -> PipelineResult<QueryOutcome> {
        let fragments = self.fragments.snapshot();
        let final_query = rewrite(raw, &fragments, || self.cache.options())?;
        let stripped = strip_delimiters(&final_query);

        let evaluation = |source| PipelineError::Evaluation {
            path: self.rel(path),
            query: stripped.clone(),
            source,
        };
        let query = self.engine.parse(&stripped).map_err(evaluation)?;
        let result = self
            .engine
            .evaluate(&query, &self.dataset)
            .map_err(evaluation)?;

        Ok(QueryOutcome {
            result,
            final_query,
        })
    }

    fn process_file(&self, path: &Path) -> PipelineResult<FileOutcome> {
        let file = SourceFile::read(path).map_err(|e| PipelineError::Io(path.to_path_buf(), e))?;
        let extraction = extract::extract(&self.parser, &file)?;
        let mut outcome = FileOutcome::default();

        // The two spans of a file succeed or fail independently.
        if let Some(span) = &extraction.page {
            outcome.page = self.settle(&file.path, self.cache_page(span))?;
            outcome.failed |= !outcome.page;
        }
        if let Some(span) = &extraction.statics {
            outcome.statics = self.settle(&file.path, self.process_static(span))?;
            outcome.failed |= !outcome.statics;
        }
        Ok(outcome)
    }

    /// Log a non-fatal span failure and carry on. Returns whether the span succeeded.
    fn settle(&self, path: &Path, result: PipelineResult<()>) -> PipelineResult<bool> {
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                log!("error"; "{}: {e}", self.rel(path));
                Ok(false)
            }
        }
    }

    /// Cache a page query raw. The rewrite only checks that its fragments resolve.
    fn cache_page(&self, span: &QuerySpan) -> PipelineResult<()> {
        rewrite(&span.raw, &self.fragments.snapshot(), || self.cache.options())?;
        self.cache.put_page(&span.path, &span.raw)?;
        Ok(())
    }

    fn process_static(&self, span: &QuerySpan) -> PipelineResult<()> {
        let outcome = self.run_query(&span.raw, &span.path)?;
        self.cache.put_static(&outcome.final_query, &outcome.result)?;
        Ok(())
    }

    /// Republish every page rendered by `component`. Returns how many succeeded.
    fn refresh_pages(&mut self, component: &Path, raw: &str) -> usize {
        let pages: Vec<Page> = self
            .registry
            .pages()
            .into_iter()
            .filter(|page| page.uses_component(component))
            .collect();

        let mut updated = 0;
        for page in pages {
            let url = page.path.clone();
            match self.inject_page_query(page, raw) {
                Ok(()) => updated += 1,
                Err(e) => log!("error"; "{} ({url}): {e:#}", self.rel(component)),
            }
        }
        updated
    }

    /// Re-read the dataset so a change is evaluated against current content.
    /// A dataset that fails to load keeps the previous nodes.
    fn reload_dataset(&mut self) {
        let Some(path) = &self.settings.dataset else {
            return;
        };
        match Dataset::load(path) {
            Ok(dataset) => self.dataset = dataset,
            Err(e) => log!("warn"; "keeping previous dataset: {e:#}"),
        }
    }

    /// Reload fragments from the configured entry. Returns whether the index changed.
    fn reload_fragments(&self) -> bool {
        let Some(entry) = &self.settings.fragments_entry else {
            return false;
        };
        match self.fragments.reload(entry) {
            Ok(changed) => {
                if changed {
                    let count = self.fragments.snapshot().index().map_or(0, |i| i.len());
                    log!("fragments"; "loaded {count} fragments");
                }
                changed
            }
            Err(e) => {
                log!("warn"; "{e:#}");
                false
            }
        }
    }

    fn rel(&self, path: &Path) -> String {
        path.strip_prefix(&self.settings.root)
            .unwrap_or(path)
            .display()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use crate::engine::fake::FakeEngine;
    use crate::pages::{MemoryRegistry, RegistryCall};
    use serde_json::{Map, json};
    use std::fs;
    use tempfile::TempDir;

    struct Site {
        _dir: TempDir,
        root: PathBuf,
    }

    impl Site {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = normalize_path(dir.path());
            fs::create_dir_all(root.join("src/fragments")).unwrap();
            Self { _dir: dir, root }
        }

        fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn settings(&self) -> ControllerSettings {
            let fragments_dir = self.root.join("src/fragments");
            ControllerSettings {
                root: self.root.clone(),
                src: self.root.join("src"),
                cache_root: self.root.join(".cache/groq"),
                fragments_entry: Some(fragments_dir.join("index.toml")),
                fragments_dir: Some(fragments_dir),
                join_options: JoinOptions::default(),
                parse_options: ParseOptions::default(),
                dataset: None,
            }
        }

        fn controller(&self, pages: Vec<Page>) -> Controller<FakeEngine, MemoryRegistry> {
            Controller::new(
                self.settings(),
                FakeEngine::default(),
                dataset(),
                MemoryRegistry::new(pages),
            )
        }
    }

    fn dataset() -> Dataset {
        Dataset::new(vec![
            json!({ "_type": "post", "slug": { "current": "a" }, "title": "A" }),
            json!({ "_type": "post", "slug": { "current": "b" }, "title": "B" }),
        ])
    }

    fn context(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    const POST_TEMPLATE: &str = r#"
export const groqQuery = `*[slug.current == $slug][0]`;
export default function Post({ pageContext }) { return pageContext.data.title; }
"#;

    #[test]
    fn test_extract_all_caches_both_kinds() {
        let site = Site::new();
        let template = site.write("src/templates/post.js", POST_TEMPLATE);
        site.write(
            "src/components/nav.jsx",
            r#"export const Nav = () => useGroqQuery(`*[_type == "post"]`);"#,
        );
        site.write("src/plain.js", "export const a = 1;");
        site.write("src/node_modules/lib/index.js", "useGroqQuery(`*`)");

        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();
        let report = controller.extract_all().unwrap();

        assert_eq!(
            report,
            BatchReport {
                files: 3,
                pages: 1,
                statics: 1,
                failed: 0
            }
        );
        assert_eq!(
            controller.cache().read_page_entry(&template).unwrap().unprocessed,
            "`*[slug.current == $slug][0]`"
        );
        assert_eq!(
            controller.cache().read_static(r#"*[_type == "post"]"#),
            Some(Value::Array(dataset().nodes().to_vec()))
        );
    }

    #[test]
    fn test_failures_are_isolated() {
        let site = Site::new();
        site.write("src/a.js", "useGroqQuery(`*{ ${missing} }`)");
        site.write("src/b.js", r#"useGroqQuery(`*[_type == "post"]`)"#);

        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();
        let report = controller.extract_all().unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.statics, 1);
    }

    #[test]
    fn test_page_with_unresolved_fragment_dropped() {
        let site = Site::new();
        let template = site.write(
            "src/templates/post.js",
            "export const groqQuery = `*[slug.current == $slug]{ ${card} }`;",
        );

        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();
        let report = controller.extract_all().unwrap();
        assert_eq!((report.pages, report.failed), (0, 1));
        assert!(controller.cache().read_page_entry(&template).is_none());
    }

    #[test]
    fn test_page_failure_keeps_static_in_same_file() {
        let site = Site::new();
        let template = site.write(
            "src/templates/page.js",
            r#"export const groqQuery = `*{ ${card} }`;
export const Menu = () => useGroqQuery(`*[_type == "post"]`);
"#,
        );

        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();
        let report = controller.extract_all().unwrap();
        assert_eq!(
            report,
            BatchReport {
                files: 1,
                pages: 0,
                statics: 1,
                failed: 1
            }
        );
        assert!(controller.cache().read_page_entry(&template).is_none());
        assert!(controller.cache().read_static(r#"*[_type == "post"]"#).is_some());
    }

    #[test]
    fn test_handle_change_page_failure_keeps_static() {
        let site = Site::new();
        let mut controller = site.controller(Vec::new());
        controller.prepare().unwrap();

        let template = site.write(
            "src/templates/page.js",
            r#"export const groqQuery = `*{ ${card} }`;
export const Menu = () => useGroqQuery(`*[_type == "post"]`);
"#,
        );
        let report = controller.handle_change(&template).unwrap();
        assert!(!report.page_cached);
        assert!(report.static_cached);
        assert!(controller.cache().read_static(r#"*[_type == "post"]"#).is_some());
    }

    #[test]
    fn test_handle_change_reads_current_dataset() {
        let site = Site::new();
        let dataset_path = site.write("content/dataset.ndjson", r#"{"_type":"post","title":"A"}"#);
        let mut settings = site.settings();
        settings.dataset = Some(dataset_path);
        let mut controller = Controller::new(
            settings,
            FakeEngine::default(),
            dataset(),
            MemoryRegistry::default(),
        );
        controller.prepare().unwrap();

        site.write(
            "content/dataset.ndjson",
            "{\"_type\":\"post\",\"title\":\"C\"}\n{\"_type\":\"page\"}\n",
        );
        let source = site.write("src/list.js", r#"useGroqQuery(`*[_type == "post"]`)"#);
        controller.handle_change(&source).unwrap();
        assert_eq!(
            controller.cache().read_static(r#"*[_type == "post"]"#),
            Some(json!([{ "_type": "post", "title": "C" }]))
        );
    }

    #[test]
    fn test_cache_write_failure_aborts_batch() {
        let site = Site::new();
        site.write("src/a.js", r#"useGroqQuery(`*[_type == "post"]`)"#);
        // A file where the cache directory should be
        site.write(".cache/groq", "");

        let controller = site.controller(Vec::new());
        let err = controller.extract_all().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_static_key_uses_rewritten_text() {
        let site = Site::new();
        site.write("src/fragments/index.toml", "fields = \"title, author->\"\n");
        site.write("src/list.js", "useGroqQuery(`*[_type == \"post\"]{ ${fields} }`)");

        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();
        controller.extract_all().unwrap();

        let final_query = r#"*[_type == "post"]{ title, *[ id == ^.author ][0] }"#;
        assert!(controller.cache().entry_path(CacheKey::for_static(final_query)).is_file());
        assert!(controller
            .cache()
            .read_static(r#"*[_type == "post"]{ ${fields} }"#)
            .is_none());
    }

    #[test]
    fn test_run_query_strips_delimiters_after_rewrite() {
        let site = Site::new();
        let controller = site.controller(Vec::new());
        controller.prepare().unwrap();

        let outcome = controller
            .run_query(r#"`*[slug.current == "b"][0]`"#, &site.root.join("src/a.js"))
            .unwrap();
        assert_eq!(outcome.final_query, r#"`*[slug.current == "b"][0]`"#);
        assert_eq!(outcome.result["title"], json!("B"));
        assert_eq!(controller.engine.seen(), vec![r#"*[slug.current == "b"][0]"#]);
    }

    #[test]
    fn test_run_query_reads_options_artifact() {
        let site = Site::new();
        let mut settings = site.settings();
        settings.join_options.match_field = "_id".into();
        let controller = Controller::new(
            settings,
            FakeEngine::default(),
            dataset(),
            MemoryRegistry::default(),
        );
        controller.prepare().unwrap();

        let outcome = controller
            .run_query("*{ author-> }", &site.root.join("src/a.js"))
            .unwrap();
        assert_eq!(outcome.final_query, "*{ *[ _id == ^.author ][0] }");
    }

    #[test]
    fn test_end_to_end_page_update() {
        let site = Site::new();
        let template = site.write("src/templates/post.js", POST_TEMPLATE);
        let page = Page::new("/posts/b", &template).with_context(context(json!({ "slug": "b" })));
        let other = Page::new("/about", site.root.join("src/about.js"));

        let mut controller = site.controller(vec![page, other]);
        controller.prepare().unwrap();
        controller.extract_all().unwrap();

        assert_eq!(controller.apply_page_queries(), 1);
        let updated = controller.registry().get("/posts/b").unwrap();
        assert_eq!(updated.data().unwrap()["title"], json!("B"));
        assert!(controller.registry().get("/about").unwrap().data().is_none());
        assert_eq!(
            controller.registry().calls(),
            [
                RegistryCall::Delete("/posts/b".into()),
                RegistryCall::Create("/posts/b".into())
            ]
        );
    }

    #[test]
    fn test_handle_change_republishes_pages() {
        let site = Site::new();
        let template = site.write("src/templates/post.js", "export default () => null;");
        let pages = vec![
            Page::new("/posts/a", &template).with_context(context(json!({ "slug": "a" }))),
            Page::new("/posts/b", &template).with_context(context(json!({ "slug": "b" }))),
        ];

        let mut controller = site.controller(pages);
        controller.prepare().unwrap();
        controller.extract_all().unwrap();
        assert!(controller.registry().calls().is_empty());

        site.write("src/templates/post.js", POST_TEMPLATE);
        let report = controller.handle_change(&template).unwrap();
        assert!(report.page_cached);
        assert_eq!(report.pages_updated, 2);
        assert_eq!(
            controller.registry().get("/posts/a").unwrap().data().unwrap()["title"],
            json!("A")
        );
        assert_eq!(
            controller.registry().get("/posts/b").unwrap().data().unwrap()["title"],
            json!("B")
        );
    }

    #[test]
    fn test_handle_change_page_failure_isolated() {
        let site = Site::new();
        let template = site.write("src/templates/post.js", POST_TEMPLATE);
        let pages = vec![
            Page::new("/bad", &template).with_context(context(json!({ "slug": ["x"] }))),
            Page::new("/posts/a", &template).with_context(context(json!({ "slug": "a" }))),
        ];

        let mut controller = site.controller(pages);
        controller.prepare().unwrap();
        let report = controller.handle_change(&template).unwrap();
        assert_eq!(report.pages_updated, 1);
        assert!(controller.registry().get("/bad").unwrap().data().is_none());
    }

    #[test]
    fn test_handle_change_without_marker_is_noop() {
        let site = Site::new();
        let path = site.write("src/util.js", "export const x = 1;");
        let mut controller = site.controller(Vec::new());
        controller.prepare().unwrap();

        assert_eq!(controller.handle_change(&path).unwrap(), ChangeReport::default());
        assert_eq!(fs::read_dir(controller.cache().root()).unwrap().count(), 1);
    }

    #[test]
    fn test_fragment_change_reloads_before_marker_check() {
        let site = Site::new();
        let entry = site.write("src/fragments/index.toml", "fields = \"title\"\n");
        let source = site.write("src/list.js", "useGroqQuery(`*{ ${fields} }`)");

        let mut controller = site.controller(Vec::new());
        controller.prepare().unwrap();

        site.write("src/fragments/index.toml", "fields = \"title, slug\"\n");
        let report = controller.handle_change(&entry).unwrap();
        assert!(report.fragments_reloaded);
        assert!(!report.static_cached);
        let snapshot = controller.fragments().snapshot();
        assert_eq!(snapshot.index().map(|i| i.len()), Some(1));

        controller.handle_change(&source).unwrap();
        assert!(controller.cache().read_static("*{ title, slug }").is_some());
    }

    #[test]
    fn test_on_create_page_without_entry_is_untouched() {
        let site = Site::new();
        let mut controller = site.controller(Vec::new());
        controller.prepare().unwrap();

        let page = Page::new("/", site.root.join("src/index.js"));
        assert!(!controller.on_create_page(page).unwrap());
        assert!(controller.registry().calls().is_empty());
    }
}
