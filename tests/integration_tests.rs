use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use idea_researcher::cache::ResearchCache;
use idea_researcher::config::Config;
use idea_researcher::generator::progress::{MemoryProgress, ProgressKind};
use idea_researcher::llm::{Embedder, LanguageModel, TextStream};
use idea_researcher::retrievers::{Retriever, SearchBackend, SearchError, SearchHit};
use idea_researcher::scraper::Scraper;
use idea_researcher::{
    PipelineStage, ReportType, ResearchContext, ResearchRequest, Researcher,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ROLE_REPLY: &str =
    r#"{"name": "🏢 Real Estate Agent", "agent_role_prompt": "You are a property technology analyst."}"#;

/// Answers role, decomposition and report prompts, recording every call.
struct ScriptedModel {
    decomposition: String,
    role: String,
    report_failures: Mutex<usize>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedModel {
    fn new(decomposition: &str) -> Self {
        Self {
            decomposition: decomposition.to_string(),
            role: ROLE_REPLY.to_string(),
            report_failures: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_reports(self, failures: usize) -> Self {
        *self.report_failures.lock().unwrap() = failures;
        self
    }

    fn with_role(mut self, role: &str) -> Self {
        self.role = role.to_string();
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn decomposition_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|(_, user)| user.contains("google search queries"))
            .count()
    }

    fn report_system_prompts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(_, user)| !user.starts_with("task:") && !user.contains("google search queries"))
            .map(|(system, _)| system)
            .collect()
    }

    /// Cites every source in the prompt, repeating URLs that appear more than once.
    fn write_report(&self, user: &str) -> Result<String> {
        {
            let mut failures = self.report_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(anyhow!("model overloaded"));
            }
        }
        let mut report = String::from("# Findings\n\nThe idea looks viable.\n\n## References\n");
        for line in user.lines() {
            if let Some(pos) = line.find("Source: ") {
                report.push_str(&format!("- {}\n", &line[pos + "Source: ".len()..]));
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        if user.starts_with("task:") {
            Ok(self.role.clone())
        } else if user.contains("google search queries") {
            Ok(self.decomposition.clone())
        } else {
            self.write_report(user)
        }
    }

    async fn stream(&self, system: &str, user: &str) -> Result<TextStream> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), user.to_string()));
        let report = self.write_report(user)?;
        let parts: Vec<Result<String>> = report.lines().map(|l| Ok(format!("{}\n", l))).collect();
        Ok(futures::stream::iter(parts).boxed())
    }
}

/// Scores text by how many words it shares with a small vocabulary.
struct VocabularyEmbedder;

#[async_trait]
impl Embedder for VocabularyEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                ["condo", "concierge", "angle", "x", "page"]
                    .iter()
                    .map(|w| lower.matches(w).count() as f64 + 0.1)
                    .collect()
            })
            .collect())
    }
}

/// Returns two query-specific URLs, or fails for the configured queries.
struct FakeBackend {
    name: &'static str,
    fail_queries: HashSet<String>,
    fail_all: bool,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FakeBackend {
    fn working(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_queries: HashSet::new(),
            fail_all: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_queries: HashSet::new(),
            fail_all: true,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing_for(name: &'static str, queries: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_queries: queries.iter().map(|q| q.to_string()).collect(),
            fail_all: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        if self.fail_all || self.fail_queries.contains(query) {
            return Err(SearchError::Config {
                backend: self.name,
                reason: "invalid api key".to_string(),
            });
        }
        let slug: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        Ok((0..2)
            .map(|i| SearchHit {
                url: format!("https://{}.example.com/page-{}", slug, i),
                snippet: format!("result {} for {}", i, query),
            })
            .collect())
    }
}

struct FakeScraper {
    calls: Mutex<Vec<String>>,
}

impl FakeScraper {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scraper for FakeScraper {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(url.to_string());
        if url.contains("unreachable") {
            return Err(anyhow!("connection timed out"));
        }
        Ok(format!("This page {} covers condo concierge services.", url))
    }
}

struct Harness {
    _dir: TempDir,
    config: Config,
    model: Arc<ScriptedModel>,
    scraper: Arc<FakeScraper>,
    progress: Arc<MemoryProgress>,
}

impl Harness {
    fn new(model: ScriptedModel) -> Self {
        Self::with_progress(model, MemoryProgress::new())
    }

    fn with_progress(model: ScriptedModel, progress: MemoryProgress) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config {
            output_path: dir.path().join("outputs"),
            ..Default::default()
        };
        config.cache.cache_dir = dir.path().join("cache");
        config.retriever.max_results_per_query = 4;
        Self {
            _dir: dir,
            config,
            model: Arc::new(model),
            scraper: FakeScraper::new(),
            progress: Arc::new(progress),
        }
    }

    fn researcher(&self, backends: Vec<Arc<FakeBackend>>) -> Researcher {
        let backends: Vec<Arc<dyn SearchBackend>> = backends
            .into_iter()
            .map(|b| b as Arc<dyn SearchBackend>)
            .collect();
        Researcher::new(ResearchContext::from_parts(
            self.config.clone(),
            self.model.clone(),
            Arc::new(VocabularyEmbedder),
            Retriever::new(backends),
            self.scraper.clone(),
            self.progress.clone(),
        ))
    }
}

#[tokio::test]
async fn explicit_urls_are_deduplicated_and_skip_decomposition() {
    let harness = Harness::new(ScriptedModel::new(r#"["unused"]"#));
    let backend = FakeBackend::working("primary");
    let researcher = harness.researcher(vec![backend.clone()]);

    let a = "https://a.example.com/condo";
    let b = "https://b.example.com/condo";
    let request = ResearchRequest::new("condo concierge app", ReportType::IdeaResearch)
        .with_source_urls([a, b, a]);
    let outcome = researcher.run(request).await.unwrap();

    assert_eq!(outcome.visited_urls, vec![a, b]);
    assert_eq!(harness.scraper.calls().len(), 2);
    assert_eq!(harness.model.decomposition_calls(), 0);
    assert!(backend.calls().is_empty());

    assert_eq!(outcome.context.len(), 1);
    let sources = outcome.context[0].matches("Source: ").count();
    assert!(sources <= 2 && sources > 0);

    let admitted: Vec<String> = harness
        .progress
        .logs()
        .into_iter()
        .filter(|l| l.starts_with("✅ Adding source url"))
        .collect();
    assert_eq!(admitted.len(), 2);
}

#[tokio::test]
async fn decomposition_researches_each_sub_idea_and_the_original() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle 1", "x angle 2"]"#));
    let backend = FakeBackend::working("primary");
    let researcher = harness.researcher(vec![backend.clone()]);

    let outcome = researcher
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    let queries: Vec<String> = backend.calls().into_iter().map(|(q, _)| q).collect();
    assert_eq!(queries, vec!["x angle 1", "x angle 2", "x"]);
    assert!(backend.calls().iter().all(|(_, max)| *max == 4));
    assert_eq!(outcome.context.len(), 3);
    assert_eq!(outcome.visited_urls.len(), 6);
    assert!(!outcome.from_cache);

    let words = outcome.context.join("\n\n").split_whitespace().count();
    assert!(
        harness
            .progress
            .logs()
            .contains(&format!("Total research words: {}", words))
    );
}

#[tokio::test]
async fn primary_backend_failure_falls_back_with_same_query() {
    let harness = Harness::new(ScriptedModel::new(r#"["q angle"]"#));
    let primary = FakeBackend::failing("primary");
    let fallback = FakeBackend::working("fallback");
    let researcher = harness.researcher(vec![primary.clone(), fallback.clone()]);

    let outcome = researcher
        .run(ResearchRequest::new("q", ReportType::Research))
        .await
        .unwrap();

    assert_eq!(primary.calls(), fallback.calls());
    assert_eq!(fallback.calls()[1], ("q".to_string(), 4));
    assert!(
        harness
            .progress
            .logs()
            .iter()
            .any(|l| l.contains("primary search failed for 'q'") && l.contains("Falling back to fallback"))
    );
    assert!(outcome.visited_urls.iter().all(|u| u.contains(".example.com/page-")));
    assert_eq!(outcome.context.len(), 2);
}

#[tokio::test]
async fn second_run_for_same_idea_is_served_from_cache() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle 1", "x angle 2"]"#));

    let first_backend = FakeBackend::working("primary");
    let first = harness
        .researcher(vec![first_backend.clone()])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();
    let scraped_after_first = harness.scraper.calls().len();

    let second_backend = FakeBackend::working("primary");
    let second = harness
        .researcher(vec![second_backend.clone()])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    assert!(second.from_cache);
    assert!(second_backend.calls().is_empty());
    assert_eq!(harness.scraper.calls().len(), scraped_after_first);
    assert_eq!(second.context, vec![first.context.join("\n\n")]);
    assert_eq!(harness.model.decomposition_calls(), 1);

    let cached = ResearchCache::new(harness.config.cache.clone())
        .get("x")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.research_text, second.context[0]);
}

#[tokio::test]
async fn cache_can_be_disabled() {
    let mut harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    harness.config.cache.enabled = false;

    for _ in 0..2 {
        harness
            .researcher(vec![FakeBackend::working("primary")])
            .run(ResearchRequest::new("x", ReportType::IdeaResearch))
            .await
            .unwrap();
    }
    assert_eq!(harness.model.decomposition_calls(), 2);
}

#[tokio::test]
async fn failing_sub_idea_does_not_stop_the_report() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle 1", "x angle 2"]"#));
    let primary = FakeBackend::failing_for("primary", &["x angle 1"]);
    let fallback = FakeBackend::failing_for("fallback", &["x angle 1"]);
    let researcher = harness.researcher(vec![primary, fallback]);

    let outcome = researcher
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    assert_eq!(outcome.context.len(), 2);
    assert!(!outcome.report.is_empty());
    assert!(
        harness
            .progress
            .logs()
            .iter()
            .any(|l| l.contains("No search backend left"))
    );
}

#[tokio::test]
async fn no_context_at_all_still_produces_a_report_and_is_not_cached() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    let researcher = harness.researcher(vec![FakeBackend::failing("primary")]);

    let outcome = researcher
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    assert!(outcome.context.is_empty());
    assert!(outcome.report.starts_with("# Findings"));
    let cached = ResearchCache::new(harness.config.cache.clone())
        .get("x")
        .await
        .unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn unreachable_sources_are_logged_and_excluded() {
    let harness = Harness::new(ScriptedModel::new(r#"["unused"]"#));
    let researcher = harness.researcher(vec![FakeBackend::working("primary")]);

    let request = ResearchRequest::new("condo concierge app", ReportType::Research)
        .with_source_urls(["https://unreachable.example.com/", "https://ok.example.com/"]);
    let outcome = researcher.run(request).await.unwrap();

    assert_eq!(outcome.context.len(), 1);
    assert!(!outcome.context[0].contains("unreachable"));
    assert!(
        harness
            .progress
            .logs()
            .iter()
            .any(|l| l.contains("Failed to read https://unreachable.example.com/"))
    );
}

#[tokio::test]
async fn report_references_are_unique() {
    let harness = Harness::new(ScriptedModel::new(r#"["unused"]"#));

    // a long page yields several chunks citing the same source
    let long_page = "https://long.example.com/page";
    let mut config = harness.config.clone();
    config.compression.chunk_size = 20;
    config.compression.chunk_overlap = 0;
    let researcher = Researcher::new(ResearchContext::from_parts(
        config,
        harness.model.clone(),
        Arc::new(VocabularyEmbedder),
        Retriever::new(vec![FakeBackend::working("primary") as Arc<dyn SearchBackend>]),
        harness.scraper.clone(),
        harness.progress.clone(),
    ));

    let outcome = researcher
        .run(
            ResearchRequest::new("condo concierge app", ReportType::IdeaResearch)
                .with_source_urls([long_page, "https://other.example.com/"]),
        )
        .await
        .unwrap();

    assert!(outcome.context[0].matches(long_page).count() > 1);
    let references: Vec<&str> = outcome
        .report
        .split("## References")
        .nth(1)
        .unwrap()
        .lines()
        .filter(|l| l.starts_with("- "))
        .collect();
    let unique: HashSet<&str> = references.iter().copied().collect();
    assert_eq!(references.len(), unique.len());
    assert!(references.iter().any(|r| r.contains(long_page)));
}

#[tokio::test]
async fn malformed_role_fails_at_role_selection() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#).with_role("I am an agent"));
    let err = harness
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::RoleSelection);
    assert!(err.to_string().contains("role_selection"));
}

#[tokio::test]
async fn malformed_decomposition_fails_at_decomposition() {
    let harness = Harness::new(ScriptedModel::new("here are some queries: a, b, c"));
    let backend = FakeBackend::working("primary");
    let err = harness
        .researcher(vec![backend.clone()])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap_err();

    assert_eq!(err.stage, PipelineStage::Decomposition);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn synthesis_is_retried_once_then_fails() {
    let recovered = Harness::new(ScriptedModel::new(r#"["x angle"]"#).failing_reports(1));
    recovered
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    let broken = Harness::new(ScriptedModel::new(r#"["x angle"]"#).failing_reports(2));
    let err = broken
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap_err();
    assert_eq!(err.stage, PipelineStage::Synthesis);
    assert_eq!(broken.model.report_system_prompts().len(), 2);
}

#[tokio::test]
async fn custom_report_uses_configured_agent_role() {
    let mut harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    harness.config.report.agent_role = Some("You are a skeptical investor.".to_string());

    let outcome = harness
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::Custom))
        .await
        .unwrap();

    assert_eq!(outcome.role.agent_role_prompt, "You are a skeptical investor.");
    assert_eq!(
        harness.model.report_system_prompts(),
        vec!["You are a skeptical investor.".to_string()]
    );
}

#[tokio::test]
async fn configured_agent_role_is_ignored_for_other_report_types() {
    let mut harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    harness.config.report.agent_role = Some("You are a skeptical investor.".to_string());

    let outcome = harness
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::Research))
        .await
        .unwrap();

    assert_eq!(
        outcome.role.agent_role_prompt,
        "You are a property technology analyst."
    );
}

#[tokio::test]
async fn live_transport_receives_streamed_report() {
    let harness = Harness::with_progress(ScriptedModel::new(r#"["x angle"]"#), MemoryProgress::live());
    let outcome = harness
        .researcher(vec![FakeBackend::working("primary")])
        .run(ResearchRequest::new("x", ReportType::IdeaResearch))
        .await
        .unwrap();

    let streamed: String = harness
        .progress
        .events()
        .into_iter()
        .filter(|e| e.kind == ProgressKind::Report)
        .map(|e| e.output)
        .collect();
    assert!(streamed.starts_with("# Findings"));
    assert!(outcome.report.starts_with("# Findings"));
}

/// Counts fetches that started and fetch futures that were dropped; never completes.
struct HangingScraper {
    started: AtomicUsize,
    dropped: Arc<AtomicUsize>,
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Scraper for HangingScraper {
    async fn fetch(&self, _url: &str) -> Result<String> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let _counter = DropCounter(self.dropped.clone());
        futures::future::pending::<Result<String>>().await
    }
}

/// Answers role and decomposition, but the report never arrives.
struct HangingReportModel;

#[async_trait]
impl LanguageModel for HangingReportModel {
    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        if user.starts_with("task:") {
            Ok(ROLE_REPLY.to_string())
        } else if user.contains("google search queries") {
            Ok(r#"["x angle"]"#.to_string())
        } else {
            futures::future::pending::<Result<String>>().await
        }
    }

    async fn stream(&self, _system: &str, _user: &str) -> Result<TextStream> {
        Ok(futures::stream::pending().boxed())
    }
}

fn cache_files(config: &Config) -> Vec<String> {
    let dir = config.cache.cache_dir.join("research");
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn cancelling_during_scrape_drops_fetches_and_writes_no_cache() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    let scraper = Arc::new(HangingScraper {
        started: AtomicUsize::new(0),
        dropped: Arc::new(AtomicUsize::new(0)),
    });
    let researcher = Researcher::new(ResearchContext::from_parts(
        harness.config.clone(),
        harness.model.clone(),
        Arc::new(VocabularyEmbedder),
        Retriever::new(vec![FakeBackend::working("primary") as Arc<dyn SearchBackend>]),
        scraper.clone(),
        harness.progress.clone(),
    ));

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        researcher.run(ResearchRequest::new("x", ReportType::IdeaResearch)),
    )
    .await;

    assert!(result.is_err());
    let started = scraper.started.load(Ordering::SeqCst);
    assert!(started > 0);
    assert_eq!(scraper.dropped.load(Ordering::SeqCst), started);
    assert!(cache_files(&harness.config).is_empty());
}

#[tokio::test]
async fn cancelling_during_synthesis_leaves_only_complete_cache_entries() {
    let harness = Harness::new(ScriptedModel::new(r#"["x angle"]"#));
    let researcher = Researcher::new(ResearchContext::from_parts(
        harness.config.clone(),
        Arc::new(HangingReportModel),
        Arc::new(VocabularyEmbedder),
        Retriever::new(vec![FakeBackend::working("primary") as Arc<dyn SearchBackend>]),
        harness.scraper.clone(),
        harness.progress.clone(),
    ));

    let result = tokio::time::timeout(
        Duration::from_millis(200),
        researcher.run(ResearchRequest::new("x", ReportType::IdeaResearch)),
    )
    .await;

    assert!(result.is_err());
    let files = cache_files(&harness.config);
    assert_eq!(files, vec![format!("{}.json", ResearchCache::key_for("x"))]);
    assert!(files.iter().all(|f| !f.ends_with(".tmp")));

    let entry = ResearchCache::new(harness.config.cache.clone())
        .get("x")
        .await
        .unwrap()
        .unwrap();
    assert!(entry.research_text.contains("Source: "));
}
