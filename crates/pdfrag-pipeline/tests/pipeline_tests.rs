use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pdfrag_core::config::RagSettings;
use pdfrag_core::traits::{StoreLoader, VectorStore, VectorStoreHandle};
use pdfrag_core::{DocumentMetadata, PipelineState, RetrievedDocument};
use pdfrag_llm::EchoGenerator;
use pdfrag_pipeline::{cache_key, ContextBuilder, PromptTemplate, QueryCache, RagPipeline, Retriever};

/// Returns chunks containing any query word, in insertion order.
struct KeywordStore { chunks: Vec<String> }

impl VectorStore for KeywordStore {
    fn similarity_search(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedDocument>> {
        let words: Vec<&str> = query.split_whitespace().collect();
        Ok(self.chunks.iter().enumerate()
            .filter(|(_, c)| words.iter().any(|w| c.contains(w)))
            .take(k)
            .map(|(i, c)| RetrievedDocument::new(c.clone(), DocumentMetadata { source: "guide.pdf".into(), page: Some(1), chunk_index: i }).with_score(1.0))
            .collect())
    }
}

struct CountingLoader { calls: AtomicUsize, chunks: Vec<String> }

impl StoreLoader for CountingLoader {
    fn load_or_build(&self, path: &Path) -> anyhow::Result<VectorStoreHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(VectorStoreHandle {
            path: PathBuf::from("/stores/guide"),
            collection: path.display().to_string(),
            store: Arc::new(KeywordStore { chunks: self.chunks.clone() }),
        })
    }
}

fn doc(words: usize) -> RetrievedDocument {
    RetrievedDocument::new(vec!["w"; words].join(" "), DocumentMetadata::default())
}

fn settings(root: &Path) -> RagSettings {
    let mut s = RagSettings::default();
    s.paths.base_dir = root.to_string_lossy().to_string();
    s
}

fn loader() -> Arc<CountingLoader> {
    Arc::new(CountingLoader {
        calls: AtomicUsize::new(0),
        chunks: vec![
            "명동 은 쇼핑 과 길거리 음식 으로 유명합니다".to_string(),
            "남산 타워 는 야경 명소 입니다".to_string(),
        ],
    })
}

#[test]
fn cache_roundtrip_and_byte_exact_keys() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let cache = QueryCache::new(tmp.path().join("nested/cache"))?;
    let state = PipelineState::new("q").with_answer("a");
    assert!(cache.get::<PipelineState>("q")?.is_none());
    cache.put("q", &state)?;
    assert_eq!(cache.get::<PipelineState>("q")?, Some(state));
    assert!(cache.get::<PipelineState>("q ")?.is_none());
    assert!(cache.dir().join(format!("{}.json", cache_key("q"))).exists());
    assert_eq!(cache.clear()?, 1);
    assert!(cache.get::<PipelineState>("q")?.is_none());
    Ok(())
}

#[test]
fn corrupt_cache_entry_is_an_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let cache = QueryCache::new(tmp.path())?;
    std::fs::write(tmp.path().join(format!("{}.json", cache_key("q"))), "{not json")?;
    assert!(cache.get::<PipelineState>("q").is_err());
    Ok(())
}

#[test]
fn context_stops_at_first_document_over_budget() {
    let state = PipelineState::new("q").with_documents(vec![doc(10), doc(10), doc(10)]);
    let context = ContextBuilder::new(15.0, "Document").build(state).context.unwrap();
    assert!(context.contains("Document 1:\n"));
    assert!(context.contains("Document 2:\n"));
    assert!(!context.contains("Document 3:"));
    assert!(context.contains("\n\nDocument 2:"), "blocks separated by a blank line: {context:?}");
}

#[test]
fn context_is_empty_without_documents() {
    let builder = ContextBuilder::new(512.0, "Document");
    assert_eq!(builder.build(PipelineState::new("q")).context.as_deref(), Some(""));
    let empty = PipelineState::new("q").with_documents(vec![]);
    assert_eq!(builder.build(empty).context.as_deref(), Some(""));
}

#[test]
fn stages_only_add_their_own_field() -> anyhow::Result<()> {
    let store: Arc<dyn VectorStore> = Arc::new(KeywordStore { chunks: vec!["명동 거리".into()] });
    let start = PipelineState::new("명동").with_context("stale");
    let retrieved = Retriever::new(store, 2).retrieve(start)?;
    assert_eq!(retrieved.query, "명동");
    assert_eq!(retrieved.context.as_deref(), Some("stale"));
    assert_eq!(retrieved.documents().len(), 1);
    let built = ContextBuilder::new(512.0, "Document").build(retrieved.clone());
    assert_eq!(built.documents, retrieved.documents);
    Ok(())
}

#[test]
fn prompt_fills_placeholders_once() {
    let t = PromptTemplate::new("C={context} Q={query} {other}");
    assert_eq!(t.render("{query}", "why"), "C={query} Q=why {other}");
}

#[test]
fn end_to_end_retrieves_matching_chunk_and_caches() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let loader = loader();
    let pipeline = RagPipeline::new(settings(tmp.path()), loader.clone(), Arc::new(EchoGenerator))?;
    let query = "명동 에서 뭘 하면 좋을까";

    let state = pipeline.run(Path::new("guide.pdf"), query)?;
    let docs = state.documents();
    assert!(docs.iter().any(|d| d.content.contains("명동")));
    assert!(state.context.as_deref().unwrap_or("").contains("Document 1:"));
    assert!(state.answer.as_deref().unwrap_or("").starts_with("[echo:"));

    let again = pipeline.run(Path::new("other.pdf"), query)?;
    assert_eq!(again, state, "same query hits the cache regardless of document");
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1, "cache hit skips the loader");
    Ok(())
}

#[test]
fn empty_query_is_rejected() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let pipeline = RagPipeline::new(settings(tmp.path()), loader(), Arc::new(EchoGenerator))?;
    let err = pipeline.run(Path::new("guide.pdf"), "   ").unwrap_err();
    assert!(matches!(err.downcast_ref::<pdfrag_core::Error>(), Some(pdfrag_core::Error::EmptyQuery)));
    Ok(())
}

#[test]
fn graph_runs_three_nodes_in_order() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let pipeline = RagPipeline::new(settings(tmp.path()), loader(), Arc::new(EchoGenerator))?;
    let graph = pipeline.graph(Arc::new(KeywordStore { chunks: vec![] }));
    assert_eq!(graph.node_names(), vec!["doc_retriever", "context_builder", "answer_generator"]);
    let dot = graph.to_dot();
    assert!(dot.contains("__start__ -> doc_retriever;"));
    assert!(dot.contains("answer_generator -> __end__;"));
    let state = graph.invoke(PipelineState::new("nothing matches"))?;
    assert_eq!(state.context.as_deref(), Some(""));
    assert!(state.answer.is_some());
    Ok(())
}

#[test]
fn graph_file_is_written_on_cache_miss_and_failures_are_not_fatal() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let dot = tmp.path().join("viz/rag_graph.dot");
    let pipeline = RagPipeline::new(settings(tmp.path()), loader(), Arc::new(EchoGenerator))?
        .with_graph_output(Some(dot.clone()));
    pipeline.run(Path::new("guide.pdf"), "명동")?;
    assert!(std::fs::read_to_string(&dot)?.starts_with("digraph rag {"));

    let blocked = tmp.path().join("file-not-dir");
    std::fs::write(&blocked, "x")?;
    let pipeline = RagPipeline::new(settings(tmp.path()), loader(), Arc::new(EchoGenerator))?
        .with_graph_output(Some(blocked.join("graph.dot")));
    assert!(pipeline.run(Path::new("guide.pdf"), "남산").is_ok());
    Ok(())
}

#[test]
fn cached_answer_needs_no_model_files() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut s = settings(tmp.path());
    s.embedding.model_dir = tmp.path().join("missing-embedder").to_string_lossy().to_string();
    s.generation.model_path = tmp.path().join("missing.gguf").to_string_lossy().to_string();
    let query = "명동 에 가볼 만한 곳";
    let cached = PipelineState::new(query).with_context("ctx").with_answer("성당");
    QueryCache::new(s.cache_dir())?.put(query, &cached)?;

    let state = RagPipeline::from_settings(&s)?.run(Path::new("guide.pdf"), query)?;
    assert_eq!(state, cached);
    Ok(())
}

#[test]
fn cache_miss_reports_missing_embedder() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let doc = tmp.path().join("guide.txt");
    std::fs::write(&doc, "명동 성당")?;
    let mut s = settings(tmp.path());
    s.embedding.model_dir = tmp.path().join("missing-embedder").to_string_lossy().to_string();
    let err = RagPipeline::from_settings(&s)?.run(&doc, "명동").unwrap_err();
    assert!(format!("{err:#}").contains("Failed to initialise embedder"), "got {err:#}");
    Ok(())
}
