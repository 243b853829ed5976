use std::path::Path;

use pdfrag_core::config::{Config, DeviceKind, RagSettings};
use pdfrag_core::data_processor::{estimate_tokens, ChunkingConfig, DataProcessor, PageText};
use pdfrag_core::hashing::md5_hex;
use pdfrag_core::PipelineState;
use pdfrag_core::{DocumentMetadata, RetrievedDocument};

fn processor(chunk_size: usize, chunk_overlap: usize) -> DataProcessor {
    DataProcessor::new(ChunkingConfig { chunk_size, chunk_overlap })
}

#[test]
fn split_text_merges_words_with_overlap() {
    let chunks = processor(8, 3).split_text("aa bb cc dd ee");
    assert_eq!(chunks, vec!["aa bb cc", "cc dd", "dd ee"]);
    for c in &chunks { assert!(c.chars().count() <= 8, "chunk '{c}' exceeds chunk_size"); }
}

#[test]
fn split_text_keeps_separators_inside_chunks() {
    assert_eq!(processor(10, 0).split_text("aa  bb"), vec!["aa  bb"]);
    assert_eq!(processor(20, 0).split_text("line one\nline two"), vec!["line one\nline two"]);
}

#[test]
fn split_text_prefers_paragraph_boundaries() {
    let text = "alpha beta gamma\n\ndelta epsilon";
    let chunks = processor(20, 0).split_text(text);
    assert_eq!(chunks, vec!["alpha beta gamma", "delta epsilon"]);
}

#[test]
fn split_text_counts_characters_not_bytes() {
    // 12 Hangul syllables, 36 bytes in UTF-8
    let chunks = processor(12, 0).split_text("명동 거리 쇼핑 명동 성당 투어");
    for c in &chunks { assert!(c.chars().count() <= 12); }
    assert!(chunks.iter().any(|c| c.contains("명동")));
}

#[test]
fn split_text_falls_back_to_characters_for_long_words() {
    let chunks = processor(4, 0).split_text("abcdefghij");
    assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
}

#[test]
fn split_text_of_blank_input_is_empty() {
    assert!(processor(10, 2).split_text("   \n\n  ").is_empty());
}

#[test]
fn process_pages_numbers_chunks_across_pages() {
    let pages = vec![
        PageText { page: Some(1), text: "first page text".to_string() },
        PageText { page: Some(2), text: "second page text".to_string() },
    ];
    let chunks = processor(100, 10).process_pages(Path::new("/tmp/guide.pdf"), &pages);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].id, "guide:1:0");
    assert_eq!(chunks[1].id, "guide:2:1");
    assert_eq!(chunks[1].page, Some(2));
    assert_eq!(chunks[1].chunk_index, 1);
    assert_eq!(chunks[0].source, "/tmp/guide.pdf");
}

#[test]
fn estimate_tokens_is_three_quarters_of_words() {
    assert_eq!(estimate_tokens("a b c d"), 3.0);
    assert_eq!(estimate_tokens(""), 0.0);
}

#[test]
fn state_updates_are_additive() {
    let doc = RetrievedDocument::new("text", DocumentMetadata::default());
    let state = PipelineState::new("q").with_context("ctx").with_documents(vec![doc.clone()]);
    assert_eq!(state.query, "q");
    assert_eq!(state.context.as_deref(), Some("ctx"));
    assert_eq!(state.documents(), &[doc]);
    assert!(state.answer.is_none());
}

#[test]
fn defaults_match_demo_configuration() {
    let s = RagSettings::default();
    assert_eq!(s.retrieval.top_k, 2);
    assert_eq!(s.context.max_tokens, 512.0);
    assert_eq!(s.chunking.chunk_size, 256);
    assert_eq!(s.chunking.chunk_overlap, 30);
    assert_eq!(s.generation.max_new_tokens, 128);
    assert_eq!(s.device.kind, DeviceKind::Cpu);
    s.validate().expect("defaults are valid");
}

#[test]
fn config_merges_file_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
                [retrieval]
                top_k = 4

                [paths]
                base_dir = "/srv/rag"
                cache_dir = "qcache"
            "#,
        )?;
        jail.set_env("RUST_ENV", "test");
        jail.set_env("APP_CONTEXT__MAX_TOKENS", "64");
        let config = Config::load().map_err(|e| e.to_string())?;
        let settings = config.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.retrieval.top_k, 4);
        assert_eq!(settings.context.max_tokens, 64.0);
        assert_eq!(settings.chunking.chunk_size, 256, "unset keys keep defaults");
        assert_eq!(settings.cache_dir(), Path::new("/srv/rag/qcache"));
        let top_k: usize = config.get("retrieval.top_k").map_err(|e| e.to_string())?;
        assert_eq!(top_k, 4);
        Ok(())
    });
}

#[test]
fn config_rejects_overlap_not_smaller_than_chunk() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[chunking]\nchunk_size = 10\nchunk_overlap = 10\n")?;
        jail.set_env("RUST_ENV", "test");
        let err = Config::load().err().ok_or("overlapping chunk config was accepted")?;
        assert!(err.to_string().contains("chunk_overlap"));
        Ok(())
    });
}

#[test]
fn md5_hex_matches_known_digests() {
    assert_eq!(md5_hex(b""), "d41d8cd98f00b204e9800998ecf8427e");
    assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
}
