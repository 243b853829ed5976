use pdfrag_core::config::RagSettings;
use pdfrag_embed::{get_embedder, HashEmbedder};
use pdfrag_core::traits::Embedder;

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let mut settings = RagSettings::default();
    settings.embedding.use_fake = true;
    settings.embedding.fake_dim = 384;

    let embedder = get_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim follows fake_dim");
    assert_eq!(embedder.dim(), 384);

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_tokens_score_higher_than_unrelated_text() {
    let embedder = HashEmbedder::new(256);
    let embs = embedder.embed_batch(&[
        "명동 관광 안내".to_string(),
        "명동 쇼핑 거리".to_string(),
        "river bridge night".to_string(),
    ]).expect("embed");
    assert!(cosine(&embs[0], &embs[1]) > cosine(&embs[0], &embs[2]));
}

#[test]
fn missing_model_dir_is_an_error() {
    let mut settings = RagSettings::default();
    settings.embedding.model_dir = "/nonexistent/pdfrag/model".to_string();
    assert!(get_embedder(&settings).is_err());
}
