use localsearch_core::config::EmbeddingConfig;
use localsearch_embed::{get_default_embedder, HashingEmbedder};
use localsearch_core::Embedder;

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let config = EmbeddingConfig { provider: "hashing".into(), dim: 1024, ..EmbeddingConfig::default() };
    let embedder = get_default_embedder(&config).expect("embedder");
    assert_eq!(embedder.id(), "hashing:d1024");

    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");

    // Norm approximately 1.0
    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input
    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn hashing_embedder_rewards_shared_words() {
    let e = HashingEmbedder::new(256);
    let q = e.embed_one("Python programming");
    let near = e.embed_one("python is a programming language");
    let far = e.embed_one("relational databases store rows");
    assert!(cosine(&q, &near) > cosine(&q, &far));
}

#[test]
fn hashing_embedder_empty_text_is_zero_vector() {
    let v = HashingEmbedder::new(8).embed_one("  ...  ");
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn unknown_provider_is_rejected() {
    let config = EmbeddingConfig { provider: "word2vec".into(), ..EmbeddingConfig::default() };
    assert!(get_default_embedder(&config).is_err());
}
