/// Semantic search with real FastEmbed models.
///
/// These tests download model weights on first run and are ignored by default:
/// `cargo test --test semantic_search_integration_test -- --ignored`
use retrieval::application::repositories::DocumentRepository;
use retrieval::domain::{DocumentId, EmbeddingModel, IndexName, IngestDocument};
use retrieval::infrastructure::{RetrievalConfig, RetrievalEngine};
use tempfile::TempDir;

fn fastembed_engine(dir: &TempDir) -> RetrievalEngine {
    let mut config = RetrievalConfig::with_data_dir(dir.path());
    config.embedding.show_download_progress = false;
    RetrievalEngine::open(config).unwrap()
}

fn index_corpus(engine: &RetrievalEngine, name: &str, corpus: &[(&str, &str)]) -> IndexName {
    let index = IndexName::new(name).unwrap();
    engine.builder().create_index(&index, "semantic test").unwrap();
    for (id, text) in corpus {
        let document = IngestDocument::new(DocumentId::new(*id).unwrap(), *text, "test");
        engine.store().upsert(&index, document).unwrap();
    }
    engine.builder().rebuild(&index).unwrap();
    index
}

#[test]
#[ignore] // Downloads the multilingual model
fn test_multilingual_model_ranks_chinese_documents() {
    let dir = TempDir::new().unwrap();
    let engine = fastembed_engine(&dir);
    let index = index_corpus(
        &engine,
        "kb_test",
        &[
            ("A", "北京是中国的首都，拥有悠久的历史和文化遗产"),
            ("B", "上海是中国最大的城市，是经济、金融、贸易中心"),
            ("C", "网页设计应遵循简洁、直观、一致的原则"),
        ],
    );

    let model = engine.embedder().load().unwrap();
    assert!(matches!(
        model,
        EmbeddingModel::ParaphraseMultilingualMiniLML12V2 | EmbeddingModel::AllMiniLML6V2
    ));

    let best = |query: &str| {
        engine.searcher().search(&index, query, 3).unwrap()[0]
            .document_id
            .as_str()
            .to_string()
    };
    assert_eq!(best("北京历史文化"), "A");
    assert_eq!(best("网页设计原则"), "C");
    assert_eq!(best("上海经济金融"), "B");
}

#[test]
#[ignore] // Downloads the multilingual model
fn test_semantic_match_without_shared_words() {
    let dir = TempDir::new().unwrap();
    let engine = fastembed_engine(&dir);
    let index = index_corpus(
        &engine,
        "semantic",
        &[
            ("ml", "Neural networks learn representations from large training datasets"),
            ("weather", "Tomorrow will be sunny with a light breeze in the afternoon"),
            ("cooking", "Simmer the tomato sauce slowly and season it with basil"),
        ],
    );

    let hits = engine
        .searcher()
        .search(&index, "deep learning and artificial intelligence", 3)
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].document_id.as_str(), "ml");
    assert!(hits[0].score > hits[1].score);
}

#[test]
#[ignore] // Downloads the multilingual model
fn test_artifact_records_model_dimension() {
    let dir = TempDir::new().unwrap();
    let engine = fastembed_engine(&dir);
    let index = index_corpus(&engine, "dims", &[("one", "a single document")]);

    let model = engine.embedder().load().unwrap();
    let state = engine.builder().index_state(&index).unwrap();
    assert_eq!(state.to_string(), "built");

    let hits = engine.searcher().search(&index, "a single document", 1).unwrap();
    assert_eq!(hits[0].document_id.as_str(), "one");
    assert!(hits[0].distance < 1e-3);
    assert_eq!(model.dimension_count(), 384);
}
