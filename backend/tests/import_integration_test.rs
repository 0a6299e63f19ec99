/// Loading JSON and markdown corpora through the importers
use retrieval::application::repositories::{DocumentRepository, IndexRegistry};
use retrieval::application::RebuildOutcome;
use retrieval::domain::{DocumentId, IndexName, IndexState};
use retrieval::infrastructure::file_system::{
    load_knowledge_entries, load_markdown_knowledge, load_prompt_templates,
};
use retrieval::infrastructure::{EmbeddingBackend, RetrievalConfig, RetrievalEngine};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const KNOWLEDGE_JSON: &str = r#"[
    {"id": "1", "name": "北京", "description": "首都", "content": "北京是中国的首都，拥有悠久的历史和文化遗产"},
    {"id": "2", "name": "上海", "content": "上海是中国最大的城市，是经济、金融、贸易中心"},
    {"id": "3", "name": "Attachment", "file_path": "knowledge_base/report.pdf"},
    {"id": "4", "name": "Whitespace", "content": "   \n  "}
]"#;

const PROMPTS_JSON: &str = r#"[
    {"id": "10", "name": "design.review", "description": "Review a web page layout", "content": "网页设计应遵循简洁、直观、一致的原则"},
    {"id": "11", "name": "writing.summary", "description": "Summarize an article", "content": "Summarize the following article in three sentences"}
]"#;

fn engine(dir: &TempDir) -> RetrievalEngine {
    let mut config = RetrievalConfig::with_data_dir(dir.path().join("data"));
    config.embedding.backend = EmbeddingBackend::Hashing;
    config.chunking.chunk_size = 40;
    config.chunking.overlap = 0;
    RetrievalEngine::open(config).unwrap()
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

#[tokio::test]
async fn test_import_knowledge_base_from_json() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let path = write(dir.path(), "kb.json", KNOWLEDGE_JSON);

    let entries = load_knowledge_entries(&path).await.unwrap();
    let summary = engine
        .importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();

    assert_eq!(summary.imported, 4);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.has_errors());
    assert_eq!(summary.rebuild.document_count(), 4);

    let index = IndexName::new("knowledge_base").unwrap();
    let stored = engine
        .store()
        .get_document(&index, &DocumentId::new("kb_1").unwrap())
        .unwrap();
    assert_eq!(stored.metadata()["name"], "北京");
    assert_eq!(stored.metadata()["description"], "首都");

    let attachment = engine
        .store()
        .get_document(&index, &DocumentId::new("kb_3").unwrap())
        .unwrap();
    assert_eq!(attachment.text(), "");
    assert_eq!(attachment.metadata()["file_path"], "knowledge_base/report.pdf");

    let hits = engine
        .searcher()
        .search(&index, "北京是中国的首都，拥有悠久的历史和文化遗产", 1)
        .unwrap();
    assert_eq!(hits[0].document_id.as_str(), "kb_1");
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let path = write(dir.path(), "kb.json", KNOWLEDGE_JSON);
    let entries = load_knowledge_entries(&path).await.unwrap();
    let index = IndexName::new("knowledge_base").unwrap();

    engine
        .importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();
    let first = engine.store().get_index(&index).unwrap().unwrap();

    let again = engine
        .importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();
    let second = engine.store().get_index(&index).unwrap().unwrap();

    assert_eq!(again.imported, 4);
    assert_eq!(engine.store().count_for_index(&index).unwrap(), 4);
    assert_eq!(first.revision, second.revision);
    assert_eq!(second.state(), IndexState::Built);
    assert_eq!(second.document_count, 4);
}

#[tokio::test]
async fn test_changed_entry_is_updated_in_place() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let index = IndexName::new("knowledge_base").unwrap();

    let before = write(dir.path(), "v1.json", r#"[{"id": "1", "name": "doc", "content": "old text"}]"#);
    let after = write(dir.path(), "v2.json", r#"[{"id": "1", "name": "doc", "content": "new text"}]"#);

    let entries = load_knowledge_entries(&before).await.unwrap();
    engine.importer().import_knowledge_base("knowledge_base", &entries).unwrap();
    let entries = load_knowledge_entries(&after).await.unwrap();
    engine.importer().import_knowledge_base("knowledge_base", &entries).unwrap();

    assert_eq!(engine.store().count_for_index(&index).unwrap(), 1);
    let stored = engine
        .store()
        .get_document(&index, &DocumentId::new("kb_1").unwrap())
        .unwrap();
    assert_eq!(stored.text(), "new text");
}

#[tokio::test]
async fn test_import_prompt_templates() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let path = write(dir.path(), "prompts.json", PROMPTS_JSON);

    let templates = load_prompt_templates(&path).await.unwrap();
    let summary = engine
        .importer()
        .import_prompt_templates("prompt_templates", &templates)
        .unwrap();
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 0);

    let index = IndexName::new("prompt_templates").unwrap();
    let hits = engine.searcher().search(&index, "网页设计原则", 2).unwrap();
    assert_eq!(hits[0].document_id.as_str(), "prompt_10");
    assert_eq!(hits[0].metadata["category"], "design");
    assert_eq!(hits[0].metadata["type"], "review");
    assert_eq!(hits[0].metadata["content"], "网页设计应遵循简洁、直观、一致的原则");
}

#[tokio::test]
async fn test_import_all_into_combined_index() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let kb = write(dir.path(), "kb.json", KNOWLEDGE_JSON);
    let prompts = write(dir.path(), "prompts.json", PROMPTS_JSON);

    let entries = load_knowledge_entries(&kb).await.unwrap();
    let templates = load_prompt_templates(&prompts).await.unwrap();
    let summary = engine
        .importer()
        .import_all("combined_index", &entries, &templates)
        .unwrap();

    assert_eq!(summary.imported, 6);
    assert_eq!(summary.skipped, 0);
    match &summary.rebuild {
        RebuildOutcome::Rebuilt(stats) => {
            assert_eq!(stats.document_count, 6);
            assert_eq!(stats.vector_dimension, 384);
        }
        RebuildOutcome::Skipped => panic!("combined index should have been rebuilt"),
    }

    let index = IndexName::new("combined_index").unwrap();
    let sources: Vec<String> = engine
        .store()
        .list_for_index(&index)
        .unwrap()
        .iter()
        .map(|d| d.source().to_string())
        .collect();
    assert_eq!(sources.iter().filter(|s| *s == "knowledge_base").count(), 4);
    assert_eq!(sources.iter().filter(|s| *s == "prompt_template").count(), 2);
}

#[tokio::test]
async fn test_empty_corpus_skips_rebuild() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let path = write(dir.path(), "kb.json", "[]");

    let entries = load_knowledge_entries(&path).await.unwrap();
    let summary = engine
        .importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();

    assert_eq!(summary.imported, 0);
    assert_eq!(summary.rebuild, RebuildOutcome::Skipped);
    let index = IndexName::new("knowledge_base").unwrap();
    assert_eq!(engine.builder().index_state(&index).unwrap(), IndexState::Empty);
}

#[tokio::test]
async fn test_import_markdown_directory() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let docs = dir.path().join("docs");
    write(&docs, "beijing.md", "# 北京\n\n北京是中国的首都，拥有悠久的历史和文化遗产");
    write(&docs, "guides/web.md", "# 网页设计\n\n网页设计应遵循简洁、直观、一致的原则");
    write(&docs, ".hidden/secret.md", "should not be imported");
    write(&docs, "notes.txt", "not markdown");

    let entries = load_markdown_knowledge(&docs).await.unwrap();
    let summary = engine
        .importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();
    assert_eq!(summary.imported, 2);

    let index = IndexName::new("knowledge_base").unwrap();
    let web = engine
        .store()
        .get_document(&index, &DocumentId::new("kb_web").unwrap())
        .unwrap();
    assert_eq!(web.metadata()["description"], "web knowledge base document");

    let hits = engine.searcher().search(&index, "网页设计原则", 1).unwrap();
    assert_eq!(hits[0].document_id.as_str(), "kb_web");
}

#[tokio::test]
async fn test_chunked_import_replaces_old_chunks() {
    let dir = TempDir::new().unwrap();
    let engine = engine(&dir);
    let index = IndexName::new("knowledge_base").unwrap();

    let long = write(
        dir.path(),
        "long.json",
        r#"[{"id": "guide", "name": "Guide", "content": "First paragraph about layouts.\nSecond paragraph about colors.\nThird paragraph about typography."}]"#,
    );
    let entries = load_knowledge_entries(&long).await.unwrap();
    let summary = engine
        .chunked_importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();
    assert_eq!(summary.imported, 1);

    let ids: Vec<String> = engine
        .store()
        .list_for_index(&index)
        .unwrap()
        .iter()
        .map(|d| d.document_id().to_string())
        .collect();
    assert_eq!(ids, vec!["kb_guide#0", "kb_guide#1", "kb_guide#2"]);

    let chunk = engine
        .store()
        .get_document(&index, &DocumentId::new("kb_guide#1").unwrap())
        .unwrap();
    assert_eq!(chunk.text(), "Second paragraph about colors.");
    assert_eq!(chunk.metadata()["parent_document_id"], "kb_guide");
    assert_eq!(chunk.metadata()["total_chunks"], 3);

    let hits = engine.searcher().search(&index, "colors", 1).unwrap();
    assert_eq!(hits[0].document_id.as_str(), "kb_guide#1");

    let short = write(
        dir.path(),
        "short.json",
        r#"[{"id": "guide", "name": "Guide", "content": "Now it fits."}]"#,
    );
    let entries = load_knowledge_entries(&short).await.unwrap();
    engine
        .chunked_importer()
        .import_knowledge_base("knowledge_base", &entries)
        .unwrap();

    let ids: Vec<String> = engine
        .store()
        .list_for_index(&index)
        .unwrap()
        .iter()
        .map(|d| d.document_id().to_string())
        .collect();
    assert_eq!(ids, vec!["kb_guide"]);
}
