//! End-to-end tests: PDFs on disk through ingestion, retrieval, and answering.

use std::path::Path;
use std::sync::Arc;

use docqa_rag::prompt::DEFAULT_SYSTEM_INSTRUCTION;
use docqa_rag::{
    ChunkKind, HashingEmbedder, InMemoryIndex, LexicalReranker, MockGenerator, RagConfig,
    RagError, RagPipeline, VectorIndex,
};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

/// Write a PDF whose pages each hold the given positioned strings.
fn write_pdf(path: &Path, pages: &[Vec<(i64, i64, &str)>]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for strings in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
        ];
        for &(x, y, text) in strings {
            operations.push(Operation::new(
                "Tm",
                vec![
                    Object::Integer(1),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(1),
                    Object::Integer(x),
                    Object::Integer(y),
                ],
            ));
            operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(595), Object::Integer(842)],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

fn riviera_pages() -> Vec<Vec<(i64, i64, &'static str)>> {
    vec![
        vec![(72, 700, "Nice is a coastal city.")],
        vec![(72, 700, "City"), (222, 700, "Feature"), (72, 680, "Cannes"), (222, 680, "Film Festival")],
    ]
}

/// Answers from the first table row in the prompt that mentions Cannes.
fn extractive_model() -> MockGenerator {
    MockGenerator::new(|request| {
        let answer = request
            .prompt
            .lines()
            .find_map(|line| line.strip_prefix("Cannes | "))
            .map(str::to_string)
            .unwrap_or_else(|| "I cannot find it in the documents.".to_string());
        Ok(answer)
    })
}

fn config() -> RagConfig {
    RagConfig::builder().chunk_size(100).chunk_overlap(10).build().unwrap()
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[tokio::test]
async fn answers_from_the_table_chunk() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("riviera.pdf"), &riviera_pages());

    let model = Arc::new(extractive_model());
    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .generator(model.clone())
        .build()
        .unwrap();

    let stats = pipeline.ingest_directory(temp.path()).await.unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.pages, 2);
    assert_eq!(stats.table_chunks, 1);
    assert_eq!(pipeline.index().len().await, stats.total_chunks());

    let question = "What festival does Cannes host?";
    let results = pipeline.retrieve(question).await.unwrap();
    let rank_of = |pred: &dyn Fn(&docqa_rag::SearchResult) -> bool| {
        results.iter().position(|r| pred(r)).unwrap()
    };
    let table_rank = rank_of(&|r| r.chunk.kind == ChunkKind::Table);
    let nice_rank = rank_of(&|r| r.chunk.text == "Nice is a coastal city.");
    assert!(table_rank < nice_rank);

    let answer = pipeline.answer(question).await.unwrap();
    assert!(answer.answer.contains("Film Festival"));
    assert!(answer.context.contains(&"City | Feature\nCannes | Film Festival".to_string()));

    let context_words: Vec<String> = answer.context.iter().flat_map(|c| words(c)).collect();
    for word in words(&answer.answer) {
        assert!(context_words.contains(&word), "answer introduces {word:?}");
    }

    let requests = model.requests();
    let last = requests.last().unwrap();
    assert_eq!(last.temperature, 0.0);
    assert_eq!(last.system.as_deref(), Some(DEFAULT_SYSTEM_INSTRUCTION));
    assert!(last.prompt.contains("Document 0:::"));
}

#[tokio::test]
async fn reranker_narrows_to_final_depth() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("riviera.pdf"), &riviera_pages());

    let config = RagConfig::builder()
        .chunk_size(100)
        .chunk_overlap(10)
        .num_retrieved_docs(3)
        .num_docs_final(1)
        .build()
        .unwrap();
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .reranker(Arc::new(LexicalReranker::default()))
        .generator(Arc::new(extractive_model()))
        .build()
        .unwrap();
    pipeline.ingest_directory(temp.path()).await.unwrap();

    let answer = pipeline.answer("Which festival is in Cannes?").await.unwrap();
    assert_eq!(answer.context.len(), 1);
    assert!(answer.context[0].contains("Film Festival"));
}

#[tokio::test]
async fn corrupt_pdf_aborts_ingestion_and_leaves_index_empty() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("a_good.pdf"), &riviera_pages());
    std::fs::write(temp.path().join("b_broken.pdf"), b"%PDF-1.5 garbage").unwrap();

    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .generator(Arc::new(extractive_model()))
        .build()
        .unwrap();

    let err = pipeline.ingest_directory(temp.path()).await.unwrap_err();
    assert!(matches!(err, RagError::Extraction { .. }));
    assert!(pipeline.index().is_empty().await);
}

#[tokio::test]
async fn generation_failures_name_the_stage_and_question() {
    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .generator(Arc::new(MockGenerator::new(|_| {
            Err(RagError::Generation { model: "mock".into(), message: "boom".into() })
        })))
        .build()
        .unwrap();

    match pipeline.answer("Where is Nice?").await.unwrap_err() {
        RagError::Pipeline { stage, question, .. } => {
            assert_eq!(stage, "generate");
            assert_eq!(question, "Where is Nice?");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn index_and_embedder_dimensions_must_agree() {
    let err = RagPipeline::builder()
        .embedding_provider(Arc::new(HashingEmbedder::new(16).unwrap()))
        .index(Arc::new(InMemoryIndex::new(32)))
        .generator(Arc::new(extractive_model()))
        .build()
        .unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 32, actual: 16 }));
}

#[tokio::test]
async fn pipeline_without_generator_ingests_but_cannot_answer() {
    let temp = tempfile::tempdir().unwrap();
    write_pdf(&temp.path().join("riviera.pdf"), &riviera_pages());

    let pipeline = RagPipeline::builder()
        .config(config())
        .embedding_provider(Arc::new(HashingEmbedder::default()))
        .build()
        .unwrap();
    pipeline.ingest_directory(temp.path()).await.unwrap();
    assert!(!pipeline.retrieve("Cannes").await.unwrap().is_empty());

    let err = pipeline.answer("Cannes").await.unwrap_err();
    assert!(matches!(err, RagError::Pipeline { stage: "generate", .. }));
}
