//! Property tests for reranker truncation.

use docqa_rag::document::{Chunk, ChunkKind, SearchResult};
use docqa_rag::reranker::{LexicalReranker, NoOpReranker, Reranker};
use proptest::prelude::*;

fn arb_candidates() -> impl Strategy<Value = Vec<SearchResult>> {
    proptest::collection::vec(("[a-z]{2,6}( [a-z]{2,6}){0,8}", 0.0f32..1.0), 0..30).prop_map(
        |items| {
            items
                .into_iter()
                .enumerate()
                .map(|(i, (text, score))| SearchResult {
                    chunk: Chunk::new(text, "doc.pdf#page=1", 1, ChunkKind::Text, i),
                    score,
                })
                .collect()
        },
    )
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

/// *For any* candidates and `top_k`, each reranker returns at most `top_k`
/// results drawn from the candidates without repeats.
mod prop_rerank_truncation {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn output_is_a_bounded_subset(
            candidates in arb_candidates(),
            query in "[a-z]{2,6}( [a-z]{2,6}){0,4}",
            top_k in 0usize..35,
        ) {
            let rerankers: Vec<Box<dyn Reranker>> =
                vec![Box::new(NoOpReranker), Box::new(LexicalReranker::default())];

            for reranker in rerankers {
                let kept = block_on(reranker.rerank(&query, candidates.clone(), top_k)).unwrap();

                prop_assert!(kept.len() <= top_k);
                prop_assert_eq!(kept.len(), top_k.min(candidates.len()));

                let mut seen = std::collections::HashSet::new();
                for result in &kept {
                    prop_assert!(seen.insert(result.chunk.id.clone()), "duplicate {}", result.chunk.id);
                    prop_assert!(candidates.iter().any(|c| c.chunk == result.chunk));
                }
                for window in kept.windows(2) {
                    if reranker.name() == "lexical" {
                        prop_assert!(window[0].score >= window[1].score);
                    }
                }
            }
        }
    }
}
