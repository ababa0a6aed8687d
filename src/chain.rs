//! Retrieval-augmented answer chain.
//!
//! A question flows through four typed stages (embed, retrieve, assemble
//! prompt, generate) so each stage's failure mode is independently
//! visible: embedding failures surface as `EmbeddingService`, retrieval
//! problems as index errors, and generation failures as
//! `GenerationService`. The returned [`Answer`] carries the retrieved
//! chunks verbatim, in the exact order they were placed in the prompt.

use std::path::Path;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::generation::Generator;
use crate::index;
use crate::models::{Answer, Retrieved};

/// Answer returned without invoking generation when retrieval finds
/// nothing to ground on.
pub const NO_CONTEXT_ANSWER: &str =
    "No relevant context was found in the indexed codebase for this question.";

const INSTRUCTION: &str = "You are an expert code analyst. Answer the question using ONLY the \
source code excerpts provided below. Every claim must be grounded in the excerpts; cite file \
paths when you refer to code. If the excerpts do not contain the answer, reply exactly: \
'The answer is not present in the codebase.'";

/// Run the full chain for one question against one session's index.
pub async fn answer(
    embedder: &dyn Embedder,
    generator: &dyn Generator,
    index_store: &Path,
    session: &str,
    config: &Config,
    question: &str,
) -> Result<Answer> {
    let query_vec = embedder.embed(question).await?;
    let retrieved = index::query(index_store, session, &query_vec, config.retrieval.top_k).await?;
    generate_grounded(generator, question, retrieved).await
}

/// Assemble the grounded prompt and invoke generation, or short-circuit
/// when there is nothing to ground on. Shared with the audit orchestrator.
pub async fn generate_grounded(
    generator: &dyn Generator,
    question: &str,
    retrieved: Vec<Retrieved>,
) -> Result<Answer> {
    if retrieved.is_empty() {
        // Generating against an empty context invites an ungrounded
        // hallucinated answer.
        return Ok(Answer {
            text: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let prompt = assemble_prompt(question, &retrieved);
    let text = generator.complete(&prompt).await?;

    Ok(Answer {
        text,
        sources: retrieved,
    })
}

/// Build the prompt: instruction, then each chunk labeled with its source
/// path and line range in retrieval order, then the question.
pub fn assemble_prompt(question: &str, retrieved: &[Retrieved]) -> String {
    let mut prompt = String::with_capacity(
        INSTRUCTION.len() + question.len() + retrieved.iter().map(|r| r.chunk.text.len() + 64).sum::<usize>(),
    );

    prompt.push_str(INSTRUCTION);
    prompt.push_str("\n\n");

    for r in retrieved {
        prompt.push_str(&format!(
            "--- {} (lines {}-{}) ---\n",
            r.chunk.path, r.chunk.start_line, r.chunk.end_line
        ));
        prompt.push_str(&r.chunk.text);
        if !r.chunk.text.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push('\n');
    }

    prompt.push_str("Question: ");
    prompt.push_str(question);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn retrieved(path: &str, text: &str, score: f32) -> Retrieved {
        Retrieved {
            chunk: Chunk {
                path: path.to_string(),
                chunk_index: 0,
                text: text.to_string(),
                start_line: 1,
                end_line: 2,
                hash: "h".to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_prompt_labels_chunks_in_order() {
        let chunks = vec![
            retrieved("auth.py", "def login(user, password):\n    pass\n", 0.9),
            retrieved("db.py", "def connect():\n    pass\n", 0.5),
        ];
        let prompt = assemble_prompt("how does login work", &chunks);

        let auth_at = prompt.find("--- auth.py (lines 1-2) ---").unwrap();
        let db_at = prompt.find("--- db.py (lines 1-2) ---").unwrap();
        assert!(auth_at < db_at, "chunks must appear in retrieval order");
        assert!(prompt.contains("def login(user, password):"));
        assert!(prompt.ends_with("Question: how does login work"));
    }

    struct EchoGenerator;

    #[async_trait::async_trait]
    impl crate::generation::Generator for EchoGenerator {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok("generated".to_string())
        }
        fn model_name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_empty_retrieval_short_circuits() {
        let answer = generate_grounded(&EchoGenerator, "anything", Vec::new())
            .await
            .unwrap();
        assert_eq!(answer.text, NO_CONTEXT_ANSWER);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_sources_returned_verbatim() {
        let chunks = vec![
            retrieved("a.py", "alpha", 0.9),
            retrieved("b.py", "beta", 0.7),
        ];
        let answer = generate_grounded(&EchoGenerator, "q", chunks.clone())
            .await
            .unwrap();
        assert_eq!(answer.text, "generated");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].chunk.path, "a.py");
        assert_eq!(answer.sources[1].chunk.path, "b.py");
        assert_eq!(answer.sources[0].chunk.text, "alpha");
    }
}
