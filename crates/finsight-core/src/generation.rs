//! Prompt assembly and answer generation.

use async_trait::async_trait;

use crate::error::{PipelineError, Service};
use crate::models::CorpusEntry;

/// Fixed reply the model is told to give when the context does not help.
pub const NO_MATCH_REPLY: &str =
    "[I couldn't find a good match in the document database for your query]";

/// An external text-generation model.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    /// Return the text of the first completion for `prompt`.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> anyhow::Result<String>;
}

/// Build the answer prompt from the matched entry and the user's query.
///
/// The output is a pure function of its inputs.
pub fn build_prompt(entry: &CorpusEntry, query: &str) -> String {
    format!(
        "Here is the context: Question: {input}\n\
         Answer: {output}\n\
         \n\
         Using the relevant information from the context,\n\
         provide an answer to the query: \"{query}\".\n\
         \n\
         If the context doesn't provide any relevant information,\n\
         answer with:\n\
         {reply}",
        input = entry.input_text,
        output = entry.output_text,
        query = query,
        reply = NO_MATCH_REPLY,
    )
}

/// Call the generator, mapping failures to [`PipelineError::ExternalService`].
pub async fn generate_text(
    generator: &dyn Generator,
    prompt: &str,
    max_tokens: u32,
) -> Result<String, PipelineError> {
    match generator.generate(prompt, max_tokens).await {
        Ok(text) => Ok(text),
        Err(e) => {
            tracing::warn!(
                model = generator.model_name(),
                error = %format!("{:#}", e),
                "generation failed"
            );
            Err(PipelineError::external(Service::Generation, &e))
        }
    }
}

/// Generate an answer to `query` grounded on `entry`.
pub async fn generate_answer(
    generator: &dyn Generator,
    entry: &CorpusEntry,
    query: &str,
    max_tokens: u32,
) -> Result<String, PipelineError> {
    let prompt = build_prompt(entry, query);
    generate_text(generator, &prompt, max_tokens).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{record, FailingGenerator, RecordingGenerator};

    fn apr_entry() -> CorpusEntry {
        CorpusEntry::new(
            record(
                "What is APR?",
                "Annual Percentage Rate is the yearly cost of borrowing.",
                "fraud",
            ),
            None,
        )
    }

    #[test]
    fn test_prompt_template_is_exact() {
        let prompt = build_prompt(&apr_entry(), "What does APR mean?");
        let expected = "Here is the context: Question: What is APR?\n\
Answer: Annual Percentage Rate is the yearly cost of borrowing.\n\
\n\
Using the relevant information from the context,\n\
provide an answer to the query: \"What does APR mean?\".\n\
\n\
If the context doesn't provide any relevant information,\n\
answer with:\n\
[I couldn't find a good match in the document database for your query]";
        assert_eq!(prompt, expected);
    }

    #[tokio::test]
    async fn test_generate_answer_sends_prompt() {
        let generator = RecordingGenerator::default();
        let answer = generate_answer(&generator, &apr_entry(), "APR?", 1024)
            .await
            .unwrap();
        assert!(answer.starts_with("generated answer"));
        let prompts = generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("provide an answer to the query: \"APR?\""));
    }

    #[tokio::test]
    async fn test_generate_failure_is_external_service() {
        let err = generate_answer(&FailingGenerator, &apr_entry(), "APR?", 16)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ExternalService {
                service: Service::Generation,
                ..
            }
        ));
        assert!(err.to_string().contains("quota exceeded"));
    }
}
