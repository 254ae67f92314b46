use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::extract::ContentExtractor;
use crate::llm::{LlmProvider, LlmRequest};

pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant that summarizes news articles concisely. \
Provide a clear, informative summary in 3-5 sentences.";

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// The page was unreachable or had no extractable text.
    #[error("could not extract article content from {url}")]
    Extraction { url: String },
    /// The completion backend failed or is not configured.
    #[error("summarization backend failed: {0:#}")]
    Completion(anyhow::Error),
}

/// Extraction followed by a single completion call.
#[derive(Clone)]
pub struct Summarizer {
    extractor: ContentExtractor,
    provider: Option<Arc<dyn LlmProvider>>,
}

impl Summarizer {
    pub fn new(extractor: ContentExtractor, provider: Option<Arc<dyn LlmProvider>>) -> Self {
        Self { extractor, provider }
    }

    /// Summarize the article at `url` on behalf of `caller_id`.
    ///
    /// The backend is called at most once and its text is returned verbatim.
    pub async fn summarize(&self, caller_id: &str, url: &str) -> Result<String, SummarizeError> {
        let content = self.extractor.extract(url).await;
        if content.is_empty() {
            warn!(%url, "summarize: nothing to summarize");
            return Err(SummarizeError::Extraction { url: url.to_string() });
        }

        let Some(provider) = self.provider.as_ref() else {
            error!("summarize: no completion provider configured");
            return Err(SummarizeError::Completion(anyhow::anyhow!(
                "no completion provider configured"
            )));
        };

        let request = LlmRequest {
            session_id: Some(session_id(caller_id)),
            system_prompt: Some(SYSTEM_INSTRUCTION.to_string()),
            prompt: user_prompt(&content),
            ..LlmRequest::default()
        };

        match provider.generate(request).await {
            Ok(response) => {
                info!(
                    %url,
                    model = %response.model,
                    total_tokens = response.usage.total_tokens,
                    "summarize: summary generated"
                );
                Ok(response.content)
            }
            Err(e) => {
                error!(%url, error = %format!("{:#}", e), "summarize: completion failed");
                Err(SummarizeError::Completion(e))
            }
        }
    }
}

fn session_id(caller_id: &str) -> String {
    format!("summarize_{}_{}", caller_id, Uuid::new_v4())
}

fn user_prompt(content: &str) -> String {
    format!("Please summarize this article:\n\n{}", content)
}
