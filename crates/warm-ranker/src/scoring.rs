//! [`ScoringAgent`] backed by a chat model.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use warm_ranker_core::agent::{LanguageModel, ScoringAgent};

/// Appended to every instruction so replies carry a parseable score line.
pub const SCORE_FORMAT_DIRECTIVE: &str =
    "Reply with one line of the form `Score: <integer 1-10>` followed by a one-sentence reason.";

pub struct LlmScoringAgent {
    model: Arc<dyn LanguageModel>,
}

impl LlmScoringAgent {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl ScoringAgent for LlmScoringAgent {
    async fn run(&self, instruction: &str) -> Result<String> {
        let prompt = format!("{}\n\n{}", instruction, SCORE_FORMAT_DIRECTIVE);
        tracing::debug!(model = self.model.name(), "scoring profile");
        self.model.complete(&prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use warm_ranker_core::score::extract_score;

    struct EchoModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LanguageModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("Score: 7 - builds marketing tools".to_string())
        }
    }

    #[tokio::test]
    async fn test_instruction_carries_format_directive() {
        let model = Arc::new(EchoModel {
            prompts: Mutex::new(Vec::new()),
        });
        let agent = LlmScoringAgent::new(model.clone());

        let reply = agent
            .run("Score lead relevance. Analyze profile: CTO at Acme - Bio: x")
            .await
            .unwrap();

        assert_eq!(extract_score(&reply), 7);
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with("Score lead relevance. Analyze profile: CTO at Acme"));
        assert!(prompts[0].ends_with(SCORE_FORMAT_DIRECTIVE));
    }
}
