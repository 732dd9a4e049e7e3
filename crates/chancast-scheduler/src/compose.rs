//! Post text generation — one call against any OpenAI-compatible endpoint.

use std::time::Duration;

use chancast_core::config::ComposerConfig;
use chancast_core::{ChanCastError, Result};

/// Generates publish text from schedule parameters.
pub struct Composer {
    config: ComposerConfig,
    client: reqwest::Client,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Ask the model for one post matching the schedule's constraints.
    pub async fn compose_post(
        &self,
        lang: &str,
        min_word_count: u32,
        max_word_count: u32,
        topic_prompt: &str,
    ) -> Result<String> {
        let user_prompt = format!(
            "Language: {lang}. Topic: {topic_prompt}. \
             Length: between {min_word_count} and {max_word_count} words. \
             Return only the post text."
        );

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": self.config.system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "stream": false,
        });

        let mut request = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.config.endpoint.trim_end_matches('/')
            ))
            .json(&body);
        if !self.config.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.config.api_key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChanCastError::Transport(format!("composer request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ChanCastError::Transport(format!(
                "composer returned {status}: {detail}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChanCastError::Transport(format!("invalid composer response: {e}")))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| ChanCastError::Transport("composer returned no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_extraction_shape() {
        let payload = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  hello world  "}}]
        });
        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim);
        assert_eq!(text, Some("hello world"));
    }
}
