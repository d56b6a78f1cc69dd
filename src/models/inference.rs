//! # Inference Server Backends
//!
//! Translation (NLLB) and punctuation restoration run on an inference server that speaks
//! the Hugging Face inference protocol: `POST {base_url}/models/{model_id}` with an
//! `inputs` string and task `parameters`.
//!
//! A remote model counts as loaded once it has answered a warm-up request, so an
//! unreachable server or a model the server does not host is reported as a load failure.

use super::{Punctuator, Translator};
use crate::config::InferenceConfig;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Punctuation labels the punctuation model predicts; `0` means "no mark".
const PUNCTUATION_MARKS: [&str; 5] = [".", ",", "?", "-", ":"];

/// Characters stripped before punctuation is predicted again.
const STRIPPED_MARKS: [char; 6] = ['.', ',', ';', ':', '!', '?'];

/// HTTP client for the inference server, shared by every remote model.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl InferenceClient {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build inference HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn model_url(&self, model_id: &str) -> String {
        format!("{}/models/{}", self.base_url, model_id)
    }

    async fn infer<T: DeserializeOwned>(&self, model_id: &str, body: serde_json::Value) -> Result<T> {
        let url = self.model_url(model_id);
        let mut request = self.http.post(&url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Inference request to {} failed", url))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Inference server returned {} for {}: {}", status, model_id, detail));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Unexpected response body from {}", model_id))
    }
}

#[derive(Debug, Deserialize)]
struct TranslationOutput {
    translation_text: String,
}

/// NLLB translation served by the inference server.
pub struct RemoteTranslator {
    client: Arc<InferenceClient>,
    model_id: String,
}

impl RemoteTranslator {
    /// Connect and run one warm-up translation.
    pub async fn connect(client: Arc<InferenceClient>, model_id: &str) -> Result<Self> {
        tracing::info!(model = model_id, "Connecting to translation model");
        let translator = Self {
            client,
            model_id: model_id.to_string(),
        };
        let sample = translator.translate("Hello", "eng_Latn", "fra_Latn").await?;
        tracing::debug!(model = model_id, sample = %sample, "Translation model warm-up complete");
        Ok(translator)
    }
}

#[async_trait]
impl Translator for RemoteTranslator {
    async fn translate(&self, text: &str, source_tag: &str, target_tag: &str) -> Result<String> {
        for tag in [source_tag, target_tag] {
            if !crate::languages::is_valid_tag(tag) {
                bail!("Malformed language tag: {}", tag);
            }
        }
        let body = json!({
            "inputs": text,
            "parameters": { "src_lang": source_tag, "tgt_lang": target_tag }
        });
        let outputs: Vec<TranslationOutput> = self.client.infer(&self.model_id, body).await?;
        outputs
            .into_iter()
            .next()
            .map(|output| output.translation_text)
            .ok_or_else(|| anyhow!("Translation model returned no output"))
    }
}

/// One labelled token from the token-classification pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelledSpan {
    /// `entity` per token; `entity_group` if the server aggregated anyway
    #[serde(rename = "entity", alias = "entity_group")]
    pub label: String,
    /// Character offsets into the submitted text
    pub start: usize,
    pub end: usize,
}

/// Punctuation restoration served by the inference server.
pub struct RemotePunctuator {
    client: Arc<InferenceClient>,
    model_id: String,
}

impl RemotePunctuator {
    /// Connect and run one warm-up prediction.
    pub async fn connect(client: Arc<InferenceClient>, model_id: &str) -> Result<Self> {
        tracing::info!(model = model_id, "Connecting to punctuation model");
        let punctuator = Self {
            client,
            model_id: model_id.to_string(),
        };
        punctuator.restore_punctuation("hello how are you").await?;
        Ok(punctuator)
    }
}

#[async_trait]
impl Punctuator for RemotePunctuator {
    async fn restore_punctuation(&self, text: &str) -> Result<String> {
        let clean = strip_punctuation(text);
        if clean.is_empty() {
            return Ok(clean);
        }
        let body = json!({
            "inputs": clean,
            "parameters": { "aggregation_strategy": "none" }
        });
        let spans: Vec<LabelledSpan> = self.client.infer(&self.model_id, body).await?;
        Ok(apply_punctuation(&clean, &spans))
    }
}

/// Remove sentence punctuation that is not part of a number and collapse whitespace,
/// so the model predicts every mark from scratch.
pub fn strip_punctuation(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let kept: String = chars
        .iter()
        .enumerate()
        .filter(|&(i, c)| {
            if !STRIPPED_MARKS.contains(c) {
                return true;
            }
            let digit_before = i > 0 && chars[i - 1].is_ascii_digit();
            let digit_after = chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
            digit_before || digit_after
        })
        .map(|(_, c)| *c)
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insert the predicted marks into `text`. A mark lands at the end of the word its span
/// finishes in; when several spans end in the same word the last prediction wins.
pub fn apply_punctuation(text: &str, spans: &[LabelledSpan]) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut marks: BTreeMap<usize, &str> = BTreeMap::new();

    for span in spans {
        let label = span.label.as_str();
        if !PUNCTUATION_MARKS.contains(&label) || span.end == 0 {
            continue;
        }
        let mut word_end = span.end.min(chars.len());
        while word_end < chars.len() && !chars[word_end].is_whitespace() {
            word_end += 1;
        }
        marks.insert(word_end, label);
    }

    let mut restored = String::with_capacity(text.len() + marks.len());
    for (i, c) in chars.iter().enumerate() {
        if let Some(mark) = marks.get(&i) {
            restored.push_str(mark);
        }
        restored.push(*c);
    }
    if let Some(mark) = marks.get(&chars.len()) {
        restored.push_str(mark);
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(label: &str, start: usize, end: usize) -> LabelledSpan {
        LabelledSpan {
            label: label.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_strip_punctuation() {
        assert_eq!(strip_punctuation("Hello, world!  How are you?"), "Hello world How are you");
        assert_eq!(strip_punctuation("it costs 3.50 today."), "it costs 3.50 today");
        assert_eq!(strip_punctuation("   "), "");
    }

    #[test]
    fn test_apply_punctuation() {
        let text = "hello my name is clara how are you";
        let spans = vec![
            span("0", 0, 5),
            span(",", 0, 5),
            span("0", 6, 16),
            span(".", 17, 22),
            span("?", 31, 34),
        ];
        assert_eq!(
            apply_punctuation(text, &spans),
            "hello, my name is clara. how are you?"
        );
    }

    #[test]
    fn test_consecutive_words_keep_their_own_marks() {
        let spans = vec![span(",", 0, 6), span(",", 7, 14), span("0", 15, 22)];
        assert_eq!(
            apply_punctuation("apples oranges bananas", &spans),
            "apples, oranges, bananas"
        );
    }

    #[test]
    fn test_per_token_output_parsing() {
        let body = r#"[
            {"entity": ",", "score": 0.98, "index": 1, "word": "▁apples", "start": 0, "end": 6},
            {"entity": ",", "score": 0.97, "index": 2, "word": "▁orange", "start": 7, "end": 13},
            {"entity": "0", "score": 0.99, "index": 3, "word": "s", "start": 13, "end": 14},
            {"entity": ".", "score": 0.95, "index": 4, "word": "▁bananas", "start": 15, "end": 22}
        ]"#;
        let spans: Vec<LabelledSpan> = serde_json::from_str(body).unwrap();
        assert_eq!(
            apply_punctuation("apples oranges bananas", &spans),
            "apples, oranges, bananas."
        );
    }

    #[test]
    fn test_mark_moves_to_word_end() {
        // Span ends inside "world" (subword boundary)
        let spans = vec![span(".", 6, 9)];
        assert_eq!(apply_punctuation("hello world", &spans), "hello world.");
    }

    #[test]
    fn test_unknown_labels_are_ignored() {
        let spans = vec![span("LABEL_7", 0, 5), span("!", 0, 5)];
        assert_eq!(apply_punctuation("hello", &spans), "hello");
    }

    #[test]
    fn test_offsets_are_characters_not_bytes() {
        let text = "añoranza está aquí";
        let spans = vec![span(",", 0, 8), span(".", 14, 18)];
        assert_eq!(apply_punctuation(text, &spans), "añoranza, está aquí.");
    }

    #[test]
    fn test_model_url() {
        let client = InferenceClient::new(&InferenceConfig {
            base_url: "http://localhost:8080/".to_string(),
            api_token: None,
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(
            client.model_url("facebook/nllb-200-distilled-600M"),
            "http://localhost:8080/models/facebook/nllb-200-distilled-600M"
        );
    }

    #[test]
    fn test_translation_output_parsing() {
        let body = r#"[{"translation_text": " Hola mundo "}]"#;
        let outputs: Vec<TranslationOutput> = serde_json::from_str(body).unwrap();
        assert_eq!(outputs[0].translation_text, " Hola mundo ");
    }
}
