//! Translation between two user-facing language names.

use super::PipelineError;
use crate::languages;
use crate::models::{ModelCache, ModelKind};
use tracing::{debug, error};

/// Resolve both language names, then translate `text` with the cached model.
///
/// Unknown names fail before any model is touched. Empty text short-circuits to an
/// empty result once the names are known to be valid.
pub async fn translate(
    models: &ModelCache,
    text: &str,
    source_language: &str,
    target_language: &str,
) -> Result<String, PipelineError> {
    let source_tag = languages::resolve(source_language)?;
    let target_tag = languages::resolve(target_language)?;

    if text.trim().is_empty() {
        return Ok(String::new());
    }

    let translator = models.translator().await?;

    debug!(source = source_tag, target = target_tag, "Translating {} chars", text.len());
    let translated = translator
        .translate(text, source_tag, target_tag)
        .await
        .map_err(|source| {
            error!("Translation failed ({} -> {}): {:#}", source_tag, target_tag, source);
            PipelineError::Inference {
                kind: ModelKind::Translation,
                source,
            }
        })?;

    Ok(translated.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MockModelLoader;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_empty_text_skips_model_but_checks_languages() {
        let mut loader = MockModelLoader::new();
        loader.expect_load_translator().never();
        let models = ModelCache::new(Arc::new(loader));

        assert_eq!(translate(&models, " ", "English", "French").await.unwrap(), "");
        assert!(matches!(
            translate(&models, "", "English", "Elvish").await,
            Err(PipelineError::InvalidLanguage(name)) if name == "Elvish"
        ));
    }
}
