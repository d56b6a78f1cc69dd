//! Punctuation restoration. Cosmetic, so it never fails a request: when the model is
//! unavailable or errors, the input comes back unchanged.

use crate::models::ModelCache;
use tracing::{debug, warn};

pub async fn restore_punctuation(models: &ModelCache, text: &str) -> String {
    let punctuator = match models.punctuator().await {
        Ok(punctuator) => punctuator,
        Err(e) => {
            debug!("Punctuation unavailable, passing text through: {}", e);
            return text.to_string();
        }
    };

    match punctuator.restore_punctuation(text).await {
        Ok(punctuated) => {
            debug!(original = text, punctuated = %punctuated, "Restored punctuation");
            punctuated
        }
        Err(e) => {
            warn!("Punctuation failed, passing text through: {:#}", e);
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MockModelLoader, MockPunctuator, Punctuator};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_inference_error_passes_text_through() {
        let mut punctuator = MockPunctuator::new();
        punctuator
            .expect_restore_punctuation()
            .returning(|_| Err(anyhow::anyhow!("timeout")));
        let punctuator: Arc<dyn Punctuator> = Arc::new(punctuator);

        let mut loader = MockModelLoader::new();
        loader
            .expect_load_punctuator()
            .return_once(move || Ok(punctuator));
        let models = ModelCache::new(Arc::new(loader));

        assert_eq!(restore_punctuation(&models, "so it goes").await, "so it goes");
    }

    #[tokio::test]
    async fn test_loaded_model_is_used() {
        let mut punctuator = MockPunctuator::new();
        punctuator
            .expect_restore_punctuation()
            .returning(|text| Ok(format!("{}?", text)));
        let punctuator: Arc<dyn Punctuator> = Arc::new(punctuator);

        let mut loader = MockModelLoader::new();
        loader
            .expect_load_punctuator()
            .return_once(move || Ok(punctuator));
        let models = ModelCache::new(Arc::new(loader));

        assert_eq!(restore_punctuation(&models, "how are you").await, "how are you?");
    }
}
