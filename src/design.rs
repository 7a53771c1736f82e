use crate::client::{GenerationClient, TextRequest};
use crate::error::GenError;
use crate::retry::{with_retry, RetryOptions};
use crate::state::StyleMode;
use std::sync::Arc;

/// Used when the model answers an otherwise-successful derivation call with
/// empty text.
pub const DEFAULT_DESIGN_SYSTEM: &str =
    "Premium professional deck: deep navy and warm ivory palette with a single gold accent, \
     modern grotesque typography with generous spacing, flat vector illustration motif.";

const BASE_AESTHETIC: &str =
    "a premium, professional aesthetic suitable for an executive presentation";

/// Produces and revises the deck-wide design-system text. The design system
/// is an opaque blob shared by every slide; it is always replaced wholesale,
/// never merged.
pub struct DesignSystemDeriver {
    client: Arc<dyn GenerationClient>,
    model: String,
    retry: RetryOptions,
}

impl DesignSystemDeriver {
    pub fn new(client: Arc<dyn GenerationClient>, model: &str, retry: RetryOptions) -> Self {
        Self {
            client,
            model: model.to_string(),
            retry,
        }
    }

    /// A non-empty `custom_style` wins verbatim with zero remote calls;
    /// otherwise one retried derivation call.
    pub async fn derive(
        &self,
        custom_style: &str,
        style_mode: StyleMode,
    ) -> Result<String, GenError> {
        let custom_style = custom_style.trim();
        if !custom_style.is_empty() {
            return Ok(custom_style.to_string());
        }

        let density = match style_mode {
            StyleMode::Concise => {
                "Layout density: sparse and high-impact. One dominant visual element per \
                 slide, minimal text, bold focal typography, generous negative space."
            }
            StyleMode::Detailed => {
                "Layout density: dense, structured, editorial. Multi-column grids, \
                 clear information hierarchy, room for supporting text and data callouts."
            }
        };

        let prompt = format!(
            "You are an art director. Author a design system for a slide deck with {BASE_AESTHETIC}.\n\
             {density}\n\
             Specify, as one compact paragraph: color palette (with hex values), typography \
             (heading and body), layout rules, and a recurring visual motif. \
             Every slide in the deck will be rendered against this exact specification, \
             so it must be self-contained and unambiguous. Return only the specification text."
        );

        let client = self.client.clone();
        let req = TextRequest {
            model: self.model.clone(),
            prompt,
            structured_json: false,
        };

        let text = with_retry(&self.retry, || {
            let client = client.clone();
            let req = req.clone();
            async move { client.generate_text(&req).await }
        })
        .await?;

        if text.trim().is_empty() {
            return Ok(DEFAULT_DESIGN_SYSTEM.to_string());
        }
        Ok(text)
    }

    /// Full coherent rewrite of `current` under `adjustment`. Empty model
    /// output is a no-op, never a blanked design.
    pub async fn update(&self, current: &str, adjustment: &str) -> Result<String, GenError> {
        let prompt = format!(
            "Here is the design system currently governing a slide deck:\n\n{current}\n\n\
             The user requests this adjustment: {adjustment}\n\n\
             Rewrite the design system in full, applying the adjustment while keeping the \
             rest coherent with the original. Return only the rewritten specification text."
        );

        let client = self.client.clone();
        let req = TextRequest {
            model: self.model.clone(),
            prompt,
            structured_json: false,
        };

        let text = with_retry(&self.retry, || {
            let client = client.clone();
            let req = req.clone();
            async move { client.generate_text(&req).await }
        })
        .await?;

        if text.trim().is_empty() {
            return Ok(current.to_string());
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ImageRequest;
    use crate::state::ImagePayload;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedClient {
        reply: String,
        calls: Mutex<usize>,
    }

    impl ScriptedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate_text(&self, _req: &TextRequest) -> Result<String, GenError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.reply.clone())
        }

        async fn generate_image(
            &self,
            _req: &ImageRequest,
        ) -> Result<Vec<ImagePayload>, GenError> {
            unimplemented!("not an image test")
        }
    }

    fn deriver(client: Arc<ScriptedClient>) -> DesignSystemDeriver {
        DesignSystemDeriver::new(client, "test-model", RetryOptions::immediate(1))
    }

    #[tokio::test]
    async fn custom_style_short_circuits_without_remote_calls() {
        let client = Arc::new(ScriptedClient::new("should not be used"));
        let d = deriver(client.clone());

        let out = d.derive("brutalist red/black", StyleMode::Concise).await.unwrap();

        assert_eq!(out, "brutalist red/black");
        assert_eq!(*client.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn derive_uses_model_text() {
        let client = Arc::new(ScriptedClient::new("navy + ivory, serif headings"));
        let d = deriver(client.clone());

        let out = d.derive("", StyleMode::Detailed).await.unwrap();

        assert_eq!(out, "navy + ivory, serif headings");
        assert_eq!(*client.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn derive_falls_back_on_empty_output() {
        let client = Arc::new(ScriptedClient::new("   "));
        let d = deriver(client);

        let out = d.derive("", StyleMode::Concise).await.unwrap();

        assert_eq!(out, DEFAULT_DESIGN_SYSTEM);
    }

    #[tokio::test]
    async fn update_on_empty_output_returns_current_unchanged() {
        let client = Arc::new(ScriptedClient::new(""));
        let d = deriver(client);

        let out = d.update("the current design", "make it darker").await.unwrap();

        assert_eq!(out, "the current design");
    }

    #[tokio::test]
    async fn update_replaces_with_model_rewrite() {
        let client = Arc::new(ScriptedClient::new("the darker design"));
        let d = deriver(client);

        let out = d.update("the current design", "make it darker").await.unwrap();

        assert_eq!(out, "the darker design");
    }
}
