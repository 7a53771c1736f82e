use crate::client::{GenerationClient, ImageRequest};
use crate::error::GenError;
use crate::retry::{with_retry, RetryOptions};
use crate::state::{ImagePayload, SlidePlan};
use std::sync::Arc;

/// Renders one slide plan into a full slide image against the current
/// design system.
pub struct SlideImageSynthesizer {
    client: Arc<dyn GenerationClient>,
    model: String,
    aspect_ratio: String,
    resolution: String,
    retry: RetryOptions,
}

impl SlideImageSynthesizer {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        model: &str,
        aspect_ratio: &str,
        resolution: &str,
        retry: RetryOptions,
    ) -> Self {
        Self {
            client,
            model: model.to_string(),
            aspect_ratio: aspect_ratio.to_string(),
            resolution: resolution.to_string(),
            retry,
        }
    }

    /// One retried image call. The extraction of the first image part sits
    /// inside the retried unit, so a response without one is retried like
    /// any other failure. No placeholder fallback happens here.
    pub async fn synthesize(
        &self,
        slide: &SlidePlan,
        design_system: &str,
    ) -> Result<ImagePayload, GenError> {
        let req = ImageRequest {
            model: self.model.clone(),
            prompt: compose_prompt(slide, design_system),
            aspect_ratio: self.aspect_ratio.clone(),
            resolution: self.resolution.clone(),
        };

        let client = self.client.clone();
        with_retry(&self.retry, || {
            let client = client.clone();
            let req = req.clone();
            async move {
                let parts = client.generate_image(&req).await?;
                parts
                    .into_iter()
                    .find(|p| p.mime_type.starts_with("image/"))
                    .ok_or(GenError::NoImageReturned)
            }
        })
        .await
    }
}

/// Prompt blocks in fixed order: design system, visual concept, user
/// adjustment, then the exact-text mandate.
pub fn compose_prompt(slide: &SlidePlan, design_system: &str) -> String {
    let adjustment = slide
        .user_prompt_override
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("none");

    format!(
        "Render a complete 16:9 presentation slide as a single image.\n\
         \n\
         Design system (follow it exactly):\n{design_system}\n\
         \n\
         Visual concept for this slide:\n{visual}\n\
         \n\
         User adjustment: {adjustment}\n\
         \n\
         The slide must display the following text, verbatim and legibly. \
         Do not invent, translate, or omit any text.\n\
         Title: {title}\n\
         Content: {content}",
        visual = slide.visual_description,
        title = slide.title,
        content = slide.content,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TextRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn png(bytes: &[u8]) -> ImagePayload {
        ImagePayload {
            mime_type: "image/png".to_string(),
            bytes: bytes.to_vec(),
        }
    }

    #[derive(Debug)]
    struct ImageClient {
        parts: Vec<ImagePayload>,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl GenerationClient for ImageClient {
        async fn generate_text(&self, _req: &TextRequest) -> Result<String, GenError> {
            unimplemented!("not a text test")
        }

        async fn generate_image(
            &self,
            _req: &ImageRequest,
        ) -> Result<Vec<ImagePayload>, GenError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.parts.clone())
        }
    }

    fn synthesizer(client: Arc<ImageClient>, attempts: u32) -> SlideImageSynthesizer {
        SlideImageSynthesizer::new(
            client,
            "image-model",
            "16:9",
            "2K",
            RetryOptions::immediate(attempts),
        )
    }

    #[test]
    fn prompt_blocks_appear_in_fixed_order() {
        let mut slide = SlidePlan::new(3, "標題", "本文內容", "A bold isometric diagram");
        slide.user_prompt_override = Some("warmer colors".to_string());

        let prompt = compose_prompt(&slide, "THE-DESIGN-SYSTEM");

        let design = prompt.find("THE-DESIGN-SYSTEM").unwrap();
        let visual = prompt.find("A bold isometric diagram").unwrap();
        let adjustment = prompt.find("warmer colors").unwrap();
        let title = prompt.find("標題").unwrap();
        assert!(design < visual && visual < adjustment && adjustment < title);
        assert!(prompt.contains("本文內容"));
    }

    #[test]
    fn absent_override_renders_explicit_none_marker() {
        let slide = SlidePlan::new(1, "t", "c", "v");
        let prompt = compose_prompt(&slide, "d");
        assert!(prompt.contains("User adjustment: none"));
    }

    #[tokio::test]
    async fn extracts_first_image_part() {
        let client = Arc::new(ImageClient {
            parts: vec![png(b"first"), png(b"second")],
            calls: Mutex::new(0),
        });
        let s = synthesizer(client.clone(), 1);
        let slide = SlidePlan::new(1, "t", "c", "v");

        let image = s.synthesize(&slide, "d").await.unwrap();

        assert_eq!(image.bytes, b"first");
        assert_eq!(*client.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn skips_non_image_inline_parts() {
        let client = Arc::new(ImageClient {
            parts: vec![
                ImagePayload {
                    mime_type: "application/octet-stream".to_string(),
                    bytes: b"blob".to_vec(),
                },
                png(b"real"),
            ],
            calls: Mutex::new(0),
        });
        let s = synthesizer(client, 1);
        let slide = SlidePlan::new(1, "t", "c", "v");

        let image = s.synthesize(&slide, "d").await.unwrap();
        assert_eq!(image.bytes, b"real");
    }

    #[tokio::test]
    async fn no_image_part_is_retried_then_surfaced() {
        let client = Arc::new(ImageClient {
            parts: vec![],
            calls: Mutex::new(0),
        });
        let s = synthesizer(client.clone(), 3);
        let slide = SlidePlan::new(1, "t", "c", "v");

        let result = s.synthesize(&slide, "d").await;

        assert!(matches!(result, Err(GenError::NoImageReturned)));
        assert_eq!(*client.calls.lock().unwrap(), 3);
    }
}
