use serde::{Deserialize, Serialize};

/// Layout density requested for the whole deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleMode {
    /// Sparse, high-impact slides with little text per page.
    Concise,
    /// Dense, structured editorial layouts.
    Detailed,
}

impl Default for StyleMode {
    fn default() -> Self {
        StyleMode::Concise
    }
}

/// Binary image returned by the backend, mime type included so the export
/// layer can pick a file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One slide's authoring state. Created by the outline planner or by an
/// explicit append; mutated in place afterwards, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidePlan {
    pub id: u32,
    pub title: String,
    pub content: String,
    /// Instructions to the image synthesizer. Authored in the configured
    /// visual language, a different register from title/content.
    pub visual_description: String,
    /// User-supplied adjustment after reviewing a generated image. Persists
    /// until the user edits it; never cleared automatically.
    #[serde(default)]
    pub user_prompt_override: Option<String>,
    /// Input hook for an externally supplied image. Not consumed by the
    /// generation pipeline itself.
    #[serde(skip)]
    pub reference_image: Option<ImagePayload>,
    #[serde(skip)]
    pub generated_image: Option<ImagePayload>,
    #[serde(skip)]
    pub is_generating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideStatus {
    Idle,
    Generating,
    Done,
}

impl SlidePlan {
    pub fn new(id: u32, title: &str, content: &str, visual_description: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            content: content.to_string(),
            visual_description: visual_description.to_string(),
            user_prompt_override: None,
            reference_image: None,
            generated_image: None,
            is_generating: false,
        }
    }

    /// `Generating` wins while a call is in flight, even when a previous
    /// image exists (regeneration). `Done` means an image is present.
    pub fn status(&self) -> SlideStatus {
        if self.is_generating {
            SlideStatus::Generating
        } else if self.generated_image.is_some() {
            SlideStatus::Done
        } else {
            SlideStatus::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions() {
        let mut slide = SlidePlan::new(1, "t", "c", "v");
        assert_eq!(slide.status(), SlideStatus::Idle);

        slide.is_generating = true;
        assert_eq!(slide.status(), SlideStatus::Generating);

        slide.is_generating = false;
        slide.generated_image = Some(ImagePayload {
            mime_type: "image/png".to_string(),
            bytes: vec![1, 2, 3],
        });
        assert_eq!(slide.status(), SlideStatus::Done);

        // Regeneration: in-flight call on a completed slide reads Generating.
        slide.is_generating = true;
        assert_eq!(slide.status(), SlideStatus::Generating);
    }
}
