use crate::client::{GenerationClient, TextRequest};
use crate::error::GenError;
use crate::retry::{with_retry, RetryOptions};
use crate::state::{SlidePlan, StyleMode};
use serde::Deserialize;
use std::sync::Arc;

/// Input text beyond this many characters is dropped from the prompt.
pub const INPUT_CHAR_CAP: usize = 15_000;

/// Converts raw input text into an ordered slide outline. Tries the primary
/// model tier first; any failure (transport, parse, validation) falls
/// through once to the fallback tier with the identical prompt.
pub struct OutlinePlanner {
    client: Arc<dyn GenerationClient>,
    primary_model: String,
    fallback_model: String,
    retry: RetryOptions,
    narrative_language: String,
    visual_language: String,
}

impl OutlinePlanner {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        primary_model: &str,
        fallback_model: &str,
        retry: RetryOptions,
        narrative_language: &str,
        visual_language: &str,
    ) -> Self {
        Self {
            client,
            primary_model: primary_model.to_string(),
            fallback_model: fallback_model.to_string(),
            retry,
            narrative_language: narrative_language.to_string(),
            visual_language: visual_language.to_string(),
        }
    }

    pub async fn plan(
        &self,
        input_text: &str,
        slide_count: usize,
        style_mode: StyleMode,
        design_system: &str,
    ) -> Result<Vec<SlidePlan>, GenError> {
        let prompt = self.build_prompt(input_text, slide_count, style_mode, design_system);

        for model in [&self.primary_model, &self.fallback_model] {
            let client = self.client.clone();
            let req = TextRequest {
                model: model.clone(),
                prompt: prompt.clone(),
                structured_json: true,
            };

            let attempt = with_retry(&self.retry, || {
                let client = client.clone();
                let req = req.clone();
                async move {
                    let raw = client.generate_text(&req).await?;
                    parse_slides(&raw)
                }
            })
            .await;

            match attempt {
                Ok(slides) => return Ok(slides),
                Err(e) => log::warn!("outline planning with model {model} failed: {e}"),
            }
        }

        Err(GenError::Planning(
            "both model tiers exhausted without a valid outline".to_string(),
        ))
    }

    fn build_prompt(
        &self,
        input_text: &str,
        slide_count: usize,
        style_mode: StyleMode,
        design_system: &str,
    ) -> String {
        let truncated: String = input_text.chars().take(INPUT_CHAR_CAP).collect();

        let density = match style_mode {
            StyleMode::Concise => {
                "Keep each slide sparse and high-impact: one idea, a short punchy sentence \
                 or two of content at most."
            }
            StyleMode::Detailed => {
                "Make each slide dense and editorial: a full structured treatment of its \
                 topic with supporting points."
            }
        };

        format!(
            "Split the source text below into a presentation outline of exactly {slide_count} \
             slides.\n\
             \n\
             Design system governing the deck:\n{design_system}\n\
             \n\
             {density}\n\
             \n\
             Hard requirements:\n\
             1. Slide 1 is a cover slide: the deck title and a one-line hook.\n\
             2. The slides form a narrative arc through the material, not a mechanical \
             chop of the text.\n\
             3. Never introduce facts that are absent from the source text.\n\
             4. Write title and content in {narrative}.\n\
             5. visualDescription is written in {visual} and describes an illustrative or \
             infographic concept congruent with the design system. Never a literal photograph.\n\
             \n\
             Return only a JSON array in which every element is \
             {{\"id\": <1-based slide number>, \"title\": ..., \"content\": ..., \
             \"visualDescription\": ...}}.\n\
             \n\
             Source text:\n{truncated}",
            narrative = self.narrative_language,
            visual = self.visual_language,
        )
    }
}

/// Raw record shape requested from the model. Missing required fields are a
/// shape violation; extra fields are discarded.
#[derive(Deserialize)]
struct RawSlide {
    id: u32,
    title: String,
    content: String,
    #[serde(rename = "visualDescription")]
    visual_description: String,
}

pub fn parse_slides(raw: &str) -> Result<Vec<SlidePlan>, GenError> {
    let clean = strip_code_blocks(raw);

    let records: Vec<RawSlide> = serde_json::from_str(&clean)
        .map_err(|e| GenError::MalformedOutput(format!("{e}. Output: {clean}")))?;

    if records.is_empty() {
        return Err(GenError::MalformedOutput(
            "model returned an empty outline".to_string(),
        ));
    }

    let mut slides = Vec::with_capacity(records.len());
    let mut last_id = 0u32;
    for record in records {
        // Ids are the deck's ordering key: positive, unique, ascending.
        // Starting from 0 makes this one check also reject a zero id.
        if record.id <= last_id {
            return Err(GenError::MalformedOutput(format!(
                "slide ids must be positive, unique, and ascending, got {} after {}",
                record.id, last_id
            )));
        }
        last_id = record.id;
        if record.title.trim().is_empty()
            || record.content.trim().is_empty()
            || record.visual_description.trim().is_empty()
        {
            return Err(GenError::MalformedOutput(format!(
                "slide {} is missing title, content, or visualDescription",
                record.id
            )));
        }
        slides.push(SlidePlan::new(
            record.id,
            &record.title,
            &record.content,
            &record.visual_description,
        ));
    }

    Ok(slides)
}

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else {
        s.to_string()
    }
}
