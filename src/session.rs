use crate::client::{GenerationClient, TextRequest};
use crate::config::Config;
use crate::design::DesignSystemDeriver;
use crate::planner::OutlinePlanner;
use crate::state::{SlidePlan, SlideStatus, StyleMode};
use crate::synthesizer::SlideImageSynthesizer;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Session-level controller. Owns the ordered slide list and the live
/// design-system text; every mutation funnels through its `&mut self`
/// methods, so in-flight async calls never act on a stale snapshot — state
/// is re-read by slide id after each await.
pub struct DeckSession {
    client: Arc<dyn GenerationClient>,
    deriver: DesignSystemDeriver,
    planner: OutlinePlanner,
    synthesizer: SlideImageSynthesizer,
    refine_model: String,
    custom_style: String,
    narrative_language: String,
    style_mode: StyleMode,
    chain_delay: Duration,
    slides: Vec<SlidePlan>,
    design_system: String,
    is_processing: bool,
    started: bool,
}

impl DeckSession {
    pub fn new(config: &Config, client: Arc<dyn GenerationClient>) -> Result<Self> {
        let gemini = config.llm.gemini.as_ref().context("Gemini config missing")?;
        let retry = config.retry_options();

        let deriver = DesignSystemDeriver::new(client.clone(), &gemini.primary_model, retry.clone());
        let planner = OutlinePlanner::new(
            client.clone(),
            &gemini.primary_model,
            &gemini.fallback_model,
            retry.clone(),
            &config.narrative_language,
            &config.visual_language,
        );
        let synthesizer = SlideImageSynthesizer::new(
            client.clone(),
            &gemini.image_model,
            &gemini.aspect_ratio,
            &gemini.resolution,
            retry,
        );

        Ok(Self {
            client,
            deriver,
            planner,
            synthesizer,
            refine_model: gemini.primary_model.clone(),
            custom_style: config.custom_style.clone(),
            narrative_language: config.narrative_language.clone(),
            style_mode: config.style_mode,
            chain_delay: Duration::from_millis(config.chain_delay_ms),
            slides: Vec::new(),
            design_system: String::new(),
            is_processing: false,
            started: false,
        })
    }

    pub fn slides(&self) -> &[SlidePlan] {
        &self.slides
    }

    pub fn slide(&self, id: u32) -> Option<&SlidePlan> {
        self.slides.iter().find(|s| s.id == id)
    }

    pub fn design_system(&self) -> &str {
        &self.design_system
    }

    pub fn is_processing(&self) -> bool {
        self.is_processing
    }

    /// Derives the design system and plans the outline, replacing the deck
    /// wholesale. Nothing is committed unless both steps succeed, so a
    /// failure leaves the prior deck and design untouched.
    pub async fn generate_outline(&mut self, input_text: &str, slide_count: usize) -> Result<()> {
        if self.is_processing {
            anyhow::bail!("an outline generation is already in progress");
        }
        self.is_processing = true;
        let result = self.generate_outline_inner(input_text, slide_count).await;
        self.is_processing = false;
        result
    }

    async fn generate_outline_inner(&mut self, input_text: &str, slide_count: usize) -> Result<()> {
        let design = self
            .deriver
            .derive(&self.custom_style, self.style_mode)
            .await?;

        let slide_count = slide_count.clamp(1, crate::config::SLIDE_COUNT_CAP);
        let slides = self
            .planner
            .plan(input_text, slide_count, self.style_mode, &design)
            .await?;

        log::info!("outline planned: {} slides", slides.len());
        self.design_system = design;
        self.slides = slides;
        self.started = false;
        Ok(())
    }

    /// Kicks off the auto-chain from the first slide, exactly once per deck.
    /// One cooperative yield lets the freshly planned outline settle before
    /// the first remote call fires.
    pub async fn start_session(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let Some(first) = self.slides.first().map(|s| s.id) else {
            return Ok(());
        };
        self.started = true;
        tokio::task::yield_now().await;
        self.generate_one(first, true).await
    }

    /// Generates the image for one slide. With `auto_chain`, an already
    /// completed or in-flight target is skipped in favor of the next idle
    /// slide in order, and each success chains into the immediate next slide
    /// while it is still idle. The chain halts on the first failure and must
    /// be resumed manually.
    pub async fn generate_one(&mut self, id: u32, auto_chain: bool) -> Result<()> {
        let mut target = id;
        loop {
            let idx = self
                .index_of(target)
                .with_context(|| format!("unknown slide id {target}"))?;

            let status = self.slides[idx].status();
            if auto_chain && status != SlideStatus::Idle {
                match self.next_idle_after(idx) {
                    Some(next) => {
                        target = next;
                        continue;
                    }
                    None => return Ok(()),
                }
            }
            if status == SlideStatus::Generating {
                anyhow::bail!("slide {target} already has a generation in flight");
            }

            // Check-and-set: the Generating mark is the per-slide mutex.
            self.slides[idx].is_generating = true;
            log::info!("generating slide {target}");

            let plan = self.slides[idx].clone();
            let design = self.design_system.clone();
            let result = self.synthesizer.synthesize(&plan, &design).await;

            // Never trust an index captured before the await.
            let idx = self
                .index_of(target)
                .context("slide disappeared during generation")?;
            match result {
                Ok(image) => {
                    self.slides[idx].generated_image = Some(image);
                    self.slides[idx].is_generating = false;
                    log::info!("slide {target} done");
                }
                Err(e) => {
                    self.slides[idx].is_generating = false;
                    log::error!("slide {target} generation failed, chain halted: {e}");
                    return Err(e.into());
                }
            }

            if !auto_chain {
                return Ok(());
            }

            match self.slides.get(idx + 1).map(|s| (s.id, s.status())) {
                Some((next_id, SlideStatus::Idle)) => {
                    sleep(self.chain_delay).await;
                    target = next_id;
                }
                _ => return Ok(()),
            }
        }
    }

    /// Best-effort rewrite of one slide's visual description. Deliberately a
    /// single un-retried attempt; on failure the field is left as it was.
    pub async fn refine_description(&mut self, id: u32) -> Result<()> {
        let idx = self
            .index_of(id)
            .with_context(|| format!("unknown slide id {id}"))?;
        let current = self.slides[idx].visual_description.clone();

        let req = TextRequest {
            model: self.refine_model.clone(),
            prompt: format!(
                "Rewrite this image-generation concept to be sharper and more vivid while \
                 keeping the same subject and the same language. Return only the rewritten \
                 concept.\n\n{current}"
            ),
            structured_json: false,
        };
        let refined = self.client.generate_text(&req).await?;
        if refined.trim().is_empty() {
            anyhow::bail!("refinement returned empty output");
        }

        let idx = self
            .index_of(id)
            .context("slide disappeared during refinement")?;
        self.slides[idx].visual_description = refined;
        Ok(())
    }

    /// Rewrites the deck's design system under a user adjustment. Existing
    /// slide images are never regenerated automatically; only generations
    /// issued after this call see the new design.
    pub async fn update_global_style(&mut self, adjustment: &str) -> Result<()> {
        let updated = self.deriver.update(&self.design_system, adjustment).await?;
        self.design_system = updated;
        Ok(())
    }

    /// Appends a placeholder slide. No remote calls. Placeholder text
    /// follows the configured narrative language.
    pub fn add_slide(&mut self) -> u32 {
        let id = self.slides.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let (title, content) = placeholder_text(&self.narrative_language);
        self.slides.push(SlidePlan::new(
            id,
            title,
            content,
            "A minimal placeholder composition consistent with the deck design system.",
        ));
        id
    }

    /// Stores a per-slide adjustment consumed by subsequent generations.
    /// Persists until edited again.
    pub fn set_user_prompt_override(&mut self, id: u32, text: Option<String>) -> Result<()> {
        let idx = self
            .index_of(id)
            .with_context(|| format!("unknown slide id {id}"))?;
        self.slides[idx].user_prompt_override = text;
        Ok(())
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.slides.iter().position(|s| s.id == id)
    }

    fn next_idle_after(&self, idx: usize) -> Option<u32> {
        self.slides[idx + 1..]
            .iter()
            .find(|s| s.status() == SlideStatus::Idle)
            .map(|s| s.id)
    }
}

/// Placeholder title/content for an appended slide, in the deck's narrative
/// language. Unrecognized languages fall back to English.
fn placeholder_text(language: &str) -> (&'static str, &'static str) {
    match language {
        "Traditional Chinese" => ("新投影片", "請在此填入本頁內容。"),
        "Simplified Chinese" => ("新幻灯片", "请在此填入本页内容。"),
        "Japanese" => ("新しいスライド", "このスライドの内容を入力してください。"),
        _ => ("New Slide", "Fill in this slide's content."),
    }
}
