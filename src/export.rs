use crate::state::SlidePlan;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the finalized deck as one page file per slide, in slide order:
/// the generated image when one exists, otherwise a text-only fallback page
/// built from title and content. An `outline.json` manifest of the slide
/// records is written alongside.
pub fn export_deck(dir: &Path, slides: &[SlidePlan]) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {dir:?}"))?;

    let mut pages = Vec::with_capacity(slides.len());
    for (page, slide) in slides.iter().enumerate() {
        let path = match &slide.generated_image {
            Some(image) => {
                let path = dir.join(format!(
                    "slide_{:02}.{}",
                    page + 1,
                    extension_for(&image.mime_type)
                ));
                fs::write(&path, &image.bytes)?;
                path
            }
            None => {
                let path = dir.join(format!("slide_{:02}.txt", page + 1));
                fs::write(&path, format!("{}\n\n{}\n", slide.title, slide.content))?;
                path
            }
        };
        pages.push(path);
    }

    let manifest = dir.join("outline.json");
    fs::write(&manifest, serde_json::to_string_pretty(slides)?)?;

    Ok(pages)
}

fn extension_for(mime_type: &str) -> &str {
    match mime_type {
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ImagePayload;

    #[test]
    fn writes_image_pages_and_text_fallbacks_in_slide_order() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = SlidePlan::new(1, "封面", "開場白", "v1");
        first.generated_image = Some(ImagePayload {
            mime_type: "image/png".to_string(),
            bytes: vec![0x89, 0x50],
        });
        let second = SlidePlan::new(2, "第二頁", "沒有圖片", "v2");

        let pages = export_deck(dir.path(), &[first, second]).unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages[0].ends_with("slide_01.png"));
        assert!(pages[1].ends_with("slide_02.txt"));

        let fallback = fs::read_to_string(&pages[1]).unwrap();
        assert!(fallback.contains("第二頁"));
        assert!(fallback.contains("沒有圖片"));

        let manifest = fs::read_to_string(dir.path().join("outline.json")).unwrap();
        assert!(manifest.contains("封面"));
    }

    #[test]
    fn jpeg_mime_type_picks_jpg_extension() {
        let dir = tempfile::tempdir().unwrap();

        let mut slide = SlidePlan::new(1, "t", "c", "v");
        slide.generated_image = Some(ImagePayload {
            mime_type: "image/jpeg".to_string(),
            bytes: vec![0xff],
        });

        let pages = export_deck(dir.path(), &[slide]).unwrap();
        assert!(pages[0].ends_with("slide_01.jpg"));
    }
}
