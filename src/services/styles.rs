//! Stylization presets and prompt construction.
//!
//! Image styles map a preset id (as sent by the style picker) to the prompt
//! fragment handed to the image model. Animation only distinguishes the
//! untouched photo from everything else.

/// Style used when a request names no preset.
pub const DEFAULT_IMAGE_STYLE: &str = "caricature";

/// Style id for an unstylized photo.
pub const ORIGINAL_STYLE: &str = "original";

/// A stylization preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StylePreset {
    pub id: &'static str,
    pub name: &'static str,
    pub prompt: &'static str,
}

pub const IMAGE_STYLES: &[StylePreset] = &[
    StylePreset {
        id: "caricature",
        name: "Caricature",
        prompt: "classic fun cartoon caricature style, exaggerated features",
    },
    StylePreset {
        id: "watercolor",
        name: "Watercolor",
        prompt: "soft artistic watercolor painting style",
    },
    StylePreset {
        id: "anime",
        name: "Anime",
        prompt: "Japanese anime illustration style",
    },
    StylePreset {
        id: "popArt",
        name: "Pop Art",
        prompt: "bold colorful pop art comic style",
    },
];

/// Realistic motion prompt for unstylized photos.
pub const ANIMATE_ORIGINAL_PROMPT: &str = "subtle natural movement, gentle smile, slight head turn, \
preserve exact facial features and age, flattering soft warm lighting, cinematic, smooth motion, \
high quality, beautiful, youthful glow";

/// Motion prompt that keeps an illustrated image in its art style.
pub const ANIMATE_STYLED_PROMPT: &str = "maintain exact art style, keep illustration style, \
subtle movement, gentle expression change, smooth animation, do not convert to realistic photo, \
preserve the artistic medium exactly as shown";

/// Look up a preset by id, case-insensitively. Accepts display names too
/// (`"pop art"` finds `popArt`).
pub fn find_style(id: &str) -> Option<&'static StylePreset> {
    let needle = id.trim();
    IMAGE_STYLES.iter().find(|s| {
        s.id.eq_ignore_ascii_case(needle) || s.name.eq_ignore_ascii_case(needle)
    })
}

/// Prompt for a caricature of the user at work.
///
/// Unknown styles are passed through verbatim as "<style> style".
pub fn image_prompt(job_title: &str, gender: &str, style: &str) -> String {
    let fragment = match find_style(style) {
        Some(preset) => preset.prompt.to_string(),
        None => format!("{} style", style.trim()),
    };

    let subject = [gender.trim(), job_title.trim()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "A fun cartoon caricature of a {subject} at work, {fragment}, colorful, \
detailed workplace background, professional illustration, high quality"
    )
}

/// Motion prompt for a video of an image in `style`.
pub fn animate_prompt(style: &str) -> &'static str {
    if style == ORIGINAL_STYLE {
        ANIMATE_ORIGINAL_PROMPT
    } else {
        ANIMATE_STYLED_PROMPT
    }
}

/// Only 5 and 10 second clips are offered; anything else becomes 5.
pub fn video_duration(requested: u32) -> u32 {
    if requested == 10 {
        10
    } else {
        5
    }
}
