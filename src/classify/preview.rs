use super::media::{AUDIO_EXTENSIONS, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS};
use once_cell::sync::Lazy;
use regex::Regex;

/// How a URL can be shown inline on a Notion page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreviewAffordance {
    NativeImage,
    NativeVideo,
    NativeEmbed,
    None,
}

/// One entry of the preview rule table.
#[derive(Debug)]
pub struct PreviewRule {
    pub name: &'static str,
    pattern: Regex,
    pub affordance: PreviewAffordance,
}

impl PreviewRule {
    fn new(name: &'static str, pattern: &str, affordance: PreviewAffordance) -> Self {
        Self {
            name,
            // Patterns are literals below and covered by tests.
            pattern: Regex::new(pattern).expect("preview rule pattern must compile"),
            affordance,
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        self.pattern.is_match(url)
    }
}

fn extension_pattern(extensions: &[&str]) -> String {
    format!(r"(?i)\.({})([?#]|$)", extensions.join("|"))
}

/// Ordered rule table; the first matching rule decides.
pub static PREVIEW_RULES: Lazy<Vec<PreviewRule>> = Lazy::new(|| {
    use PreviewAffordance as P;
    vec![
        PreviewRule::new(
            "drive-direct-view",
            r"(?i)^https?://drive\.google\.com/uc\?([^#]*&)?export=view",
            P::NativeImage,
        ),
        PreviewRule::new(
            "drive-preview",
            r"(?i)^https?://drive\.google\.com/file/d/[^/]+/preview",
            P::NativeEmbed,
        ),
        PreviewRule::new(
            "drive-view",
            r"(?i)^https?://drive\.google\.com/file/d/[^/]+/view",
            P::NativeEmbed,
        ),
        PreviewRule::new("google-docs", r"(?i)^https?://docs\.google\.com/", P::NativeEmbed),
        PreviewRule::new(
            "youtube",
            r"(?i)^https?://((www|m)\.)?(youtube\.com/watch|youtu\.be/)",
            P::NativeVideo,
        ),
        PreviewRule::new("vimeo", r"(?i)^https?://(www\.)?vimeo\.com/\d+", P::NativeVideo),
        PreviewRule::new(
            "image-hosts",
            r"(?i)^https?://(i\.imgur\.com|images\.unsplash\.com)/",
            P::NativeImage,
        ),
        PreviewRule::new(
            "audio-hosts",
            r"(?i)^https?://((www\.)?soundcloud\.com|open\.spotify\.com)/",
            P::NativeEmbed,
        ),
        PreviewRule::new("raw-image", &extension_pattern(IMAGE_EXTENSIONS), P::NativeImage),
        PreviewRule::new("raw-video", &extension_pattern(VIDEO_EXTENSIONS), P::NativeVideo),
        PreviewRule::new("raw-audio", &extension_pattern(AUDIO_EXTENSIONS), P::NativeEmbed),
    ]
});

/// Name of the first rule matching `url`, if any.
pub fn matching_rule(url: &str) -> Option<&'static str> {
    PREVIEW_RULES
        .iter()
        .find(|rule| rule.matches(url))
        .map(|rule| rule.name)
}

pub fn classify_preview(url: &str) -> PreviewAffordance {
    let url = url.trim();
    if url.is_empty() {
        return PreviewAffordance::None;
    }
    PREVIEW_RULES
        .iter()
        .find(|rule| rule.matches(url))
        .map(|rule| rule.affordance)
        .unwrap_or(PreviewAffordance::None)
}
