// src/synthesize.rs
//! Maps one resolved attachment to the content blocks that display it.

use crate::classify::{classify_preview, MediaCategory, PreviewAffordance};
use crate::model::{ContentBlock, ResolvedAttachment};

/// Builds the block group for one attachment.
///
/// The group is never empty. When the durable URL is blank the attachment
/// is shown as an unlinked label.
pub fn synthesize(resolved: &ResolvedAttachment) -> Vec<ContentBlock> {
    let attachment = resolved.attachment();
    let name = attachment.name();
    let category = attachment.media_category();
    let url = resolved.durable_url().trim();

    if url.is_empty() {
        let mut blocks = vec![ContentBlock::GenericFileLink {
            label: labelled(category, name),
            url: None,
        }];
        if category == MediaCategory::Other {
            blocks.push(type_caption(resolved));
        }
        return blocks;
    }

    let preview = classify_preview(url);
    let url = url.to_string();
    match category {
        MediaCategory::Image => match preview {
            PreviewAffordance::NativeImage => vec![ContentBlock::Image { url }],
            PreviewAffordance::NativeEmbed => vec![ContentBlock::Embed { url }],
            _ => vec![link(category, name, url)],
        },
        MediaCategory::Video => match preview {
            PreviewAffordance::NativeVideo => vec![ContentBlock::Video { url }],
            PreviewAffordance::NativeEmbed => vec![ContentBlock::Embed { url }],
            _ => vec![link(category, name, url)],
        },
        // No audio block exists; the embed below the link is best-effort.
        MediaCategory::Audio => vec![
            ContentBlock::AudioLink {
                label: labelled(category, name),
                url: url.clone(),
            },
            ContentBlock::Embed { url },
        ],
        MediaCategory::Other => vec![link(category, name, url), type_caption(resolved)],
    }
}

fn labelled(category: MediaCategory, name: &str) -> String {
    match category {
        MediaCategory::Image => format!("Image: {}", name),
        MediaCategory::Video => format!("Video: {}", name),
        MediaCategory::Audio => format!("Audio: {}", name),
        MediaCategory::Other => name.to_string(),
    }
}

fn link(category: MediaCategory, name: &str, url: String) -> ContentBlock {
    ContentBlock::GenericFileLink {
        label: labelled(category, name),
        url: Some(url),
    }
}

fn type_caption(resolved: &ResolvedAttachment) -> ContentBlock {
    ContentBlock::Caption {
        text: format!("type: {}", resolved.attachment().mime_type()),
    }
}
