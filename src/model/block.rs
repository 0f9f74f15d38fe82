use crate::types::BlockId;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

/// Blocks this tool writes to a page. Each maps to one Notion block object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// Section heading, written as `heading_3`.
    Heading { text: String },
    Image { url: String },
    Video { url: String },
    Embed { url: String },
    /// Notion has no audio block; audio is a labelled link.
    AudioLink { label: String, url: String },
    /// A label linking to the file, or plain text when there is no URL.
    GenericFileLink { label: String, url: Option<String> },
    /// Small italic note under a file link.
    Caption { text: String },
    Divider,
}

impl ContentBlock {
    /// The URL the block displays or links to.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Image { url } | Self::Video { url } | Self::Embed { url } => Some(url),
            Self::AudioLink { url, .. } => Some(url),
            Self::GenericFileLink { url, .. } => url.as_deref(),
            Self::Heading { .. } | Self::Caption { .. } | Self::Divider => None,
        }
    }

    pub fn block_type(&self) -> &'static str {
        match self {
            Self::Heading { .. } => "heading_3",
            Self::Image { .. } => "image",
            Self::Video { .. } => "video",
            Self::Embed { .. } => "embed",
            Self::AudioLink { .. } | Self::GenericFileLink { .. } | Self::Caption { .. } => {
                "paragraph"
            }
            Self::Divider => "divider",
        }
    }

    /// The block object as accepted by the append and create endpoints.
    pub fn to_request(&self) -> Value {
        match self {
            Self::Heading { text } => json!({
                "object": "block",
                "type": "heading_3",
                "heading_3": { "rich_text": [text_item(text, None, false)] }
            }),
            Self::Image { url } => json!({
                "object": "block",
                "type": "image",
                "image": { "type": "external", "external": { "url": url } }
            }),
            Self::Video { url } => json!({
                "object": "block",
                "type": "video",
                "video": { "type": "external", "external": { "url": url } }
            }),
            Self::Embed { url } => json!({
                "object": "block",
                "type": "embed",
                "embed": { "url": url }
            }),
            Self::AudioLink { label, url } => paragraph(text_item(label, Some(url), false)),
            Self::GenericFileLink { label, url } => {
                let link = url.as_deref().filter(|u| !u.trim().is_empty());
                paragraph(text_item(label, link, false))
            }
            Self::Caption { text } => paragraph(text_item(text, None, true)),
            Self::Divider => json!({
                "object": "block",
                "type": "divider",
                "divider": {}
            }),
        }
    }
}

impl Serialize for ContentBlock {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_request().serialize(serializer)
    }
}

fn paragraph(item: Value) -> Value {
    json!({
        "object": "block",
        "type": "paragraph",
        "paragraph": { "rich_text": [item] }
    })
}

fn text_item(content: &str, link: Option<&str>, italic: bool) -> Value {
    let mut item = json!({
        "type": "text",
        "text": { "content": content }
    });
    if let Some(url) = link {
        item["text"]["link"] = json!({ "url": url });
    }
    if italic {
        item["annotations"] = json!({ "italic": true, "color": "gray" });
    }
    item
}

/// What the embedder needs to know about a block already on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistingBlockKind {
    Heading { level: u8, text: String },
    Other { block_type: String },
}

/// A child block read back from a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingBlock {
    pub id: BlockId,
    pub kind: ExistingBlockKind,
    /// Media source, embed target, or first text link of the block.
    pub url: Option<String>,
}

impl ExistingBlock {
    pub fn heading_text(&self) -> Option<&str> {
        match &self.kind {
            ExistingBlockKind::Heading { text, .. } => Some(text),
            ExistingBlockKind::Other { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heading_is_written_as_heading_3() {
        let block = ContentBlock::Heading {
            text: "Files".to_string(),
        };
        assert_eq!(
            block.to_request(),
            json!({
                "object": "block",
                "type": "heading_3",
                "heading_3": {
                    "rich_text": [{ "type": "text", "text": { "content": "Files" } }]
                }
            })
        );
    }

    #[test]
    fn file_link_without_url_is_plain_text() {
        let block = ContentBlock::GenericFileLink {
            label: "report.pdf".to_string(),
            url: Some(String::new()),
        };
        let value = block.to_request();
        assert_eq!(
            value["paragraph"]["rich_text"][0]["text"],
            json!({ "content": "report.pdf" })
        );
    }

    #[test]
    fn audio_link_carries_url() {
        let block = ContentBlock::AudioLink {
            label: "Audio: a.mp3".to_string(),
            url: "https://x.test/a.mp3".to_string(),
        };
        assert_eq!(
            block.to_request()["paragraph"]["rich_text"][0]["text"]["link"]["url"],
            "https://x.test/a.mp3"
        );
    }

    #[test]
    fn serialize_matches_request_shape() {
        let block = ContentBlock::Divider;
        assert_eq!(serde_json::to_value(&block).unwrap(), block.to_request());
        assert_eq!(block.block_type(), "divider");
    }
}
