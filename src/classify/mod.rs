//! Pure classification of file names and URLs.
//!
//! Nothing here touches the network: media category comes from the file
//! name, preview affordance from an ordered table of URL rules, and
//! time-limited detection from configurable URL markers.

mod media;
mod preview;
mod temporary;

pub use media::{
    classify_media, mime_type_for, MediaCategory, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS,
    VIDEO_EXTENSIONS,
};
pub use preview::{classify_preview, matching_rule, PreviewAffordance, PreviewRule, PREVIEW_RULES};
pub use temporary::TemporaryUrlPolicy;
