use std::fmt;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tiff", "tif", "heic",
];
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "webm", "mkv", "flv", "wmv", "m4v"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "aac", "wma"];

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Broad media family of a file, decided from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaCategory {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaCategory {
    /// Storage folder a re-hosted file of this category is filed under.
    pub fn folder_name(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
            Self::Audio => "audio",
            Self::Other => "others",
        }
    }
}

impl fmt::Display for MediaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Lowercased extension of a file name or URL path, ignoring any query.
pub(crate) fn extension_of(name: &str) -> Option<String> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classifies a file by extension; image, video and audio sets are checked
/// in that order, then the MIME registry decides.
pub fn classify_media(file_name: &str) -> MediaCategory {
    if let Some(ext) = extension_of(file_name) {
        let ext = ext.as_str();
        if IMAGE_EXTENSIONS.contains(&ext) {
            return MediaCategory::Image;
        }
        if VIDEO_EXTENSIONS.contains(&ext) {
            return MediaCategory::Video;
        }
        if AUDIO_EXTENSIONS.contains(&ext) {
            return MediaCategory::Audio;
        }
    }

    match mime_guess::from_path(file_name).first() {
        Some(mime) if mime.type_() == mime_guess::mime::IMAGE => MediaCategory::Image,
        Some(mime) if mime.type_() == mime_guess::mime::VIDEO => MediaCategory::Video,
        Some(mime) if mime.type_() == mime_guess::mime::AUDIO => MediaCategory::Audio,
        _ => MediaCategory::Other,
    }
}

/// MIME type for a file name, `application/octet-stream` when unknown.
pub fn mime_type_for(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(classify_media("IMG_0001.JPG"), MediaCategory::Image);
        assert_eq!(classify_media("clip.MoV"), MediaCategory::Video);
        assert_eq!(classify_media("voice.m4a"), MediaCategory::Audio);
    }

    #[test]
    fn unknown_extension_falls_back_to_mime_registry() {
        assert_eq!(classify_media("favicon.ico"), MediaCategory::Image);
        assert_eq!(classify_media("report.pdf"), MediaCategory::Other);
        assert_eq!(classify_media("README"), MediaCategory::Other);
    }

    #[test]
    fn extension_ignores_query_string() {
        assert_eq!(
            extension_of("https://s3.test/a/photo.PNG?X-Amz-Expires=3600"),
            Some("png".to_string())
        );
        assert_eq!(extension_of(".hidden"), None);
    }

    #[test]
    fn mime_type_defaults_to_octet_stream() {
        assert_eq!(mime_type_for("a.pdf"), "application/pdf");
        assert_eq!(mime_type_for("blob"), "application/octet-stream");
    }

    #[test]
    fn categories_map_to_storage_folders() {
        assert_eq!(MediaCategory::Audio.folder_name(), "audio");
        assert_eq!(MediaCategory::Other.folder_name(), "others");
    }
}
