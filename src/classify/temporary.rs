use crate::constants::{TEMPORARY_EXPIRY_MARKERS, TEMPORARY_HOST_MARKER};

/// Decides whether a URL is a signed, time-limited link.
///
/// A URL is time-limited when it contains one of the host markers and one of
/// the expiry markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryUrlPolicy {
    host_markers: Vec<String>,
    expiry_markers: Vec<String>,
}

impl Default for TemporaryUrlPolicy {
    fn default() -> Self {
        Self {
            host_markers: vec![TEMPORARY_HOST_MARKER.to_string()],
            expiry_markers: TEMPORARY_EXPIRY_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl TemporaryUrlPolicy {
    /// Empty marker lists fall back to the defaults.
    pub fn new(host_markers: Vec<String>, expiry_markers: Vec<String>) -> Self {
        let defaults = Self::default();
        Self {
            host_markers: if host_markers.is_empty() {
                defaults.host_markers
            } else {
                host_markers
            },
            expiry_markers: if expiry_markers.is_empty() {
                defaults.expiry_markers
            } else {
                expiry_markers
            },
        }
    }

    pub fn is_time_limited(&self, url: &str) -> bool {
        self.host_markers.iter().any(|m| url.contains(m.as_str()))
            && self.expiry_markers.iter().any(|m| url.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_s3_urls_are_time_limited() {
        let policy = TemporaryUrlPolicy::default();
        assert!(policy.is_time_limited(
            "https://prod-files-secure.s3.us-west-2.amazonaws.com/x/a.png?X-Amz-Expires=3600&X-Amz-Signature=abc"
        ));
        assert!(!policy
            .is_time_limited("https://prod-files-secure.s3.us-west-2.amazonaws.com/x/a.png"));
        assert!(!policy.is_time_limited("https://cdn.test/a.png?X-Amz-Expires=3600"));
    }

    #[test]
    fn markers_are_configurable() {
        let policy =
            TemporaryUrlPolicy::new(vec!["files.test".to_string()], vec!["sig=".to_string()]);
        assert!(policy.is_time_limited("https://files.test/a?sig=1"));
        assert!(!policy.is_time_limited(
            "https://prod-files-secure.s3.amazonaws.com/a?X-Amz-Expires=1"
        ));
    }

    #[test]
    fn empty_lists_use_defaults() {
        assert_eq!(
            TemporaryUrlPolicy::new(vec![], vec![]),
            TemporaryUrlPolicy::default()
        );
    }
}
