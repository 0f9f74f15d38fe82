// src/resolve.rs
//! Turns attachments into resolved attachments with durable URLs.

use crate::classify::TemporaryUrlPolicy;
use crate::error::{ResolutionError, ResolutionFailure};
use crate::model::{Attachment, ResolvedAttachment, SourceKind};
use crate::storage::{FileFetcher, ObjectStore};
use std::sync::Arc;

/// Re-hosts time-limited files and passes durable links through untouched.
#[derive(Clone)]
pub struct Resolver {
    fetcher: Arc<dyn FileFetcher>,
    store: Option<Arc<dyn ObjectStore>>,
    policy: TemporaryUrlPolicy,
}

impl Resolver {
    pub fn new(
        fetcher: Arc<dyn FileFetcher>,
        store: Option<Arc<dyn ObjectStore>>,
        policy: TemporaryUrlPolicy,
    ) -> Self {
        Self {
            fetcher,
            store,
            policy,
        }
    }

    pub fn has_object_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn object_store(&self) -> Option<&Arc<dyn ObjectStore>> {
        self.store.as_ref()
    }

    /// Whether resolving this attachment would touch the network.
    pub fn needs_rehosting(&self, attachment: &Attachment) -> bool {
        attachment.source_kind() == SourceKind::InternallyHosted
            && self.policy.is_time_limited(attachment.source_url())
    }

    /// Produces a durable URL for the attachment.
    ///
    /// The result never carries a time-limited URL: when re-hosting is needed
    /// and impossible, the attachment is reported as unresolvable instead.
    pub async fn resolve(
        &self,
        attachment: &Attachment,
    ) -> Result<ResolvedAttachment, ResolutionError> {
        if !self.needs_rehosting(attachment) {
            log::debug!("'{}' is durable as-is", attachment.name());
            return Ok(ResolvedAttachment::external_link(attachment.clone()));
        }

        let Some(store) = &self.store else {
            return Err(ResolutionError::new(
                attachment,
                ResolutionFailure::NoObjectStore,
            ));
        };

        log::info!("Re-hosting '{}'", attachment.name());
        let bytes = self
            .fetcher
            .fetch(attachment.source_url())
            .await
            .map_err(|e| {
                ResolutionError::new(attachment, ResolutionFailure::Download(e.to_string()))
            })?;
        log::debug!("Downloaded {} bytes for '{}'", bytes.len(), attachment.name());

        let stored = store
            .upload(
                bytes,
                attachment.name(),
                &attachment.mime_type(),
                attachment.media_category(),
            )
            .await
            .map_err(|e| {
                ResolutionError::new(attachment, ResolutionFailure::Upload(e.to_string()))
            })?;

        if stored.embed_url.trim().is_empty() {
            if let Err(e) = store.delete(&stored.object_id).await {
                log::warn!("Could not remove unusable object {}: {}", stored.object_id, e);
            }
            return Err(ResolutionError::new(
                attachment,
                ResolutionFailure::EmptyEmbedUrl,
            ));
        }

        Ok(ResolvedAttachment::remote_object(
            attachment.clone(),
            stored.object_id,
            stored.embed_url,
        ))
    }

    /// Resolves attachments one at a time, in order. Failures are collected,
    /// not raised, so one bad file never hides the others.
    pub async fn resolve_all(&self, attachments: &[Attachment]) -> ResolvedSet {
        let mut set = ResolvedSet::default();
        for attachment in attachments {
            match self.resolve(attachment).await {
                Ok(resolved) => set.resolved.push(resolved),
                Err(e) => {
                    log::warn!("{}", e);
                    set.failures.push(e);
                }
            }
        }
        set
    }

    /// Best-effort removal of objects uploaded for a write that then failed.
    pub async fn discard(&self, resolved: &[ResolvedAttachment]) {
        let ids: Vec<&str> = resolved
            .iter()
            .filter_map(ResolvedAttachment::remote_object_id)
            .collect();
        self.release(&ids).await;
    }

    /// The stored object an embed URL points at, when the configured store
    /// handed it out.
    pub fn stored_object_for_url(&self, url: &str) -> Option<String> {
        self.store.as_ref()?.object_id_for_url(url)
    }

    /// Best-effort removal of objects nothing refers to any more. Returns
    /// how many were removed.
    pub async fn release(&self, object_ids: &[&str]) -> usize {
        let Some(store) = &self.store else {
            return 0;
        };
        let mut removed = 0;
        for object_id in object_ids {
            match store.delete(object_id).await {
                Ok(()) => {
                    log::info!("Removed orphaned object {}", object_id);
                    removed += 1;
                }
                Err(e) => log::warn!("Could not remove orphaned object {}: {}", object_id, e),
            }
        }
        removed
    }
}

/// Outcome of resolving a row's attachments.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    /// Successfully resolved attachments, in row order.
    pub resolved: Vec<ResolvedAttachment>,
    pub failures: Vec<ResolutionError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MediaCategory;
    use crate::error::AppError;
    use crate::model::DurableKind;
    use crate::storage::StoredObject;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    const SIGNED: &str =
        "https://prod-files-secure.s3.us-west-2.amazonaws.com/ws/clip.mov?X-Amz-Expires=3600";

    #[derive(Default)]
    struct CountingFetcher {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl FileFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
            self.calls.lock().push(url.to_string());
            if self.fail {
                Err(AppError::MalformedResponse("connection reset".to_string()))
            } else {
                Ok(vec![1, 2, 3])
            }
        }
    }

    struct StubStore {
        embed_url: String,
        uploads: Mutex<Vec<(String, MediaCategory)>>,
    }

    #[async_trait::async_trait]
    impl ObjectStore for StubStore {
        async fn upload(
            &self,
            _bytes: Vec<u8>,
            file_name: &str,
            _mime_type: &str,
            category: MediaCategory,
        ) -> Result<StoredObject, AppError> {
            self.uploads.lock().push((file_name.to_string(), category));
            Ok(StoredObject {
                object_id: "obj-1".to_string(),
                embed_url: self.embed_url.clone(),
            })
        }

        async fn delete(&self, _object_id: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn store(embed_url: &str) -> Arc<StubStore> {
        Arc::new(StubStore {
            embed_url: embed_url.to_string(),
            uploads: Mutex::new(Vec::new()),
        })
    }

    fn internal(url: &str) -> Attachment {
        Attachment::new("clip.mov", url, SourceKind::InternallyHosted, None).unwrap()
    }

    #[tokio::test]
    async fn external_links_pass_through_without_network() {
        let fetcher = Arc::new(CountingFetcher::default());
        let resolver = Resolver::new(fetcher.clone(), None, TemporaryUrlPolicy::default());
        let attachment =
            Attachment::new("talk", "https://youtu.be/x", SourceKind::ExternallyHosted, None)
                .unwrap();

        let resolved = resolver.resolve(&attachment).await.unwrap();
        assert_eq!(resolved.durable_url(), "https://youtu.be/x");
        assert_eq!(resolved.durable_kind(), &DurableKind::ExternalLink);
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn durable_internal_urls_pass_through() {
        let fetcher = Arc::new(CountingFetcher::default());
        let resolver = Resolver::new(fetcher.clone(), None, TemporaryUrlPolicy::default());
        let url = "https://prod-files-secure.s3.us-west-2.amazonaws.com/ws/clip.mov";

        let resolved = resolver.resolve(&internal(url)).await.unwrap();
        assert_eq!(resolved.durable_url(), url);
        assert!(fetcher.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn time_limited_urls_are_rehosted() {
        let fetcher = Arc::new(CountingFetcher::default());
        let store = store("https://drive.google.com/file/d/obj-1/preview");
        let resolver = Resolver::new(
            fetcher.clone(),
            Some(store.clone()),
            TemporaryUrlPolicy::default(),
        );

        let resolved = resolver.resolve(&internal(SIGNED)).await.unwrap();
        assert_eq!(
            resolved.durable_url(),
            "https://drive.google.com/file/d/obj-1/preview"
        );
        assert_eq!(resolved.remote_object_id(), Some("obj-1"));
        assert_eq!(*fetcher.calls.lock(), vec![SIGNED.to_string()]);
        assert_eq!(
            *store.uploads.lock(),
            vec![("clip.mov".to_string(), MediaCategory::Video)]
        );
    }

    #[tokio::test]
    async fn missing_store_is_a_resolution_error() {
        let resolver = Resolver::new(
            Arc::new(CountingFetcher::default()),
            None,
            TemporaryUrlPolicy::default(),
        );
        let err = resolver.resolve(&internal(SIGNED)).await.unwrap_err();
        assert_eq!(err.reason, ResolutionFailure::NoObjectStore);
    }

    #[tokio::test]
    async fn download_failure_is_reported() {
        let fetcher = Arc::new(CountingFetcher {
            fail: true,
            ..Default::default()
        });
        let resolver = Resolver::new(
            fetcher,
            Some(store("https://x.test/a")),
            TemporaryUrlPolicy::default(),
        );
        let err = resolver.resolve(&internal(SIGNED)).await.unwrap_err();
        assert!(matches!(err.reason, ResolutionFailure::Download(_)));
    }

    #[tokio::test]
    async fn resolve_all_keeps_order_and_collects_failures() {
        let resolver = Resolver::new(
            Arc::new(CountingFetcher::default()),
            None,
            TemporaryUrlPolicy::default(),
        );
        let first =
            Attachment::new("a.png", "https://x.test/a.png", SourceKind::ExternallyHosted, None)
                .unwrap();
        let last =
            Attachment::new("c.png", "https://x.test/c.png", SourceKind::ExternallyHosted, None)
                .unwrap();

        let set = resolver
            .resolve_all(&[first, internal(SIGNED), last])
            .await;
        let names: Vec<_> = set
            .resolved
            .iter()
            .map(|r| r.attachment().name().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert_eq!(set.failures.len(), 1);
        assert_eq!(set.failures[0].attachment.name(), "clip.mov");
    }

    #[tokio::test]
    async fn empty_embed_url_is_rejected() {
        let resolver = Resolver::new(
            Arc::new(CountingFetcher::default()),
            Some(store("")),
            TemporaryUrlPolicy::default(),
        );
        let err = resolver.resolve(&internal(SIGNED)).await.unwrap_err();
        assert_eq!(err.reason, ResolutionFailure::EmptyEmbedUrl);
        assert_eq!(err.attachment.name(), "clip.mov");
    }
}
