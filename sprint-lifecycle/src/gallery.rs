//! Gallery entries, each pointing at one photo file.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sprint_core::{
    EntityKind, FileId, GalleryItem, GalleryItemId, SprintError, SprintResult, UsageTag,
};
use sprint_storage::{AsyncStore, CacheKey, ReadThroughCache, StorageFetcher};

use crate::files::FileLifecycle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewGalleryItem {
    pub photo: FileId,
    #[serde(default)]
    pub alt: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: String,
}

/// A gallery item joined with its photo's URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GalleryEntry {
    #[serde(flatten)]
    pub item: GalleryItem,
    /// `None` if the photo record has since been deleted.
    pub photo_url: Option<String>,
}

struct GalleryFetcher {
    store: Arc<dyn AsyncStore>,
}

#[async_trait]
impl StorageFetcher<Vec<GalleryEntry>> for GalleryFetcher {
    async fn fetch(&self) -> SprintResult<Option<Vec<GalleryEntry>>> {
        let items = self.store.gallery_list().await?;
        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let photo_url = self
                .store
                .file_get(item.photo)
                .await?
                .filter(|f| !f.is_deleted)
                .map(|f| f.url);
            entries.push(GalleryEntry { item, photo_url });
        }
        Ok(Some(entries))
    }
}

#[derive(Clone)]
pub struct Gallery {
    store: Arc<dyn AsyncStore>,
    cache: ReadThroughCache,
    files: FileLifecycle,
}

impl Gallery {
    pub fn new(store: Arc<dyn AsyncStore>, cache: ReadThroughCache, files: FileLifecycle) -> Self {
        Self {
            store,
            cache,
            files,
        }
    }

    pub async fn create(&self, new: NewGalleryItem) -> SprintResult<GalleryItem> {
        match self.store.file_get(new.photo).await? {
            Some(file) if !file.is_deleted => {}
            _ => return Err(SprintError::not_found(EntityKind::File, new.photo)),
        }

        let now = Utc::now();
        let item = GalleryItem {
            item_id: GalleryItemId::new(),
            photo: new.photo,
            alt: new.alt,
            description: new.description,
            kind: new.kind,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.store.gallery_insert(&item).await?;
        self.cache.invalidate(&CacheKey::gallery()).await;

        self.files
            .reassign(&[], &[item.photo], UsageTag::Gallery)
            .await;

        tracing::info!(item_id = %item.item_id, photo = %item.photo, "Gallery item created");
        Ok(item)
    }

    pub async fn list(&self) -> SprintResult<Vec<GalleryEntry>> {
        let fetcher = GalleryFetcher {
            store: Arc::clone(&self.store),
        };
        Ok(self
            .cache
            .get_or_fetch(&CacheKey::gallery(), &fetcher)
            .await?
            .map(|read| read.into_value())
            .unwrap_or_default())
    }

    /// Soft delete. The photo is released.
    pub async fn delete(&self, id: GalleryItemId) -> SprintResult<GalleryItem> {
        let mut item = self
            .store
            .gallery_get(id)
            .await?
            .filter(|i| !i.is_deleted)
            .ok_or_else(|| SprintError::not_found(EntityKind::GalleryItem, id))?;

        item.is_deleted = true;
        item.updated_at = Utc::now();
        self.store.gallery_update(&item).await?;
        self.cache.invalidate(&CacheKey::gallery()).await;

        self.files
            .reassign(&[item.photo], &[], UsageTag::Unassigned)
            .await;

        tracing::info!(item_id = %id, "Gallery item deleted");
        Ok(item)
    }
}
