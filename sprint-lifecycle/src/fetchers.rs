//! Store fetchers handed to the read-through cache on a miss.

use std::sync::Arc;

use async_trait::async_trait;
use sprint_core::{
    EventId, EventRecord, FileId, FileRecord, PaymentId, PaymentRecord, SprintResult, UsageTag,
};
use sprint_storage::{AsyncStore, StorageFetcher};

pub(crate) struct FileFetcher {
    pub store: Arc<dyn AsyncStore>,
    pub id: FileId,
}

#[async_trait]
impl StorageFetcher<FileRecord> for FileFetcher {
    async fn fetch(&self) -> SprintResult<Option<FileRecord>> {
        Ok(self
            .store
            .file_get(self.id)
            .await?
            .filter(|f| !f.is_deleted))
    }
}

pub(crate) struct FilesByUsageFetcher {
    pub store: Arc<dyn AsyncStore>,
    pub usage: UsageTag,
}

#[async_trait]
impl StorageFetcher<Vec<FileRecord>> for FilesByUsageFetcher {
    async fn fetch(&self) -> SprintResult<Option<Vec<FileRecord>>> {
        self.store.file_list_by_usage(self.usage).await.map(Some)
    }
}

pub(crate) struct EventFetcher {
    pub store: Arc<dyn AsyncStore>,
    pub id: EventId,
}

#[async_trait]
impl StorageFetcher<EventRecord> for EventFetcher {
    async fn fetch(&self) -> SprintResult<Option<EventRecord>> {
        Ok(self
            .store
            .event_get(self.id)
            .await?
            .filter(|e| !e.is_deleted))
    }
}

pub(crate) struct EventListFetcher {
    pub store: Arc<dyn AsyncStore>,
}

#[async_trait]
impl StorageFetcher<Vec<EventRecord>> for EventListFetcher {
    async fn fetch(&self) -> SprintResult<Option<Vec<EventRecord>>> {
        self.store.event_list().await.map(Some)
    }
}

pub(crate) struct PaymentFetcher {
    pub store: Arc<dyn AsyncStore>,
    pub id: PaymentId,
}

#[async_trait]
impl StorageFetcher<PaymentRecord> for PaymentFetcher {
    async fn fetch(&self) -> SprintResult<Option<PaymentRecord>> {
        self.store.payment_get(self.id).await
    }
}
