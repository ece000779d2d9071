//! TechSprint Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for ids, enums and status sequences
//! - A recording mail sender
//! - Fixtures for events, registrations and uploads
//! - A fully wired in-memory [`Harness`]

pub use sprint_core::{
    EntityKind, ErrorKind, EventId, EventRecord, FileId, FileRecord, PaymentId, PaymentMethod,
    PaymentRecord, PaymentStatus, RegistrationId, RegistrationRecord, Retention, SprintError,
    SprintResult, TeamMember, Timestamp, UsageTag,
};
pub use sprint_lifecycle::{
    Mail, MailSender, NewEvent, NewPayment, NewRegistration, Services, SweepPolicy,
    UploadRequest,
};
pub use sprint_storage::{
    AsyncStore, CacheConfig, CacheKey, InMemoryObjectStore, InMemoryStore, MemoryCacheBackend,
    ObjectStore, ReadThroughCache,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sprint_core::MailError;
use tokio::sync::Notify;

// ============================================================================
// RECORDING MAILER
// ============================================================================

/// Mail sender that keeps every message and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
    fail: AtomicBool,
    delivered: Notify,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Wait until at least `count` messages were accepted, or `timeout`
    /// passes. Mail is sent from spawned tasks, so tests poll for it.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.delivered.notified();
            if self.sent().len() >= count {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.sent().len() >= count;
            }
        }
    }
}

#[async_trait]
impl MailSender for RecordingMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        if self.fail.load(Ordering::SeqCst) {
            self.delivered.notify_waiters();
            return Err(MailError::SendFailed {
                to: mail.to,
                reason: "simulated relay failure".to_string(),
            });
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        self.delivered.notify_waiters();
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for property-based testing.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<u128>().prop_map(Uuid::from_u128)
    }

    pub fn arb_file_id() -> impl Strategy<Value = FileId> {
        arb_uuid().prop_map(FileId::from_uuid)
    }

    pub fn arb_payment_status() -> impl Strategy<Value = PaymentStatus> {
        prop_oneof![
            Just(PaymentStatus::Pending),
            Just(PaymentStatus::Completed),
            Just(PaymentStatus::Failed),
            Just(PaymentStatus::Refunded),
        ]
    }

    /// A sequence of requested target statuses, valid or not.
    pub fn arb_status_requests(max_len: usize) -> impl Strategy<Value = Vec<PaymentStatus>> {
        prop::collection::vec(arb_payment_status(), 1..=max_len)
    }

    pub fn arb_payment_method() -> impl Strategy<Value = PaymentMethod> {
        prop_oneof![
            Just(PaymentMethod::CreditCard),
            Just(PaymentMethod::DebitCard),
            Just(PaymentMethod::PayPal),
            Just(PaymentMethod::BankTransfer),
            Just(PaymentMethod::Upi),
        ]
    }

    /// Tags an owner can attach a file under.
    pub fn arb_assigned_usage() -> impl Strategy<Value = UsageTag> {
        prop_oneof![
            Just(UsageTag::Gallery),
            Just(UsageTag::RuleBook),
            Just(UsageTag::EventPhotos),
            Just(UsageTag::MediaPhotos),
            Just(UsageTag::Brochure),
        ]
    }

    pub fn arb_team_member() -> impl Strategy<Value = TeamMember> {
        ("[A-Z][a-z]{2,8}", "[0-9]{10}").prop_map(|(name, phone)| TeamMember {
            email: format!("{}@example.com", name.to_lowercase()),
            name,
            phone,
            college: None,
        })
    }

    /// Decimal strings without leading zeros.
    pub fn arb_decimal() -> impl Strategy<Value = String> {
        any::<u64>().prop_map(|n| n.to_string())
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built inputs for common scenarios.

    use super::*;
    use sprint_core::{Location, Participants, RegistrationCharge, Shift};

    pub fn member(name: &str) -> TeamMember {
        TeamMember {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: "9876543210".to_string(),
            college: Some("Institute of Technology".to_string()),
        }
    }

    /// A two-person team, the smallest the default participant bounds allow.
    pub fn team() -> Vec<TeamMember> {
        vec![member("Asha"), member("Rohan")]
    }

    pub fn upload_request(file_name: &str) -> UploadRequest {
        UploadRequest {
            file_name: file_name.to_string(),
            content_type: "image/png".to_string(),
            bytes: vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3],
            owner: None,
        }
    }

    pub fn new_event(photos: Vec<FileId>, rule_book: Option<FileId>) -> NewEvent {
        NewEvent {
            name: "Line Follower".to_string(),
            event_type: "Robotics".to_string(),
            description: "Build a bot that follows the line".to_string(),
            organiser: "Robotics Club".to_string(),
            location: Location {
                landmark: "Main Hall".to_string(),
                city: "Pune".to_string(),
                state: "Maharashtra".to_string(),
                country: "India".to_string(),
            },
            event_date: Utc::now() + chrono::Duration::days(30),
            shift: Shift::Morning,
            photos,
            rule_book,
            registration_charge: RegistrationCharge {
                currency: "INR".to_string(),
                amount: 500,
                is_mandatory: true,
            },
            participants: Participants::default(),
            uploaded_by: None,
        }
    }

    pub fn new_registration(team_name: &str, event_ids: Vec<EventId>) -> NewRegistration {
        NewRegistration {
            team_name: team_name.to_string(),
            team: team(),
            event_ids,
            amount: 500,
        }
    }

    pub fn new_payment(registration_id: RegistrationId) -> NewPayment {
        NewPayment {
            registration_id,
            amount: 500,
            method: PaymentMethod::Upi,
        }
    }

    /// A `Temporary` record created `age` ago, as the sweep would find it.
    pub fn aged_file(age: chrono::Duration) -> FileRecord {
        let created_at = Utc::now() - age;
        let file_id = FileId::new();
        let name = format!("{}-{}.png", created_at.timestamp_millis(), file_id);
        FileRecord {
            file_id,
            url: format!("memory://objects/{}", name),
            storage_handle: name.clone(),
            name,
            content_type: "image/png".to_string(),
            size_bytes: 4,
            owner: None,
            retention: Retention::Temporary,
            usage: UsageTag::Unassigned,
            is_deleted: false,
            created_at,
            updated_at: created_at,
        }
    }
}

// ============================================================================
// HARNESS
// ============================================================================

/// All components wired over in-memory collaborators, with the concrete
/// fakes exposed for fault injection and assertions.
pub struct Harness {
    pub services: Services,
    pub store: Arc<InMemoryStore>,
    pub objects: Arc<InMemoryObjectStore>,
    pub cache_backend: Arc<MemoryCacheBackend>,
    pub mailer: Arc<RecordingMailer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(SweepPolicy::default())
    }

    pub fn with_policy(policy: SweepPolicy) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let cache_backend = Arc::new(MemoryCacheBackend::new());
        let mailer = Arc::new(RecordingMailer::new());
        let cache = ReadThroughCache::new(cache_backend.clone(), CacheConfig::default());
        let services = Services::new(
            store.clone(),
            objects.clone(),
            cache,
            mailer.clone(),
            policy,
        );
        Self {
            services,
            store,
            objects,
            cache_backend,
            mailer,
        }
    }

    pub async fn upload(&self) -> SprintResult<FileRecord> {
        self.services
            .files
            .upload(fixtures::upload_request("photo.png"))
            .await
    }

    /// Insert a `Temporary` file (record and object) created `age` ago.
    pub async fn seed_aged_file(&self, age: chrono::Duration) -> SprintResult<FileRecord> {
        let record = fixtures::aged_file(age);
        self.objects
            .put(&record.storage_handle, &record.content_type, vec![1, 2, 3, 4])
            .await?;
        self.store.file_insert(&record).await?;
        Ok(record)
    }

    pub async fn event(&self, photos: Vec<FileId>) -> SprintResult<EventRecord> {
        self.services
            .events
            .create(fixtures::new_event(photos, None))
            .await
    }

    pub async fn registration(&self, event_ids: Vec<EventId>) -> SprintResult<RegistrationRecord> {
        self.services
            .registrations
            .create(fixtures::new_registration("Circuit Breakers", event_ids))
            .await
    }

    pub async fn pending_payment(
        &self,
        registration_id: RegistrationId,
    ) -> SprintResult<PaymentRecord> {
        self.services
            .payments
            .create_payment(fixtures::new_payment(registration_id))
            .await
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
