//! OpenAPI Specification for the TechSprint API
//!
//! Generated by utoipa from the route annotations and the domain types.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::cache::FlushResponse;
use crate::routes::events::{ReplacePhotosRequest, SetRuleBookRequest};
use crate::routes::health::{ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::payments::StatusRequest;
use crate::routes::registrations::{CallbackRequest, FilterRequest, RegistrationPage};
use crate::routes::{cache, events, files, gallery, health, payments, registrations};
use crate::telemetry::metrics;

use sprint_core::{
    EntityKind, EventId, EventRecord, FileId, FileRecord, GalleryItem, GalleryItemId, Location,
    Participants, PaymentId, PaymentMethod, PaymentRecord, PaymentSnapshot, PaymentStatus,
    RegistrationCharge, RegistrationFilter, RegistrationId, RegistrationRecord, Retention, Shift,
    TeamMember, UsageTag, UserId,
};
use sprint_lifecycle::{
    AttachReport, CallbackOutcome, DeleteOutcome, GalleryEntry, NewEvent, NewGalleryItem,
    NewPayment, NewRegistration, SweepReport, TransitionOutcome,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TechSprint API",
        version = "0.1.0",
        description = "Event listings, uploads, team registrations and payments",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local Development")
    ),
    tags(
        (name = "Files", description = "Uploads, temporary file reclamation and deletion"),
        (name = "Events", description = "Event listings that own photos and rule books"),
        (name = "Gallery", description = "Gallery items that own one photo each"),
        (name = "Registrations", description = "Team registrations and the payment gateway callback"),
        (name = "Payments", description = "Payment records and status transitions"),
        (name = "Cache", description = "Read-through cache administration"),
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        // === File Routes ===
        files::upload_file,
        files::get_file,
        files::delete_file,
        files::list_by_usage,
        files::sweep_files,

        // === Event Routes ===
        events::create_event,
        events::list_events,
        events::get_event,
        events::replace_photos,
        events::set_rule_book,
        events::delete_event,

        // === Gallery Routes ===
        gallery::create_item,
        gallery::list_items,
        gallery::delete_item,

        // === Registration Routes ===
        registrations::create_registration,
        registrations::get_registration,
        registrations::filter_registrations,
        registrations::payment_callback,

        // === Payment Routes ===
        payments::create_payment,
        payments::get_payment,
        payments::update_status,

        // === Cache and Health ===
        cache::flush_kind,
        health::ping,
        health::liveness,
        health::readiness,
        metrics::metrics_handler,
    ),
    components(
        schemas(
            // === Error Types ===
            ApiError, ErrorCode,

            // === Identifiers ===
            FileId, EventId, GalleryItemId, RegistrationId, PaymentId, UserId,

            // === Domain Types ===
            Retention, UsageTag, PaymentMethod, PaymentStatus, Shift, EntityKind,
            FileRecord, EventRecord, Location, RegistrationCharge, Participants,
            GalleryItem, TeamMember, RegistrationRecord, RegistrationFilter,
            PaymentRecord, PaymentSnapshot,

            // === Request Types ===
            NewEvent, NewGalleryItem, NewRegistration, NewPayment,
            ReplacePhotosRequest, SetRuleBookRequest, FilterRequest,
            CallbackRequest, StatusRequest,

            // === Response Types ===
            AttachReport, DeleteOutcome, SweepReport, GalleryEntry,
            TransitionOutcome, CallbackOutcome, RegistrationPage, FlushResponse,
            HealthResponse, HealthStatus, HealthDetails, ComponentHealth
        )
    )
)]
pub struct ApiDoc;
