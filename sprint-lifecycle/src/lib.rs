//! Sprint Lifecycle - domain operations over the consistency core.
//!
//! - [`files`]: upload, attach/detach, delete and sweep of uploaded files
//! - [`payments`]: the payment state machine and external callbacks
//! - [`team_id`]: sequential team id allocation
//! - [`events`], [`gallery`], [`registrations`]: the owners of files and
//!   payments
//!
//! Every component reads through the shared [`ReadThroughCache`] and
//! invalidates after its store writes commit.
//!
//! [`ReadThroughCache`]: sprint_storage::ReadThroughCache

pub mod events;
mod fetchers;
pub mod files;
pub mod gallery;
pub mod locks;
pub mod mail;
pub mod payments;
pub mod registrations;
pub mod services;
pub mod team_id;

pub use events::{EventCatalog, NewEvent};
pub use files::{
    AttachReport, DeleteOutcome, FileLifecycle, ReclaimOutcome, SweepPolicy, SweepReport,
    UploadRequest,
};
pub use gallery::{Gallery, GalleryEntry, NewGalleryItem};
pub use locks::KeyedLocks;
pub use mail::{LogMailer, Mail, MailSender};
pub use payments::{CallbackOutcome, NewPayment, PaymentMachine, TransitionOutcome};
pub use registrations::{NewRegistration, RegistrationDesk};
pub use services::Services;
pub use team_id::{TeamIdAllocator, TEAM_ID_COUNTER};
