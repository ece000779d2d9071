//! Canonical cache key derivation.
//!
//! `CacheKey` has a private field, so a key can only come from one of the
//! per-kind constructors below. Every read and every invalidation of an
//! entity goes through the same constructor and lands on the same string.

use std::fmt;

use sprint_core::{EntityKind, EventId, FileId, PaymentId, RegistrationId, UsageTag};

const FILE_NS: &str = "file";
const EVENT_NS: &str = "Event";
const GALLERY_NS: &str = "Gallery";
const REGISTRATION_NS: &str = "Registration";
const PAYMENT_NS: &str = "Payment";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: String,
}

impl CacheKey {
    fn build(namespace: &str, suffix: impl fmt::Display) -> Self {
        Self {
            inner: format!("{}:{}", namespace, suffix),
        }
    }

    /// `file:<id>`
    pub fn file(id: FileId) -> Self {
        Self::build(FILE_NS, id)
    }

    /// `file:usage:<Tag>`, the listing of files carrying a usage tag.
    pub fn files_by_usage(tag: UsageTag) -> Self {
        Self::build(FILE_NS, format!("usage:{}", tag.as_db_str()))
    }

    /// `Event:<id>`
    pub fn event(id: EventId) -> Self {
        Self::build(EVENT_NS, id)
    }

    /// `Event:Events`, the aggregate event listing.
    pub fn events() -> Self {
        Self::build(EVENT_NS, "Events")
    }

    /// `Gallery:Gallery`, the aggregate gallery listing.
    pub fn gallery() -> Self {
        Self::build(GALLERY_NS, "Gallery")
    }

    /// `Registration:<id>`
    pub fn registration(id: RegistrationId) -> Self {
        Self::build(REGISTRATION_NS, id)
    }

    /// `Payment:<id>`
    pub fn payment(id: PaymentId) -> Self {
        Self::build(PAYMENT_NS, id)
    }

    /// Aggregate keys whose content depends on files with `tag`.
    pub fn aggregates_for_usage(tag: UsageTag) -> Vec<CacheKey> {
        let mut keys = vec![Self::files_by_usage(tag)];
        if tag == UsageTag::Gallery {
            keys.push(Self::gallery());
        }
        keys
    }

    /// Prefix covering every key of an entity kind, for
    /// [`ReadThroughCache::invalidate_prefix`](super::ReadThroughCache::invalidate_prefix).
    pub fn kind_prefix(kind: EntityKind) -> String {
        let ns = match kind {
            EntityKind::File => FILE_NS,
            EntityKind::Event => EVENT_NS,
            EntityKind::GalleryItem => GALLERY_NS,
            EntityKind::Registration => REGISTRATION_NS,
            EntityKind::Payment => PAYMENT_NS,
        };
        format!("{}:", ns)
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.inner.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}
