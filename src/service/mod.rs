//! Application services.
//!
//! Services take opaque tokens for every resource path parameter and the
//! numeric identity of the authenticated caller (or
//! [`UserId::ANONYMOUS`](crate::models::UserId::ANONYMOUS)).
//! They own every access rule and map each lower-level failure to a
//! [`ServiceError`](crate::error::ServiceError) kind.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::ids::IdMasker;
use crate::repository::RepositoryError;
use crate::storage::{MediaStorage, StorageError};

mod journeys;
mod users;

#[cfg(test)]
mod journeys_tests;

pub use journeys::JourneyService;
pub use users::UserService;

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateJourneyRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckpointRequest {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub note: String,
    /// RFC-3339 override; absent or unparseable means "now".
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Offset pagination for the public feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    limit: u32,
}

impl Page {
    /// `page` is floored at 1. `limit` defaults to 10 when absent or below 1
    /// and is capped at 50.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .map_or(1, |p| u32::try_from(p).unwrap_or(u32::MAX));
        let limit = match limit {
            Some(l) if l > i64::from(MAX_PAGE_LIMIT) => MAX_PAGE_LIMIT,
            Some(l) if l >= 1 => l as u32,
            _ => DEFAULT_PAGE_LIMIT,
        };
        Self { page, limit }
    }

    pub const fn page(&self) -> u32 {
        self.page
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Parses a client-supplied RFC-3339 timestamp. Anything absent or
/// unparseable is replaced by `now` instead of being rejected.
pub(crate) fn lenient_timestamp(raw: Option<&str>, now: DateTime<Utc>) -> DateTime<Utc> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => now,
        Some(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                warn!("Unparseable timestamp '{}' ({}), using now", s, e);
                now
            }
        },
    }
}

pub(crate) fn unmask(ids: &IdMasker, token: &str, what: &str) -> ServiceResult<u64> {
    ids.unmask(token)
        .map_err(|e| ServiceError::bad_request(format!("Invalid {what} ID")).with_source(e))
}

/// Logs a persistence failure and hides it behind an internal error.
pub(crate) fn storage_failure(message: &'static str) -> impl FnOnce(RepositoryError) -> ServiceError {
    move |err| {
        error!("{}: {}", message, err);
        ServiceError::internal(message).with_source(err)
    }
}

pub(crate) fn file_failure(err: StorageError) -> ServiceError {
    match err {
        StorageError::InvalidFilename(_) => {
            ServiceError::bad_request("Invalid file name").with_source(err)
        }
        StorageError::NameTaken(_) => {
            ServiceError::conflict("File name already in use").with_source(err)
        }
        other => {
            error!("Failed to store file: {}", other);
            ServiceError::internal("Failed to save file").with_source(other)
        }
    }
}

/// Removes a file whose row could not be recorded.
pub(crate) async fn discard_upload(storage: &dyn MediaStorage, key: &str) {
    match storage.delete(key).await {
        Ok(()) => warn!("Discarded unrecorded upload {}", key),
        Err(e) => warn!("Stored file {} is orphaned: {}", key, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case(None, None, 1, 10)]
    #[case(Some(0), Some(1000), 1, 50)]
    #[case(Some(-3), Some(0), 1, 10)]
    #[case(Some(3), Some(-1), 3, 10)]
    #[case(Some(2), Some(50), 2, 50)]
    #[case(Some(4), Some(1), 4, 1)]
    fn page_clamping(
        #[case] page: Option<i64>,
        #[case] limit: Option<i64>,
        #[case] want_page: u32,
        #[case] want_limit: u32,
    ) {
        let p = Page::new(page, limit);
        assert_eq!((p.page(), p.limit()), (want_page, want_limit));
    }

    #[test]
    fn offset_is_page_minus_one_times_limit() {
        assert_eq!(Page::new(Some(3), Some(20)).offset(), 40);
        assert_eq!(Page::default().offset(), 0);
        assert_eq!(
            Page::new(Some(i64::MAX), Some(50)).offset(),
            u64::from(u32::MAX - 1) * 50
        );
    }

    #[test]
    fn timestamps_parse_or_fall_back() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            lenient_timestamp(Some("2024-06-01T10:30:00+02:00"), now),
            Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap()
        );
        assert_eq!(lenient_timestamp(None, now), now);
        assert_eq!(lenient_timestamp(Some(""), now), now);
        assert_eq!(lenient_timestamp(Some("yesterday"), now), now);
        assert_eq!(lenient_timestamp(Some("2024-06-01 10:30:00"), now), now);
    }
}
