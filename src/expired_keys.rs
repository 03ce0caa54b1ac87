// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::date_format;
use crate::directory::{AccessKey, Directory, KeyStatus};
use crate::error::{Error, Result};

/// 90 days.
pub const DEFAULT_THRESHOLD_HOURS: i64 = 2160;

const SECONDS_PER_HOUR: i64 = 3600;

/// Age in whole hours at or beyond which an access key is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdHours(i64);

impl ThresholdHours {
    pub fn new(hours: i64) -> Result<Self> {
        if hours < 0 {
            return Err(Error::InvalidThreshold(hours));
        }
        Ok(ThresholdHours(hours))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl Default for ThresholdHours {
    fn default() -> Self {
        ThresholdHours(DEFAULT_THRESHOLD_HOURS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyReport {
    #[serde(rename = "IAM User")]
    pub user_name: String,
    #[serde(rename = "Access Key ID")]
    pub access_key_id: String,
    #[serde(rename = "Access Key Creation Date", with = "date_format")]
    pub create_date: OffsetDateTime,
    #[serde(rename = "Access Key Status")]
    pub status: KeyStatus,
    /// `threshold - elapsed`; zero or negative for every reported key.
    #[serde(rename = "Expired Hours")]
    pub expired_hours: i64,
}

/// Lists every access key in the account that is at least `threshold` hours
/// old, measured against a single `now` taken before the first directory call.
pub async fn fetch_expired_keys<D>(
    directory: &D,
    threshold: ThresholdHours,
    concurrency: usize,
) -> Result<Vec<KeyReport>>
where
    D: Directory + ?Sized,
{
    let now = OffsetDateTime::now_utc();
    fetch_expired_keys_at(directory, threshold, now, concurrency).await
}

/// Same as [`fetch_expired_keys`] with an explicit reference instant.
///
/// Up to `concurrency` key listings run at once, but results are consumed in
/// user order so the report order matches the directory listing. Any
/// directory failure aborts the whole evaluation.
#[tracing::instrument(skip(directory, now))]
pub async fn fetch_expired_keys_at<D>(
    directory: &D,
    threshold: ThresholdHours,
    now: OffsetDateTime,
    concurrency: usize,
) -> Result<Vec<KeyReport>>
where
    D: Directory + ?Sized,
{
    let users = directory.list_users().await?;
    debug!(users = users.len(), "listed users");

    let listings = users
        .iter()
        .map(|u| directory.list_access_keys(&u.user_name))
        .collect::<Vec<_>>();
    let keys_by_user = stream::iter(listings)
        .buffered(concurrency.max(1))
        .try_collect::<Vec<_>>()
        .await?;

    let expired = users
        .iter()
        .zip(keys_by_user)
        .flat_map(|(u, keys)| {
            debug!(user = %u.user_name, keys = keys.len(), "listed access keys");
            keys
        })
        .filter_map(|k| evaluate_key(k, threshold, now))
        .collect::<Vec<_>>();

    info!(expired = expired.len(), "evaluated access keys");
    Ok(expired)
}

/// Whole hours between `created` and `now`, truncated toward zero.
pub fn elapsed_hours(now: OffsetDateTime, created: OffsetDateTime) -> i64 {
    (now - created).whole_seconds() / SECONDS_PER_HOUR
}

fn evaluate_key(
    key: AccessKey,
    threshold: ThresholdHours,
    now: OffsetDateTime,
) -> Option<KeyReport> {
    let elapsed = elapsed_hours(now, key.create_date);
    if elapsed < threshold.get() {
        return None;
    }
    // elapsed >= threshold >= 0, so the difference cannot overflow.
    let remaining = threshold.get() - elapsed;
    Some(KeyReport {
        user_name: key.user_name,
        access_key_id: key.access_key_id,
        create_date: key.create_date,
        status: key.status,
        expired_hours: remaining,
    })
}
