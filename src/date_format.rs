// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use aws_sdk_iam::types::DateTime;
use serde::{self, Serializer};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::error::{Error, Result};

/// Converts an SDK timestamp into a UTC `OffsetDateTime`.
pub(crate) fn from_aws(operation: &'static str, date: &DateTime) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(date.as_nanos())
        .map_err(|e| Error::malformed(operation, format!("timestamp out of range: {e}")))
}

pub fn serialize<S>(date: &OffsetDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.format(&Rfc3339).map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

pub mod option {
    use serde::Serializer;
    use time::OffsetDateTime;

    pub fn serialize<S>(
        date: &Option<OffsetDateTime>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match *date {
            None => serializer.serialize_none(),
            Some(ref date) => super::serialize(date, serializer),
        }
    }
}
