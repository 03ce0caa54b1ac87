// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

use serde::Serialize;
use std::collections::BTreeMap;

use crate::directory::Directory;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    #[serde(rename = "AWS Account ID")]
    pub account_id: String,
    /// First alias of the account; `None` when no alias is set.
    #[serde(rename = "AWS Account Alias")]
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    #[serde(rename = "SummaryMap")]
    pub summary_map: BTreeMap<String, i32>,
}

pub async fn fetch_account_info<D>(directory: &D) -> Result<AccountInfo>
where
    D: Directory + ?Sized,
{
    let (account_id, aliases) =
        futures::try_join!(directory.caller_account_id(), directory.list_account_aliases())?;

    Ok(AccountInfo {
        account_id,
        alias: aliases.into_iter().next(),
    })
}

pub async fn fetch_account_summary<D>(directory: &D) -> Result<AccountSummary>
where
    D: Directory + ?Sized,
{
    Ok(AccountSummary {
        summary_map: directory.account_summary().await?,
    })
}
