// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

//! The identity directory: IAM users, their access keys and account
//! metadata.
//!
//! [`Directory`] is the seam the evaluator and the HTTP handlers depend on.
//! [`IamDirectory`] is the production implementation backed by the AWS SDK;
//! every listing it returns has upstream pagination fully drained, since a
//! partial listing would silently under-report expired keys.

use async_trait::async_trait;
use aws_sdk_iam::model::{AccessKeyMetadata, StatusType};
use aws_sdk_iam::Client as IamClient;
use aws_sdk_sts::Client as StsClient;
use aws_types::SdkConfig;
use futures::TryStreamExt;
use serde::Serialize;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::date_format;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyStatus {
    Active,
    Inactive,
}

/// Metadata of one access key, as listed for its owning user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessKey {
    pub user_name: String,
    pub access_key_id: String,
    pub status: KeyStatus,
    #[serde(with = "date_format")]
    pub create_date: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub user_name: String,
    pub user_id: Option<String>,
    pub arn: Option<String>,
    pub path: Option<String>,
    #[serde(with = "date_format::option")]
    pub create_date: Option<OffsetDateTime>,
    #[serde(with = "date_format::option")]
    pub password_last_used: Option<OffsetDateTime>,
}

impl User {
    pub fn named(user_name: impl Into<String>) -> Self {
        User {
            user_name: user_name.into(),
            user_id: None,
            arn: None,
            path: None,
            create_date: None,
            password_last_used: None,
        }
    }
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// All IAM users in the account.
    async fn list_users(&self) -> Result<Vec<User>>;

    /// All access keys owned by `user_name`.
    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>>;

    async fn get_user(&self, user_name: &str) -> Result<User>;

    /// Account id of the identity whose credentials the directory uses.
    async fn caller_account_id(&self) -> Result<String>;

    async fn list_account_aliases(&self) -> Result<Vec<String>>;

    /// Account-wide usage counters, keyed by the IAM summary key name.
    async fn account_summary(&self) -> Result<BTreeMap<String, i32>>;
}

#[derive(Debug, Clone)]
pub struct IamDirectory {
    iam: IamClient,
    sts: StsClient,
}

impl IamDirectory {
    pub fn new(shared_config: &SdkConfig) -> Self {
        IamDirectory {
            iam: IamClient::new(shared_config),
            sts: StsClient::new(shared_config),
        }
    }
}

#[async_trait]
impl Directory for IamDirectory {
    async fn list_users(&self) -> Result<Vec<User>> {
        let users = self
            .iam
            .list_users()
            .into_paginator()
            .items()
            .send()
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| Error::from_sdk("ListUsers", None, e))?;

        users.into_iter().map(|u| convert_user("ListUsers", u)).collect()
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>> {
        let keys = self
            .iam
            .list_access_keys()
            .user_name(user_name)
            .into_paginator()
            .items()
            .send()
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| Error::from_sdk("ListAccessKeys", Some(user_name), e))?;

        keys.into_iter()
            .map(|k| convert_access_key(user_name, k))
            .collect()
    }

    async fn get_user(&self, user_name: &str) -> Result<User> {
        let output = self
            .iam
            .get_user()
            .user_name(user_name)
            .send()
            .await
            .map_err(|e| Error::from_sdk("GetUser", Some(user_name), e))?;

        let user = output
            .user
            .ok_or_else(|| Error::malformed("GetUser", "response carried no user"))?;
        convert_user("GetUser", user)
    }

    async fn caller_account_id(&self) -> Result<String> {
        let output = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| Error::from_sdk("GetCallerIdentity", None, e))?;

        output
            .account
            .ok_or_else(|| Error::malformed("GetCallerIdentity", "response carried no account"))
    }

    async fn list_account_aliases(&self) -> Result<Vec<String>> {
        self.iam
            .list_account_aliases()
            .into_paginator()
            .items()
            .send()
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| Error::from_sdk("ListAccountAliases", None, e))
    }

    async fn account_summary(&self) -> Result<BTreeMap<String, i32>> {
        let output = self
            .iam
            .get_account_summary()
            .send()
            .await
            .map_err(|e| Error::from_sdk("GetAccountSummary", None, e))?;

        Ok(output
            .summary_map
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| (k.as_str().to_string(), v))
            .collect())
    }
}

fn convert_user(operation: &'static str, u: aws_sdk_iam::model::User) -> Result<User> {
    let user_name = u
        .user_name
        .ok_or_else(|| Error::malformed(operation, "user without a name"))?;
    let create_date = u
        .create_date
        .as_ref()
        .map(|d| date_format::from_aws(operation, d))
        .transpose()?;
    let password_last_used = u
        .password_last_used
        .as_ref()
        .map(|d| date_format::from_aws(operation, d))
        .transpose()?;

    Ok(User {
        user_name,
        user_id: u.user_id,
        arn: u.arn,
        path: u.path,
        create_date,
        password_last_used,
    })
}

fn convert_access_key(user_name: &str, k: AccessKeyMetadata) -> Result<AccessKey> {
    const OPERATION: &str = "ListAccessKeys";

    let access_key_id = k
        .access_key_id
        .ok_or_else(|| Error::malformed(OPERATION, format!("key of {user_name} without an id")))?;
    let status = match k.status {
        Some(StatusType::Active) => KeyStatus::Active,
        Some(StatusType::Inactive) => KeyStatus::Inactive,
        other => {
            return Err(Error::malformed(
                OPERATION,
                format!("key {access_key_id} has unexpected status {other:?}"),
            ))
        }
    };
    let create_date = k.create_date.as_ref().ok_or_else(|| {
        Error::malformed(OPERATION, format!("key {access_key_id} has no creation date"))
    })?;

    Ok(AccessKey {
        // The listing is already scoped to `user_name`; fall back to it when
        // the record omits the owner.
        user_name: k.user_name.unwrap_or_else(|| user_name.to_string()),
        access_key_id,
        status,
        create_date: date_format::from_aws(OPERATION, create_date)?,
    })
}
