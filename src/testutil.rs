// Copyright (c) 2022 Tomohide Takao
//
// This software is released under the MIT License.
// https://opensource.org/licenses/MIT

//! In-memory [`Directory`] for tests.
//!
//! Enabled under `cfg(test)` or with the `testutil` feature. Users are
//! listed in insertion order, and failures can be injected per operation.

use async_trait::async_trait;
use std::collections::BTreeMap;
use time::OffsetDateTime;

use crate::directory::{AccessKey, Directory, KeyStatus, User};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: Vec<(User, Vec<AccessKey>)>,
    account_id: String,
    aliases: Vec<String>,
    summary: BTreeMap<String, i32>,
    list_users_error: Option<Error>,
    access_key_errors: BTreeMap<String, Error>,
    account_error: Option<Error>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        StaticDirectory {
            account_id: "123456789012".to_string(),
            ..Default::default()
        }
    }

    /// Adds a user owning `keys`, given as `(access key id, status, created)`.
    pub fn with_user(
        mut self,
        user_name: &str,
        keys: &[(&str, KeyStatus, OffsetDateTime)],
    ) -> Self {
        let keys = keys
            .iter()
            .map(|(id, status, created)| AccessKey {
                user_name: user_name.to_string(),
                access_key_id: id.to_string(),
                status: *status,
                create_date: *created,
            })
            .collect();
        self.users.push((User::named(user_name), keys));
        self
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_summary(mut self, entries: &[(&str, i32)]) -> Self {
        self.summary = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self
    }

    pub fn failing_list_users(mut self, err: Error) -> Self {
        self.list_users_error = Some(err);
        self
    }

    pub fn failing_access_keys(mut self, user_name: &str, err: Error) -> Self {
        self.access_key_errors.insert(user_name.to_string(), err);
        self
    }

    /// Makes every account-level lookup fail with `err`.
    pub fn failing_account(mut self, err: Error) -> Self {
        self.account_error = Some(err);
        self
    }

    fn account_check(&self) -> Result<()> {
        match &self.account_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn find(&self, user_name: &str) -> Result<&(User, Vec<AccessKey>)> {
        self.users
            .iter()
            .find(|(u, _)| u.user_name == user_name)
            .ok_or_else(|| Error::NotFound {
                resource: "user",
                name: user_name.to_string(),
            })
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn list_users(&self) -> Result<Vec<User>> {
        if let Some(err) = &self.list_users_error {
            return Err(err.clone());
        }
        Ok(self.users.iter().map(|(u, _)| u.clone()).collect())
    }

    async fn list_access_keys(&self, user_name: &str) -> Result<Vec<AccessKey>> {
        if let Some(err) = self.access_key_errors.get(user_name) {
            return Err(err.clone());
        }
        self.find(user_name).map(|(_, keys)| keys.clone())
    }

    async fn get_user(&self, user_name: &str) -> Result<User> {
        self.find(user_name).map(|(u, _)| u.clone())
    }

    async fn caller_account_id(&self) -> Result<String> {
        self.account_check()?;
        Ok(self.account_id.clone())
    }

    async fn list_account_aliases(&self) -> Result<Vec<String>> {
        self.account_check()?;
        Ok(self.aliases.clone())
    }

    async fn account_summary(&self) -> Result<BTreeMap<String, i32>> {
        self.account_check()?;
        Ok(self.summary.clone())
    }
}
