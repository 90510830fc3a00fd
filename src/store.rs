//! # JSON Store
//!
//! The whole bot state lives in one JSON document. [`JsonStore`] keeps it in
//! memory behind a tokio mutex and writes it back atomically (temporary file
//! in the same directory, then rename) after every change.
//!
//! A missing file starts from defaults. A corrupt file is copied aside to
//! `<path>.corrupt.<timestamp>` and the bot starts from defaults.

use chrono::{DateTime, Duration, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::catalog::PriceBook;
use crate::errors::StoreError;
use crate::menu::MenuConfig;
use crate::models::ChatMessage;
use crate::settings::{AdminRole, AppSettings, Sponsor, SupportConfig};

/// Oldest support messages are dropped beyond this
pub const SUPPORT_INBOX_LIMIT: usize = 200;

/// Window for the "active users" broadcast audience
pub const ACTIVE_USER_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub last_seen: DateTime<Utc>,
}

/// Who receives a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    All,
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledBroadcast {
    pub id: Uuid,
    pub audience: Audience,
    pub text: String,
    pub due_at: DateTime<Utc>,
}

/// The persisted document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotData {
    pub settings: AppSettings,
    pub prices: PriceBook,
    pub users: Vec<UserRecord>,
    pub admins: BTreeMap<i64, AdminRole>,
    pub sponsor: Option<Sponsor>,
    pub menu: MenuConfig,
    pub support: SupportConfig,
    /// Hours between automatic backups; 0 disables them
    pub backup_interval: u32,
    pub scheduled_broadcasts: Vec<ScheduledBroadcast>,
    pub support_inbox: Vec<ChatMessage>,
}

impl BotData {
    /// Parse a document (a stored file or an uploaded backup) and fill in
    /// anything missing
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut data: BotData = serde_json::from_slice(bytes)?;
        data.normalize();
        Ok(data)
    }

    /// Parse an uploaded backup. Unlike [`BotData::from_slice`] the top-level
    /// sections must all be present, so an unrelated JSON document is never
    /// taken for an empty backup.
    pub fn validate_backup(bytes: &[u8]) -> Result<Self, StoreError> {
        serde_json::from_slice::<BackupSections>(bytes)?;
        Self::from_slice(bytes)
    }

    pub fn normalize(&mut self) {
        self.menu.fill_defaults();
        self.prices.ai.fill_brand_names();
        self.prices.spreadsheet.fill_brand_names();
    }

    /// Record a user interaction. Returns `true` when the change is worth
    /// persisting: a new user, or one not seen for over an hour.
    pub fn register_user(&mut self, user_id: i64, now: DateTime<Utc>) -> bool {
        match self.users.iter_mut().find(|u| u.id == user_id) {
            Some(user) => {
                let stale = now - user.last_seen > Duration::hours(1);
                user.last_seen = now;
                stale
            }
            None => {
                self.users.push(UserRecord {
                    id: user_id,
                    last_seen: now,
                });
                true
            }
        }
    }

    /// Role of `user_id`; the owner is always `Full`
    pub fn role_of(&self, user_id: i64, owner_id: i64) -> Option<AdminRole> {
        if owner_id != 0 && user_id == owner_id {
            return Some(AdminRole::Full);
        }
        self.admins.get(&user_id).copied()
    }

    /// Recipients for a broadcast
    pub fn audience_ids(&self, audience: Audience, now: DateTime<Utc>) -> Vec<i64> {
        let since = now - Duration::days(ACTIVE_USER_DAYS);
        self.users
            .iter()
            .filter(|u| audience == Audience::All || u.last_seen >= since)
            .map(|u| u.id)
            .collect()
    }

    /// Listed admins with the support or full role
    pub fn support_staff(&self) -> Vec<i64> {
        self.admins
            .iter()
            .filter(|(_, role)| matches!(role, AdminRole::Support | AdminRole::Full))
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn record_support_message(&mut self, message: ChatMessage) {
        self.support_inbox.push(message);
        if self.support_inbox.len() > SUPPORT_INBOX_LIMIT {
            let excess = self.support_inbox.len() - SUPPORT_INBOX_LIMIT;
            self.support_inbox.drain(..excess);
        }
    }

    /// Remove and return the broadcasts due at `now`
    pub fn take_due_broadcasts(&mut self, now: DateTime<Utc>) -> Vec<ScheduledBroadcast> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled_broadcasts)
            .into_iter()
            .partition(|b| b.due_at <= now);
        self.scheduled_broadcasts = pending;
        due
    }
}

/// Sections every exported backup carries
#[derive(Deserialize)]
#[allow(dead_code)]
struct BackupSections {
    settings: IgnoredAny,
    prices: IgnoredAny,
    menu: IgnoredAny,
}

/// File-backed, mutex-guarded [`BotData`]
pub struct JsonStore {
    path: PathBuf,
    data: Mutex<BotData>,
}

impl JsonStore {
    /// Open the store at `path`, falling back to defaults when the file is
    /// missing or corrupt
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = load_or_default(&path)?;
        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-only closure against the current document
    pub async fn read<R>(&self, f: impl FnOnce(&BotData) -> R) -> R {
        let data = self.data.lock().await;
        f(&*data)
    }

    /// Mutate the document and persist it
    pub async fn update<R>(&self, f: impl FnOnce(&mut BotData) -> R) -> Result<R, StoreError> {
        self.with_data(|data| (f(data), true)).await
    }

    /// Mutate the document; it is persisted only when the closure reports a
    /// change. The closure works on a copy that replaces the live document
    /// once the write succeeded, so a failed write leaves memory untouched.
    pub async fn with_data<R>(
        &self,
        f: impl FnOnce(&mut BotData) -> (R, bool),
    ) -> Result<R, StoreError> {
        let mut data = self.data.lock().await;
        let mut draft = data.clone();
        let (result, changed) = f(&mut draft);
        if changed {
            persist(&self.path, &draft).await?;
        }
        *data = draft;
        Ok(result)
    }

    /// The document as pretty-printed JSON, for backups
    pub async fn export_bytes(&self) -> Result<Vec<u8>, StoreError> {
        let data = self.data.lock().await;
        Ok(serde_json::to_vec_pretty(&*data)?)
    }
}

fn load_or_default(path: &Path) -> Result<BotData, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No data file yet, starting from defaults");
            return Ok(BotData::default());
        }
        Err(e) => return Err(e.into()),
    };

    match BotData::from_slice(&bytes) {
        Ok(data) => {
            debug!(path = %path.display(), users = data.users.len(), "Data file loaded");
            Ok(data)
        }
        Err(e) => {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            let corrupt = PathBuf::from(format!("{}.corrupt.{timestamp}", path.display()));
            std::fs::copy(path, &corrupt)?;
            error!(
                path = %path.display(),
                moved_to = %corrupt.display(),
                error = %e,
                "Data file is corrupt, starting from defaults"
            );
            Ok(BotData::default())
        }
    }
}

async fn persist(path: &Path, data: &BotData) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(data)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes)).await?
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_user_updates_last_seen() {
        let mut data = BotData::default();
        let first = Utc::now() - Duration::days(40);
        let now = Utc::now();
        assert!(data.register_user(7, first));
        assert!(data.register_user(7, now));
        assert!(!data.register_user(7, now + Duration::minutes(5)));
        assert_eq!(data.users.len(), 1);
        assert!(data.users[0].last_seen > first);
    }

    #[test]
    fn test_audiences() {
        let now = Utc::now();
        let mut data = BotData::default();
        data.register_user(1, now - Duration::days(45));
        data.register_user(2, now - Duration::days(3));

        assert_eq!(data.audience_ids(Audience::All, now), vec![1, 2]);
        assert_eq!(data.audience_ids(Audience::Active, now), vec![2]);
    }

    #[test]
    fn test_owner_is_full_admin() {
        let mut data = BotData::default();
        data.admins.insert(5, AdminRole::Editor);
        assert_eq!(data.role_of(99, 99), Some(AdminRole::Full));
        assert_eq!(data.role_of(5, 99), Some(AdminRole::Editor));
        assert_eq!(data.role_of(6, 99), None);
        assert_eq!(data.role_of(0, 0), None);
    }

    #[test]
    fn test_support_inbox_is_capped() {
        let mut data = BotData::default();
        for i in 0..(SUPPORT_INBOX_LIMIT + 5) {
            data.record_support_message(ChatMessage::from_user(1, format!("m{i}"), Utc::now()));
        }
        assert_eq!(data.support_inbox.len(), SUPPORT_INBOX_LIMIT);
        assert_eq!(data.support_inbox[0].text, "m5");
    }

    #[test]
    fn test_take_due_broadcasts() {
        let now = Utc::now();
        let mut data = BotData::default();
        for (offset, text) in [(-1, "due"), (1, "later")] {
            data.scheduled_broadcasts.push(ScheduledBroadcast {
                id: Uuid::new_v4(),
                audience: Audience::All,
                text: text.to_string(),
                due_at: now + Duration::minutes(offset),
            });
        }
        let due = data.take_due_broadcasts(now);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].text, "due");
        assert_eq!(data.scheduled_broadcasts.len(), 1);
    }

    #[test]
    fn test_backup_requires_sections() {
        let exported = serde_json::to_vec(&BotData::default()).unwrap();
        assert!(BotData::validate_backup(&exported).is_ok());

        assert!(BotData::validate_backup(br#"{"hello":"world"}"#).is_err());
        assert!(BotData::validate_backup(br#"{"settings":{},"menu":{}}"#).is_err());
        assert!(BotData::validate_backup(b"[]").is_err());

        // Partial documents are still fine for the data file itself
        assert!(BotData::from_slice(br#"{"hello":"world"}"#).is_ok());
    }
}
