use anyhow::Result;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use pricebot::models::CarVariant;
use pricebot::settings::{AdminRole, Priority};
use pricebot::store::{Audience, BotData, JsonStore, ScheduledBroadcast};

fn data_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("bot_data.json")
}

/// A missing file starts from defaults without creating anything yet
#[tokio::test]
async fn test_open_missing_file_uses_defaults() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonStore::open(data_path(&dir))?;

    let (users, entries) = store
        .read(|data| (data.users.len(), data.menu.entries.len()))
        .await;
    assert_eq!(users, 0);
    assert!(entries > 0, "default menu entries should be present");
    assert!(!data_path(&dir).exists());
    Ok(())
}

/// Updates are written to disk and survive a reopen
#[tokio::test]
async fn test_update_persists_across_reopen() -> Result<()> {
    let dir = TempDir::new()?;
    let path = data_path(&dir);

    {
        let store = JsonStore::open(&path)?;
        store
            .update(|data| {
                data.register_user(11, Utc::now());
                data.admins.insert(22, AdminRole::Support);
                data.settings.priority = Priority::Spreadsheet;
                data.prices
                    .spreadsheet
                    .upsert_variant("Saipa", "Shahin", CarVariant::new("G", 1000.0, 900.0));
            })
            .await?;
    }
    assert!(path.exists());

    let reopened = JsonStore::open(&path)?;
    reopened
        .read(|data| {
            assert_eq!(data.users.len(), 1);
            assert_eq!(data.admins.get(&22), Some(&AdminRole::Support));
            assert_eq!(data.settings.priority, Priority::Spreadsheet);
            assert_eq!(data.prices.spreadsheet.variant_count(), 1);
        })
        .await;
    Ok(())
}

/// `with_data` only writes when the closure reports a change
#[tokio::test]
async fn test_with_data_skips_unchanged_writes() -> Result<()> {
    let dir = TempDir::new()?;
    let path = data_path(&dir);
    let store = JsonStore::open(&path)?;

    let count = store
        .with_data(|data| (data.users.len(), false))
        .await?;
    assert_eq!(count, 0);
    assert!(!path.exists());

    store
        .with_data(|data| {
            let changed = data.register_user(5, Utc::now());
            ((), changed)
        })
        .await?;
    assert!(path.exists());
    Ok(())
}

/// A corrupt file is kept aside and the store starts from defaults
#[tokio::test]
async fn test_corrupt_file_is_preserved() -> Result<()> {
    let dir = TempDir::new()?;
    let path = data_path(&dir);
    std::fs::write(&path, b"{ this is not json")?;

    let store = JsonStore::open(&path)?;
    let users = store.read(|data| data.users.len()).await;
    assert_eq!(users, 0);

    let preserved = std::fs::read_dir(dir.path())?
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().contains(".corrupt."));
    assert!(preserved, "the corrupt file should be copied aside");
    Ok(())
}

/// Older files without newer sections still load, with defaults filled in
#[tokio::test]
async fn test_partial_document_is_normalized() -> Result<()> {
    let dir = TempDir::new()?;
    let path = data_path(&dir);
    std::fs::write(
        &path,
        r#"{"users": [{"id": 9, "lastSeen": "2024-03-01T10:00:00Z"}], "menu": {}}"#,
    )?;

    let store = JsonStore::open(&path)?;
    store
        .read(|data| {
            assert_eq!(data.users[0].id, 9);
            assert!(data.menu.get("search").is_some());
            assert_eq!(data.settings.priority, Priority::Ai);
        })
        .await;
    Ok(())
}

/// Exported backups parse back into the same document
#[tokio::test]
async fn test_export_bytes_restores() -> Result<()> {
    let dir = TempDir::new()?;
    let store = JsonStore::open(data_path(&dir))?;
    store
        .update(|data| {
            data.backup_interval = 12;
            data.register_user(3, Utc::now());
        })
        .await?;

    let bytes = store.export_bytes().await?;
    let restored = BotData::from_slice(&bytes)?;
    assert_eq!(restored.backup_interval, 12);
    assert_eq!(restored.users.len(), 1);
    Ok(())
}

/// A failed write leaves the in-memory document as it was, so due broadcasts
/// are still queued for the next attempt
#[tokio::test]
async fn test_failed_write_keeps_memory_unchanged() -> Result<()> {
    let dir = TempDir::new()?;
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub)?;
    let store = JsonStore::open(sub.join("bot_data.json"))?;

    store
        .update(|data| {
            data.scheduled_broadcasts.push(ScheduledBroadcast {
                id: Uuid::new_v4(),
                audience: Audience::All,
                text: "Prices updated".to_string(),
                due_at: Utc::now() - Duration::minutes(1),
            });
        })
        .await?;

    std::fs::remove_dir_all(&sub)?;

    let result = store
        .with_data(|data| {
            let due = data.take_due_broadcasts(Utc::now());
            let changed = !due.is_empty();
            (due, changed)
        })
        .await;
    assert!(result.is_err());

    let pending = store.read(|data| data.scheduled_broadcasts.len()).await;
    assert_eq!(pending, 1);
    Ok(())
}
