use anyhow::Result;
use chrono::{TimeZone, Utc};

use pricebot::dialogue::{validate_name, validate_url, DialogueState, PendingInput};
use pricebot::settings::AdminRole;
use pricebot::spreadsheet::Niche;
use pricebot::store::Audience;

/// Integration test for name validation used by the admin flows
#[tokio::test]
async fn test_name_validation() -> Result<()> {
    // Test valid names
    assert_eq!(validate_name("Iran Khodro").unwrap(), "Iran Khodro");
    assert_eq!(validate_name("  پژو ۲۰۶  ").unwrap(), "پژو ۲۰۶");

    // Test invalid names
    assert!(validate_name("").is_err());
    assert!(validate_name("   ").is_err());
    assert!(validate_name(&"a".repeat(256)).is_err());

    Ok(())
}

/// Links accept URLs with a scheme or Telegram handles
#[tokio::test]
async fn test_link_validation() -> Result<()> {
    assert_eq!(validate_url(" https://t.me/prices ").unwrap(), "https://t.me/prices");
    assert_eq!(validate_url("@prices").unwrap(), "https://t.me/prices");
    assert!(validate_url("prices").is_err());
    assert!(validate_url("").is_err());
    Ok(())
}

/// Dialogue states survive a serde_json round trip, including nested admin
/// inputs
#[tokio::test]
async fn test_dialogue_state_serialization() -> Result<()> {
    let states = vec![
        DialogueState::Idle,
        DialogueState::EstimatePaint {
            brand: "Saipa".to_string(),
            model: "Shahin".to_string(),
            year: 1401,
            mileage: 35_000,
        },
        DialogueState::AwaitingInput(PendingInput::AdminId {
            role: AdminRole::Editor,
        }),
        DialogueState::AwaitingInput(PendingInput::BroadcastContent {
            audience: Audience::Active,
            due_at: Some(Utc.with_ymd_and_hms(2025, 3, 21, 6, 30, 0).unwrap()),
        }),
        DialogueState::AwaitingInput(PendingInput::Spreadsheet {
            niche: Niche::Mobile,
        }),
    ];

    for state in states {
        let json = serde_json::to_string(&state)?;
        let restored: DialogueState = serde_json::from_str(&json)?;
        assert_eq!(restored, state);
    }

    Ok(())
}

/// Only upload steps wait for a document
#[tokio::test]
async fn test_document_steps() -> Result<()> {
    assert!(PendingInput::Spreadsheet { niche: Niche::Cars }.expects_document());
    assert!(PendingInput::RestoreBackup.expects_document());
    assert!(!PendingInput::BroadcastTime.expects_document());
    assert!(!PendingInput::AddBrand.expects_document());
    assert_eq!(DialogueState::default(), DialogueState::Idle);
    Ok(())
}
