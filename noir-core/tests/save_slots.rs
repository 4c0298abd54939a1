//! Integration tests for save slots.

use noir_core::persist::slot_key;
use noir_core::testing::{assert_clue_titles, assert_log_len};
use noir_core::{
    ClueDescriptor, ClueKind, FileSlotStore, Investigation, LoadOutcome, MemorySlotStore,
    PersistError, ScriptedOracle, ScriptedSynthesizer, SessionConfig, SessionError,
    SessionSnapshot, StoreError, TestHarness,
};
use std::sync::Arc;
use tempfile::TempDir;

async fn played_harness() -> TestHarness {
    let mut harness = TestHarness::new();
    harness
        .expect_clues(
            "Mud on the sill.",
            vec![
                ClueDescriptor::text("Gardener's note", "Tucked in a boot", "Gate left open, 11pm"),
                ClueDescriptor::visual(ClueKind::Image, "Sill", "Fresh mud", None),
            ],
        )
        .expect_image(Some("data:image/jpeg;base64,/9j/"))
        .expect_reply("The widow's story has holes.");

    harness.input("Look at the window").await;
    harness.input("Talk to Vivian").await;
    harness
}

#[tokio::test]
async fn test_save_mutate_load_restores_exactly() {
    let mut harness = played_harness().await;
    let turns_before = harness.investigation.turns();
    let clues_before = harness.investigation.clues();

    let receipt = harness.investigation.save(1).await.unwrap();
    assert_eq!(receipt.message(), "Case file stored in cabinet #1");

    harness
        .expect_clues(
            "A pistol!",
            vec![ClueDescriptor::text("Pistol", "Webley, one round fired", "")],
        )
        .expect_reply("Nobody saw a thing.");
    harness.input("Open the gun cabinet").await;
    harness.input("Ask the staff").await;
    assert_log_len(&harness, 9);

    let outcome = harness.investigation.load(1).await.unwrap();

    assert!(matches!(outcome, LoadOutcome::Restored(ref s) if s.slot == 1));
    assert_eq!(outcome.message().as_deref(), Some("Case file #1 retrieved"));
    assert_eq!(harness.investigation.turns(), turns_before);
    assert_eq!(harness.investigation.clues(), clues_before);
}

#[tokio::test]
async fn test_loading_empty_slot_changes_nothing() {
    let harness = played_harness().await;
    let turns_before = harness.investigation.turns();

    let outcome = harness.investigation.load(7).await.unwrap();

    assert_eq!(outcome, LoadOutcome::Empty);
    assert_eq!(harness.investigation.turns(), turns_before);
    assert_clue_titles(&harness, &["Sill", "Gardener's note"]);
}

#[tokio::test]
async fn test_corrupted_slot_reports_and_preserves_state() {
    let store = MemorySlotStore::new();
    store.insert_raw(slot_key(2), r#"{"turns": "not a list", "clues": []}"#);
    let mut harness = TestHarness::with_store(SessionConfig::default(), store);
    harness.expect_reply("Still here.");
    harness.input("Anything new?").await;

    let err = harness.investigation.load(2).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Persist(PersistError::Corrupted { slot: 2, .. })
    ));
    assert_eq!(err.to_string(), "Case file damaged, cannot be read");
    assert_log_len(&harness, 3);
}

#[tokio::test]
async fn test_snapshot_missing_fields_is_corrupted() {
    let store = MemorySlotStore::new();
    store.insert_raw(slot_key(3), r#"{"turns": [], "clues": []}"#);
    let harness = TestHarness::with_store(SessionConfig::default(), store);

    let err = harness.investigation.load(3).await.unwrap_err();

    assert!(matches!(err, SessionError::Persist(PersistError::Corrupted { .. })));
    assert_log_len(&harness, 1);
}

#[tokio::test]
async fn test_last_write_wins() {
    let mut harness = TestHarness::new();
    harness.investigation.save(1).await.unwrap();

    harness.expect_reply("Later.");
    harness.input("Move on").await;
    harness.investigation.save(1).await.unwrap();

    let summary = harness.investigation.peek(1).await.unwrap().unwrap();
    assert_eq!(summary.turn_count, 3);
    assert_eq!(summary.preview, "Later.");
}

#[tokio::test]
async fn test_saved_record_shape() {
    let harness = played_harness().await;
    harness.investigation.save(5).await.unwrap();

    let raw = harness.store.get_raw("detective_save_slot_5").unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert_eq!(json["caseId"], harness.investigation.case().id.as_str());
    assert_eq!(json["preview"], "The widow's story has holes.");
    assert_eq!(json["turns"].as_array().unwrap().len(), 5);
    assert_eq!(json["clues"].as_array().unwrap().len(), 2);
    assert_eq!(json["clues"][0]["title"], "Sill");
    assert!(json["timestamp"].as_i64().unwrap() > 0);

    let snapshot: SessionSnapshot = serde_json::from_str(&raw).unwrap();
    assert_eq!(snapshot.turns, harness.investigation.turns());
}

#[tokio::test]
async fn test_preview_is_truncated() {
    let mut harness = TestHarness::new();
    harness.expect_reply("The chauffeur swears he drove Mr. Grey to the station at ten.");
    harness.input("Where was the car?").await;

    let receipt = harness.investigation.save(1).await.unwrap();

    assert_eq!(receipt.summary.preview, "The chauffeur swears he drove ");
    assert_eq!(receipt.summary.preview.chars().count(), 30);
}

#[tokio::test]
async fn test_quota_failure_is_reported() {
    let harness = TestHarness::with_store(
        SessionConfig::default(),
        MemorySlotStore::new().with_quota(64),
    );

    let err = harness.investigation.save(1).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::Persist(PersistError::Storage(StoreError::QuotaExceeded { .. }))
    ));
    assert!(harness.investigation.peek(1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_slots() {
    let harness = played_harness().await;
    harness.investigation.save(2).await.unwrap();
    harness.investigation.save(4).await.unwrap();

    let slots = harness.investigation.list_slots(1..=5).await.unwrap();

    assert_eq!(slots.iter().map(|s| s.slot).collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(slots[0].turn_count, 5);
    assert_eq!(slots[0].clue_count, 2);
}

#[tokio::test]
async fn test_slot_count_is_unbounded() {
    let harness = TestHarness::new();

    harness.investigation.save(1_000).await.unwrap();

    assert!(harness.store.get_raw("detective_save_slot_1000").is_some());
    assert!(harness.investigation.peek(1_000).await.unwrap().is_some());
}

#[tokio::test]
async fn test_file_slots_survive_a_new_session() {
    let temp_dir = TempDir::new().unwrap();
    let config = SessionConfig::default().with_save_dir(temp_dir.path());

    let first = {
        let oracle = ScriptedOracle::new();
        oracle.push_reply(noir_core::OracleReply::narration("Filed."));
        let investigation = Investigation::new(
            config.clone(),
            Arc::new(oracle),
            Arc::new(ScriptedSynthesizer::new()),
            Arc::new(FileSlotStore::new(temp_dir.path())),
        );
        investigation.send("Write it up").await;
        investigation.save(3).await.unwrap();
        investigation.turns()
    };

    assert!(temp_dir.path().join("detective_save_slot_3.json").exists());

    let second = Investigation::new(
        config,
        Arc::new(ScriptedOracle::new()),
        Arc::new(ScriptedSynthesizer::new()),
        Arc::new(FileSlotStore::new(temp_dir.path())),
    );
    assert_eq!(second.turns().len(), 1);

    second.load(3).await.unwrap();

    assert_eq!(second.turns(), first);
}
