use checkin_lib::scanner::manual::{AUTO_SUBMIT_DEBOUNCE, AUTO_SUBMIT_LENGTH};
use checkin_lib::scanner::ManualEntry;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

async fn settle() {
    tokio::time::sleep(AUTO_SUBMIT_DEBOUNCE + Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn sixth_character_submits_once_after_the_debounce() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    for typed in ["A", "AB", "AB1", "AB12", "AB12C", "AB12CD"] {
        entry.input(typed);
    }
    assert_eq!(AUTO_SUBMIT_LENGTH, 6);
    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));

    settle().await;
    assert_eq!(submissions.try_recv().unwrap(), "AB12CD");

    // Further typing past the threshold does not resubmit.
    entry.input("AB12CDE");
    settle().await;
    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test(start_paused = true)]
async fn debounce_submits_the_latest_value() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("AB12CD");
    tokio::time::sleep(Duration::from_millis(100)).await;
    entry.input("AB12CDE");
    settle().await;

    assert_eq!(submissions.try_recv().unwrap(), "AB12CDE");
    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test(start_paused = true)]
async fn deleting_below_the_threshold_rearms() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("AB12CD");
    settle().await;
    assert_eq!(submissions.try_recv().unwrap(), "AB12CD");

    entry.input("AB12C");
    entry.input("AB12CX");
    settle().await;
    assert_eq!(submissions.try_recv().unwrap(), "AB12CX");
}

#[tokio::test(start_paused = true)]
async fn dropping_below_before_the_debounce_cancels() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("AB12CD");
    entry.input("AB12");
    settle().await;

    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test(start_paused = true)]
async fn explicit_submit_replaces_the_pending_one() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("  AB12CD ");
    assert!(entry.submit());
    settle().await;

    assert_eq!(submissions.try_recv().unwrap(), "AB12CD");
    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn empty_field_does_not_submit() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("   ");
    assert!(!entry.submit());
    assert_eq!(entry.value(), "");
    assert_eq!(submissions.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn short_codes_can_still_be_submitted_by_hand() {
    let (mut entry, mut submissions) = ManualEntry::new(AUTO_SUBMIT_DEBOUNCE);

    entry.input("AB1");
    assert!(entry.submit());
    assert_eq!(submissions.try_recv().unwrap(), "AB1");
}
