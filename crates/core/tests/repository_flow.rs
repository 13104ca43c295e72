//! End-to-end repository behavior against the in-memory store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use tokio::time::timeout;

use flatman_core::properties::{Lessee, Property};
use flatman_core::reminders::{LeaseReminderService, NoopReminders};
use flatman_core::store::{RemoteStore, StorePath, Subscription};
use flatman_core::transactions::{Transaction, TransactionKind};
use flatman_core::{RentalRepository, Response, Result};
use flatman_store_memory::MemoryStore;

const USER: &str = "user-1";

fn repository(store: &Arc<MemoryStore>) -> RentalRepository {
    let remote: Arc<dyn RemoteStore> = Arc::clone(store) as Arc<dyn RemoteStore>;
    RentalRepository::new(USER, remote, Arc::new(NoopReminders))
}

fn property(address: &str) -> Property {
    Property {
        address: address.to_string(),
        floor: 1,
        name: String::new(),
        ..Property::default()
    }
}

fn lessee(name: &str, end: &str) -> Lessee {
    Lessee {
        name: name.to_string(),
        rent: dec!(650),
        start: "2024-01-01".to_string(),
        end: end.to_string(),
        event_id: None,
    }
}

fn transaction(amount: rust_decimal::Decimal, comment: &str, date: &str) -> Transaction {
    Transaction {
        id: None,
        amount,
        comment: comment.to_string(),
        date: date.to_string(),
    }
}

async fn next_success<T>(stream: &mut Subscription<Response<T>>) -> T {
    loop {
        match stream.recv().await {
            Some(Response::Loading) => continue,
            Some(Response::Success(value)) => return value,
            Some(Response::Error(message)) => panic!("stream failed: {message}"),
            None => panic!("stream ended unexpectedly"),
        }
    }
}

/// Reminder double that hands out sequential ids and records every call.
#[derive(Default)]
struct RecordingReminders {
    calls: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl RecordingReminders {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LeaseReminderService for RecordingReminders {
    async fn insert_reminder(&self, date: &str, text: &str) -> Result<String> {
        let id = format!("ev-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.calls
            .lock()
            .unwrap()
            .push(format!("insert {id} {date} {text}"));
        Ok(id)
    }

    async fn update_reminder(&self, reminder_id: &str, date: &str, text: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("update {reminder_id} {date} {text}"));
        Ok(())
    }

    async fn delete_reminder(&self, reminder_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("delete {reminder_id}"));
        Ok(())
    }
}

#[tokio::test]
async fn added_property_round_trips_with_its_storage_key_as_id() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo.add_property(property("Main St 1")).await.unwrap();
    assert!(!id.is_empty());

    let mut stream = repo.list_properties();
    let listed = next_success(&mut stream).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].address, "Main St 1");
}

#[tokio::test]
async fn stored_values_never_contain_the_id_field() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo.add_property(property("Main St 1")).await.unwrap();
    let raw = store.value_at(&StorePath::root(USER).child("flats").child(id));
    assert!(raw.get("id").is_none());
    assert_eq!(raw["address"], "Main St 1");
}

#[tokio::test]
async fn invalid_property_is_rejected_before_any_write() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    assert!(repo.add_property(property("")).await.is_err());
    let flats = store.value_at(&StorePath::root(USER).child("flats"));
    assert!(flats.is_null());
}

#[tokio::test]
async fn update_overwrites_the_record_at_its_id() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo.add_property(property("Main St 1")).await.unwrap();
    let mut edited = property("Elm St 9");
    edited.id = id.clone();
    repo.update_property(edited, None).await.unwrap();

    let raw = store.value_at(&StorePath::root(USER).child("flats").child(id));
    assert_eq!(raw["address"], "Elm St 9");
}

#[tokio::test]
async fn update_without_an_id_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);
    assert!(repo.update_property(property("Main St 1"), None).await.is_err());
}

#[tokio::test]
async fn transaction_lists_emit_most_recent_first() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    for date in ["2024-01-05", "2024-03-01", "2024-02-10"] {
        repo.add_transaction("flat-1", TransactionKind::Rent, transaction(dec!(650), "rent", date))
            .await
            .unwrap();
    }

    let mut stream = repo.list_transactions(TransactionKind::Rent, "flat-1");
    let listed = next_success(&mut stream).await;
    let dates: Vec<&str> = listed.iter().map(|tx| tx.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-02-10", "2024-01-05"]);
    assert!(listed.iter().all(|tx| tx.id.is_some()));
}

#[tokio::test]
async fn rent_comment_is_required_but_expense_comment_is_not() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let result = repo
        .add_transaction("flat-1", TransactionKind::Rent, transaction(dec!(650), "", "2024-01-05"))
        .await;
    assert!(result.is_err());

    repo.add_transaction(
        "flat-1",
        TransactionKind::Expense,
        transaction(dec!(40), "", "2024-01-05"),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn updated_transaction_replaces_the_stored_value() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo
        .add_transaction(
            "flat-1",
            TransactionKind::Expense,
            transaction(dec!(40), "bulb", "2024-01-05"),
        )
        .await
        .unwrap();

    let mut edited = transaction(dec!(55), "bulbs", "2024-01-06");
    edited.id = Some(id.clone());
    repo.update_transaction("flat-1", TransactionKind::Expense, edited)
        .await
        .unwrap();

    let raw = store.value_at(
        &StorePath::root(USER)
            .child("expenses")
            .child("flat-1")
            .child(id),
    );
    assert_eq!(raw["amount"], 55.0);
    assert_eq!(raw["comment"], "bulbs");
}

#[tokio::test]
async fn deleted_transaction_disappears_from_the_list() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo
        .add_transaction(
            "flat-1",
            TransactionKind::Rent,
            transaction(dec!(650), "rent", "2024-01-05"),
        )
        .await
        .unwrap();

    let mut record = transaction(dec!(650), "rent", "2024-01-05");
    record.id = Some(id);
    repo.delete_transaction("flat-1", TransactionKind::Rent, &record)
        .await
        .unwrap();

    let mut stream = repo.list_transactions(TransactionKind::Rent, "flat-1");
    assert!(next_success(&mut stream).await.is_empty());
}

#[tokio::test]
async fn last_rent_emits_nothing_for_an_empty_collection() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut stream = repo.last_rent("flat-1");
    assert!(timeout(Duration::from_millis(50), stream.recv()).await.is_err());
}

#[tokio::test]
async fn last_rent_tracks_the_most_recent_payment() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(650), "january", "2024-01-05"),
    )
    .await
    .unwrap();

    let mut stream = repo.last_rent("flat-1");
    let first = stream.recv().await.unwrap();
    assert_eq!(first.date, "2024-01-05");

    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(650), "february", "2024-02-05"),
    )
    .await
    .unwrap();

    let second = stream.recv().await.unwrap();
    assert_eq!(second.date, "2024-02-05");
}

#[tokio::test]
async fn total_savings_is_rents_minus_expenses_in_any_arrival_order() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut stream = repo.total_savings();
    assert_eq!(stream.recv().await, Some(dec!(0)));

    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(650), "rent", "2024-01-05"),
    )
    .await
    .unwrap();
    assert_eq!(stream.recv().await, Some(dec!(650)));

    repo.add_transaction(
        "flat-1",
        TransactionKind::Expense,
        transaction(dec!(50), "", "2024-01-10"),
    )
    .await
    .unwrap();
    assert_eq!(stream.recv().await, Some(dec!(600)));

    // expense-first arrival on a fresh stream converges to the same value
    let mut reversed = repo.total_savings();
    assert_eq!(reversed.recv().await, Some(dec!(600)));
}

#[tokio::test]
async fn per_property_savings_ignore_other_properties() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(650), "rent", "2024-01-05"),
    )
    .await
    .unwrap();
    repo.add_transaction(
        "flat-2",
        TransactionKind::Rent,
        transaction(dec!(500), "rent", "2024-01-05"),
    )
    .await
    .unwrap();
    repo.add_transaction(
        "flat-1",
        TransactionKind::Expense,
        transaction(dec!(100), "", "2024-01-10"),
    )
    .await
    .unwrap();

    let mut stream = repo.total_savings_for("flat-1");
    assert_eq!(stream.recv().await, Some(dec!(550)));
}

#[tokio::test]
async fn last_year_savings_only_count_the_previous_calendar_year() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let this_year = Utc::now().year();
    let last_year = this_year - 1;

    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(1000), "rent", &format!("{last_year}-06-05")),
    )
    .await
    .unwrap();
    repo.add_transaction(
        "flat-1",
        TransactionKind::Rent,
        transaction(dec!(400), "rent", &format!("{this_year}-01-05")),
    )
    .await
    .unwrap();
    repo.add_transaction(
        "flat-1",
        TransactionKind::Expense,
        transaction(dec!(200), "", &format!("{last_year}-07-01")),
    )
    .await
    .unwrap();

    let mut stream = repo.last_year_savings();
    assert_eq!(stream.recv().await, Some(dec!(800)));
}

#[tokio::test]
async fn cascade_delete_removes_record_and_both_subtrees() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo.add_property(property("Main St 1")).await.unwrap();
    repo.add_transaction(&id, TransactionKind::Rent, transaction(dec!(650), "rent", "2024-01-05"))
        .await
        .unwrap();
    repo.add_transaction(&id, TransactionKind::Expense, transaction(dec!(50), "", "2024-01-10"))
        .await
        .unwrap();

    let mut record = property("Main St 1");
    record.id = id.clone();
    let report = repo.delete_property(&record).await.unwrap();
    assert!(report.is_complete());

    let root = StorePath::root(USER);
    assert!(store.value_at(&root.clone().child("flats").child(id.clone())).is_null());
    assert!(store.value_at(&root.clone().child("rents").child(id.clone())).is_null());
    assert!(store.value_at(&root.child("expenses").child(id)).is_null());
}

#[tokio::test]
async fn cascade_delete_reports_partial_failure_and_keeps_going() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let id = repo.add_property(property("Main St 1")).await.unwrap();
    repo.add_transaction(&id, TransactionKind::Rent, transaction(dec!(650), "rent", "2024-01-05"))
        .await
        .unwrap();

    store.deny_writes_under(StorePath::root(USER).child("rents"));

    let mut record = property("Main St 1");
    record.id = id.clone();
    let report = repo.delete_property(&record).await.unwrap();
    assert!(!report.is_complete());
    assert!(report.expenses_removed);
    assert!(!report.rents_removed);
    assert!(report.property_removed);

    // the rents subtree survives as an orphan
    let rents = store.value_at(&StorePath::root(USER).child("rents").child(id));
    assert!(rents.is_object());
}

#[tokio::test]
async fn malformed_sibling_does_not_poison_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    store
        .set(
            &StorePath::root(USER).child("rents").child("flat-1"),
            json!({
                "good": { "amount": 650, "comment": "rent", "date": "2024-01-05" },
                "bad": { "comment": "no amount", "date": "2024-01-06" },
            }),
        )
        .await
        .unwrap();

    let mut stream = repo.list_transactions(TransactionKind::Rent, "flat-1");
    let listed = next_success(&mut stream).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id.as_deref(), Some("good"));
}

#[tokio::test]
async fn listener_failure_is_terminal() {
    let store = Arc::new(MemoryStore::new());
    store.fail_listeners_at(StorePath::root(USER).child("flats"));
    let repo = repository(&store);

    let mut stream = repo.list_properties();
    assert!(matches!(stream.recv().await, Some(Response::Error(_))));
    assert!(stream.recv().await.is_none());
}

#[tokio::test]
async fn mid_stream_listener_error_ends_the_list_stream() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut stream = repo.list_properties();
    next_success::<Vec<Property>>(&mut stream).await;
    assert_eq!(repo.open_listeners(), 1);

    store.emit_error_at(&StorePath::root(USER).child("flats"), "connection lost");

    assert!(matches!(stream.recv().await, Some(Response::Error(message)) if message == "connection lost"));
    assert!(stream.recv().await.is_none());
    assert_eq!(repo.open_listeners(), 0);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn savings_stream_ends_after_a_listener_error() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut stream = repo.total_savings();
    assert_eq!(stream.recv().await, Some(dec!(0)));

    store.emit_error_at(&StorePath::root(USER).child("rents"), "connection lost");

    assert!(timeout(Duration::from_millis(50), stream.recv())
        .await
        .expect("savings stream must end, not hang")
        .is_none());
}

#[tokio::test]
async fn cancel_deregisters_exactly_once() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let mut stream = repo.list_properties();
    assert_eq!(store.listener_count(), 1);
    assert_eq!(repo.open_listeners(), 1);

    stream.cancel();
    stream.cancel();
    assert_eq!(store.listener_count(), 0);
    assert_eq!(repo.open_listeners(), 0);
}

#[tokio::test]
async fn drop_deregisters_the_listener() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    {
        let _stream = repo.list_properties();
        assert_eq!(store.listener_count(), 1);
    }
    assert_eq!(store.listener_count(), 0);
    assert_eq!(repo.open_listeners(), 0);
}

#[tokio::test]
async fn sign_out_sweeps_every_open_listener() {
    let store = Arc::new(MemoryStore::new());
    let repo = repository(&store);

    let _properties = repo.list_properties();
    let _savings = repo.total_savings();
    let _rents = repo.list_transactions(TransactionKind::Rent, "flat-1");
    assert_eq!(repo.open_listeners(), 4);
    assert_eq!(store.listener_count(), 4);

    repo.sign_out();
    assert_eq!(repo.open_listeners(), 0);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn lease_reminder_follows_the_lessee_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let reminders = Arc::new(RecordingReminders::default());
    let remote: Arc<dyn RemoteStore> = Arc::clone(&store) as Arc<dyn RemoteStore>;
    let repo = RentalRepository::new(USER, remote, Arc::clone(&reminders) as Arc<dyn LeaseReminderService>);

    let mut occupied = property("Main St 1");
    occupied.lessee = Some(lessee("Jane Doe", "2026-12-31"));
    let id = repo.add_property(occupied.clone()).await.unwrap();

    // the generated handle is written into the stored lessee
    let raw = store.value_at(&StorePath::root(USER).child("flats").child(id.clone()));
    assert_eq!(raw["lessee"]["eventID"], "ev-1");

    // end-date change updates the existing reminder
    let previous = lessee("Jane Doe", "2026-12-31");
    let mut edited = occupied.clone();
    edited.id = id.clone();
    edited.lessee = Some(Lessee {
        event_id: Some("ev-1".to_string()),
        ..lessee("Jane Doe", "2027-06-30")
    });
    repo.update_property(edited, Some(&previous)).await.unwrap();

    // removing the lessee deletes the reminder
    let previous = Lessee {
        event_id: Some("ev-1".to_string()),
        ..lessee("Jane Doe", "2027-06-30")
    };
    let mut vacated = occupied;
    vacated.id = id;
    vacated.lessee = None;
    repo.update_property(vacated, Some(&previous)).await.unwrap();

    // reminders fire one month ahead of the lease end, titled by address
    let calls = reminders.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("insert ev-1 2026-11-30"));
    assert!(calls[0].contains("Rent ends for Main St 1"));
    assert!(calls[1].starts_with("update ev-1 2027-05-30"));
    assert_eq!(calls[2], "delete ev-1");
}

#[tokio::test]
async fn unchanged_end_date_leaves_the_reminder_alone() {
    let store = Arc::new(MemoryStore::new());
    let reminders = Arc::new(RecordingReminders::default());
    let remote: Arc<dyn RemoteStore> = Arc::clone(&store) as Arc<dyn RemoteStore>;
    let repo = RentalRepository::new(USER, remote, Arc::clone(&reminders) as Arc<dyn LeaseReminderService>);

    let mut occupied = property("Main St 1");
    occupied.lessee = Some(lessee("Jane Doe", "2026-12-31"));
    let id = repo.add_property(occupied.clone()).await.unwrap();

    let previous = Lessee {
        event_id: Some("ev-1".to_string()),
        ..lessee("Jane Doe", "2026-12-31")
    };
    let mut edited = occupied;
    edited.id = id;
    edited.address = "Main St 1, 2nd floor".to_string();
    edited.lessee = Some(lessee("Jane Doe", "2026-12-31"));
    repo.update_property(edited.clone(), Some(&previous)).await.unwrap();

    assert_eq!(reminders.calls().len(), 1);

    // the handle from the previous record is carried forward on overwrite
    let raw = store.value_at(&StorePath::root(USER).child("flats").child(edited.id));
    assert_eq!(raw["lessee"]["eventID"], "ev-1");
}
