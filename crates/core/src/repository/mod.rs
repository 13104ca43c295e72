//! Orchestration façade over the live query layer and the aggregate
//! calculator.
//!
//! Each streaming operation opens its own listener against the per-user
//! remote tree and registers it with the repository's subscription registry;
//! single-shot writes resolve exactly once. The storage topology per user:
//!
//! ```text
//! {userId}/flats/{propertyId}            -> Property value (no id field)
//! {userId}/rents/{propertyId}/{txId}     -> Transaction value (no id field)
//! {userId}/expenses/{propertyId}/{txId}  -> Transaction value (no id field)
//! ```

use std::sync::Arc;

use log::{debug, error, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::properties::{Lessee, Property};
use crate::reminders::LeaseReminderService;
use crate::savings::{self, SavingsStream};
use crate::store::{
    observe, RemoteStore, StoreEvent, StorePath, Subscription, SubscriptionRegistry,
};
use crate::transactions::{sort_by_date_desc, Transaction, TransactionKind};
use crate::utils::date::{one_month_before, parse_date_or, today, DATE_FORMAT};
use crate::validation::validate_comment;
use crate::{Error, Result};

/// One emission of a collection-backed stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Response<T> {
    /// A fresh upstream change is being decoded.
    Loading,
    Success(T),
    /// Terminal listener failure; the stream is over.
    Error(String),
}

/// Per-step outcome of a property cascade delete.
///
/// The store offers no transactions, so the three removals are independent.
/// A partial failure leaves the tree in whatever state the successful steps
/// produced; the caller decides whether to retry the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CascadeDeleteReport {
    pub expenses_removed: bool,
    pub rents_removed: bool,
    pub property_removed: bool,
}

impl CascadeDeleteReport {
    pub fn is_complete(&self) -> bool {
        self.expenses_removed && self.rents_removed && self.property_removed
    }
}

/// The data façade consumed by the presentation layer.
pub struct RentalRepository {
    user_id: String,
    store: Arc<dyn RemoteStore>,
    reminders: Arc<dyn LeaseReminderService>,
    registry: SubscriptionRegistry,
}

impl RentalRepository {
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn RemoteStore>,
        reminders: Arc<dyn LeaseReminderService>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            reminders,
            registry: SubscriptionRegistry::new(),
        }
    }

    fn root(&self) -> StorePath {
        StorePath::root(self.user_id.clone())
    }

    fn flats_path(&self) -> StorePath {
        self.root().child("flats")
    }

    fn kind_path(&self, kind: TransactionKind) -> StorePath {
        self.root().child(kind.path_segment())
    }

    fn transactions_path(&self, kind: TransactionKind, property_id: &str) -> StorePath {
        self.kind_path(kind).child(property_id)
    }

    /// Streams the property list. Every upstream change yields `Loading`
    /// followed by the decoded list, ids populated from the storage keys.
    pub fn list_properties(&self) -> Subscription<Response<Vec<Property>>> {
        observe(
            Arc::clone(&self.store),
            self.registry.clone(),
            self.flats_path(),
            |event, out| match event {
                StoreEvent::Snapshot(snapshot) => {
                    let _ = out.send(Response::Loading);
                    let properties =
                        decode_collection(&snapshot, |id, property: &mut Property| {
                            property.id = id.to_string();
                        });
                    let _ = out.send(Response::Success(properties));
                }
                StoreEvent::Error(message) => {
                    error!("property listener failed: {}", message);
                    let _ = out.send(Response::Error(message));
                }
            },
        )
    }

    /// Streams one property's rents or expenses, sorted by date descending.
    pub fn list_transactions(
        &self,
        kind: TransactionKind,
        property_id: &str,
    ) -> Subscription<Response<Vec<Transaction>>> {
        observe(
            Arc::clone(&self.store),
            self.registry.clone(),
            self.transactions_path(kind, property_id),
            |event, out| match event {
                StoreEvent::Snapshot(snapshot) => {
                    let _ = out.send(Response::Loading);
                    let mut transactions =
                        decode_collection(&snapshot, |id, record: &mut Transaction| {
                            record.id = Some(id.to_string());
                        });
                    sort_by_date_desc(&mut transactions);
                    let _ = out.send(Response::Success(transactions));
                }
                StoreEvent::Error(message) => {
                    error!("transaction listener failed: {}", message);
                    let _ = out.send(Response::Error(message));
                }
            },
        )
    }

    /// Streams the most recent rent for a property. Emits nothing while the
    /// collection is empty.
    pub fn last_rent(&self, property_id: &str) -> Subscription<Transaction> {
        observe(
            Arc::clone(&self.store),
            self.registry.clone(),
            self.transactions_path(TransactionKind::Rent, property_id),
            |event, out| match event {
                StoreEvent::Snapshot(snapshot) => {
                    let mut rents = decode_collection(&snapshot, |id, record: &mut Transaction| {
                        record.id = Some(id.to_string());
                    });
                    sort_by_date_desc(&mut rents);
                    if let Some(latest) = rents.into_iter().next() {
                        let _ = out.send(latest);
                    }
                }
                StoreEvent::Error(message) => {
                    error!("last-rent listener failed: {}", message);
                }
            },
        )
    }

    /// Live savings across all properties.
    pub fn total_savings(&self) -> SavingsStream {
        SavingsStream::new(
            self.observe_total(self.kind_path(TransactionKind::Rent), true, false),
            self.observe_total(self.kind_path(TransactionKind::Expense), true, false),
        )
    }

    /// Live savings for one property.
    pub fn total_savings_for(&self, property_id: &str) -> SavingsStream {
        SavingsStream::new(
            self.observe_total(
                self.transactions_path(TransactionKind::Rent, property_id),
                false,
                false,
            ),
            self.observe_total(
                self.transactions_path(TransactionKind::Expense, property_id),
                false,
                false,
            ),
        )
    }

    /// Live savings across all properties, restricted to the previous
    /// calendar year.
    pub fn last_year_savings(&self) -> SavingsStream {
        SavingsStream::new(
            self.observe_total(self.kind_path(TransactionKind::Rent), true, true),
            self.observe_total(self.kind_path(TransactionKind::Expense), true, true),
        )
    }

    /// One live monetary total over a transaction subtree. `nested` selects
    /// the two-level shape (`propertyId -> txId -> value`) of the
    /// all-property collections.
    fn observe_total(
        &self,
        path: StorePath,
        nested: bool,
        previous_year_only: bool,
    ) -> Subscription<Decimal> {
        observe(
            Arc::clone(&self.store),
            self.registry.clone(),
            path,
            move |event, out| match event {
                StoreEvent::Snapshot(snapshot) => {
                    let _ = out.send(collection_total(&snapshot, nested, previous_year_only));
                }
                StoreEvent::Error(message) => {
                    error!("totals listener failed: {}", message);
                }
            },
        )
    }

    /// Validates and appends a property; returns the generated id. A lessee
    /// present on a new property gets a calendar reminder one month before
    /// its lease end.
    pub async fn add_property(&self, mut property: Property) -> Result<String> {
        property.validate()?;
        let address = property.address.clone();
        self.sync_reminder(&address, None, property.lessee.as_mut())
            .await;
        let value = serde_json::to_value(&property)?;
        let id = self.store.push(&self.flats_path(), value).await?;
        debug!("added property '{}' with id {}", property.address, id);
        Ok(id)
    }

    /// Full overwrite of a property record. The id lives only in the storage
    /// key and is stripped from the written value. `previous_lessee` is the
    /// record's lessee before this edit, used to reconcile the calendar
    /// reminder against the new state.
    pub async fn update_property(
        &self,
        mut property: Property,
        previous_lessee: Option<&Lessee>,
    ) -> Result<()> {
        if property.id.is_empty() {
            return Err(Error::invalid_request(
                "cannot update a property without an id",
            ));
        }
        property.validate()?;
        let address = property.address.clone();
        self.sync_reminder(&address, previous_lessee, property.lessee.as_mut())
            .await;
        let path = self.flats_path().child(property.id.clone());
        let value = serde_json::to_value(&property)?;
        self.store.set(&path, value).await
    }

    /// Deletes a property and its transaction subtrees.
    ///
    /// Three sequential removals with no atomicity: expenses subtree, rents
    /// subtree, property record. Every step is attempted regardless of
    /// earlier failures and the report records which succeeded.
    pub async fn delete_property(&self, property: &Property) -> Result<CascadeDeleteReport> {
        if property.id.is_empty() {
            return Err(Error::invalid_request(
                "cannot delete a property without an id",
            ));
        }

        let mut report = CascadeDeleteReport::default();

        let expenses = self.transactions_path(TransactionKind::Expense, &property.id);
        match self.store.remove(&expenses).await {
            Ok(()) => report.expenses_removed = true,
            Err(err) => error!("failed to remove expenses of property {}: {}", property.id, err),
        }

        let rents = self.transactions_path(TransactionKind::Rent, &property.id);
        match self.store.remove(&rents).await {
            Ok(()) => report.rents_removed = true,
            Err(err) => error!("failed to remove rents of property {}: {}", property.id, err),
        }

        let record = self.flats_path().child(property.id.clone());
        match self.store.remove(&record).await {
            Ok(()) => report.property_removed = true,
            Err(err) => error!("failed to remove property {}: {}", property.id, err),
        }

        if report.property_removed {
            if let Some(event_id) = property
                .lessee
                .as_ref()
                .and_then(|lessee| lessee.event_id.as_deref())
            {
                if let Err(err) = self.reminders.delete_reminder(event_id).await {
                    warn!("failed to delete lease reminder {}: {}", event_id, err);
                }
            }
        }

        Ok(report)
    }

    /// Validates and appends a transaction of the given kind; returns the
    /// generated id.
    pub async fn add_transaction(
        &self,
        property_id: &str,
        kind: TransactionKind,
        transaction: Transaction,
    ) -> Result<String> {
        let check = validate_comment(&transaction.comment, kind);
        if check.is_invalid {
            return Err(Error::invalid_request(check.message));
        }
        let value = serde_json::to_value(&transaction)?;
        self.store
            .push(&self.transactions_path(kind, property_id), value)
            .await
    }

    /// Full overwrite of a transaction at its id.
    pub async fn update_transaction(
        &self,
        property_id: &str,
        kind: TransactionKind,
        transaction: Transaction,
    ) -> Result<()> {
        let Some(id) = transaction.id.as_deref() else {
            return Err(Error::invalid_request(
                "cannot update a transaction without an id",
            ));
        };
        let check = validate_comment(&transaction.comment, kind);
        if check.is_invalid {
            return Err(Error::invalid_request(check.message));
        }
        let path = self.transactions_path(kind, property_id).child(id);
        let value = serde_json::to_value(&transaction)?;
        self.store.set(&path, value).await
    }

    pub async fn delete_transaction(
        &self,
        property_id: &str,
        kind: TransactionKind,
        transaction: &Transaction,
    ) -> Result<()> {
        let Some(id) = transaction.id.as_deref() else {
            return Err(Error::invalid_request(
                "cannot delete a transaction without an id",
            ));
        };
        let path = self.transactions_path(kind, property_id).child(id);
        self.store.remove(&path).await
    }

    /// Synchronously deregisters every outstanding listener opened through
    /// this repository. In-flight single-shot writes are unaffected.
    pub fn sign_out(&self) {
        self.registry.unregister_all(self.store.as_ref());
    }

    /// Number of currently registered listeners.
    pub fn open_listeners(&self) -> usize {
        self.registry.len()
    }

    /// Mirrors a lessee's end date into the external calendar: insert when a
    /// lessee appears, update when the end date changes, delete when the
    /// lessee is removed. The reminder fires one month before the lease end
    /// and is titled with the property address. Fire and forget: failures
    /// are logged and never change the write outcome.
    async fn sync_reminder(
        &self,
        address: &str,
        previous: Option<&Lessee>,
        next: Option<&mut Lessee>,
    ) {
        match (previous, next) {
            (None, Some(lessee)) => self.insert_reminder_for(address, lessee).await,
            (Some(before), Some(lessee)) => match before.event_id.as_deref() {
                Some(event_id) => {
                    // carry the handle forward; the value overwrite would
                    // otherwise lose it
                    lessee.event_id = Some(event_id.to_string());
                    if before.end != lessee.end {
                        let text = reminder_text(address);
                        let date = reminder_date(&lessee.end);
                        if let Err(err) = self
                            .reminders
                            .update_reminder(event_id, &date, &text)
                            .await
                        {
                            warn!("failed to update lease reminder {}: {}", event_id, err);
                        }
                    }
                }
                None => self.insert_reminder_for(address, lessee).await,
            },
            (Some(before), None) => {
                if let Some(event_id) = before.event_id.as_deref() {
                    if let Err(err) = self.reminders.delete_reminder(event_id).await {
                        warn!("failed to delete lease reminder {}: {}", event_id, err);
                    }
                }
            }
            (None, None) => {}
        }
    }

    async fn insert_reminder_for(&self, address: &str, lessee: &mut Lessee) {
        let text = reminder_text(address);
        let date = reminder_date(&lessee.end);
        match self.reminders.insert_reminder(&date, &text).await {
            Ok(id) if !id.is_empty() => lessee.event_id = Some(id),
            Ok(_) => {}
            Err(err) => warn!("failed to insert lease reminder: {}", err),
        }
    }
}

fn reminder_text(address: &str) -> String {
    format!("Rent ends for {address}")
}

/// Reminder date for a lease end: one month of lead time.
fn reminder_date(end: &str) -> String {
    one_month_before(parse_date_or(end, today()))
        .format(DATE_FORMAT)
        .to_string()
}

/// Decodes a collection snapshot (a JSON map keyed by record id). A
/// malformed child is dropped and the rest of the batch survives;
/// `assign_id` populates each record's id from its key.
fn decode_collection<T, F>(snapshot: &Value, mut assign_id: F) -> Vec<T>
where
    T: DeserializeOwned,
    F: FnMut(&str, &mut T),
{
    let Some(children) = snapshot.as_object() else {
        return Vec::new();
    };
    let mut records = Vec::with_capacity(children.len());
    for (id, raw) in children {
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(mut record) => {
                assign_id(id, &mut record);
                records.push(record);
            }
            Err(err) => warn!("skipping malformed record at key {}: {}", id, err),
        }
    }
    records
}

/// Sums transaction amounts in a subtree snapshot. Absent or empty
/// snapshots total zero, so a user with rents but no expenses still gets a
/// savings emission.
fn collection_total(snapshot: &Value, nested: bool, previous_year_only: bool) -> Decimal {
    let mut transactions: Vec<Transaction> = Vec::new();
    if nested {
        if let Some(subtrees) = snapshot.as_object() {
            for subtree in subtrees.values() {
                transactions.extend(decode_collection(subtree, |_, _: &mut Transaction| {}));
            }
        }
    } else {
        transactions = decode_collection(snapshot, |_, _: &mut Transaction| {});
    }

    if previous_year_only {
        savings::total_of_in_previous_year(&transactions, today())
    } else {
        savings::total_of(&transactions)
    }
}
