//! Row-level change feed pushed to open sessions.
//!
//! Every committed mutation of a hosted table is published as a [`RowChange`].
//! Consumers open a [`Subscription`] with a [`SubscriptionFilter`] and read
//! [`FeedItem`]s: either row changes or channel status signals.
//!
//! Delivery is at-most-once. A subscriber that falls behind loses events and
//! is told so with [`ChannelStatus::ChannelError`]; it is expected to resync.
//! There is no event id, so replayed events cannot be deduplicated.

pub mod channel;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

pub use channel::{ChannelAction, ChannelEvent, ChannelSignal, ChannelState, ManagedChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level notification. `new` is set for inserts and updates, `old`
/// for updates and deletes. What `old` carries depends on the table's
/// replica identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowChange {
    pub table: String,
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    pub new: Option<Value>,
    pub old: Option<Value>,
    pub commit_timestamp: DateTime<Utc>,
}

impl RowChange {
    pub fn new_field(&self, column: &str) -> Option<&Value> {
        self.new.as_ref().and_then(|row| row.get(column))
    }

    pub fn old_field(&self, column: &str) -> Option<&Value> {
        self.old.as_ref().and_then(|row| row.get(column))
    }

    /// The row a column filter is evaluated against.
    fn filter_row(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref(),
        }
    }
}

/// What the old row of an UPDATE/DELETE carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicaIdentity {
    /// Primary key only.
    #[default]
    Default,
    /// Every column.
    Full,
}

impl ReplicaIdentity {
    pub fn old_row(&self, row: Value) -> Value {
        match self {
            ReplicaIdentity::Full => row,
            ReplicaIdentity::Default => {
                let id = row.get("id").cloned().unwrap_or(Value::Null);
                serde_json::json!({ "id": id })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnFilter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

impl ColumnFilter {
    fn matches(&self, row: Option<&Value>) -> bool {
        let Some(row) = row else { return false };
        match self {
            ColumnFilter::Eq { column, value } => row.get(column) == Some(value),
            ColumnFilter::In { column, values } => {
                row.get(column).is_some_and(|v| values.contains(v))
            }
        }
    }
}

/// Table, event kinds and optional column filter for one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionFilter {
    pub table: String,
    pub kinds: Vec<ChangeKind>,
    pub column: Option<ColumnFilter>,
}

impl SubscriptionFilter {
    /// All event kinds on a table.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            kinds: vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete],
            column: None,
        }
    }

    pub fn only(mut self, kinds: &[ChangeKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn column_in<I, S>(mut self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.column = Some(ColumnFilter::In {
            column: column.into(),
            values: values.into_iter().map(|v| Value::String(v.into())).collect(),
        });
        self
    }

    pub fn column_eq(mut self, column: impl Into<String>, value: Value) -> Self {
        self.column = Some(ColumnFilter::Eq { column: column.into(), value });
        self
    }

    pub fn matches(&self, change: &RowChange) -> bool {
        change.table == self.table
            && self.kinds.contains(&change.kind)
            && self
                .column
                .as_ref()
                .map_or(true, |f| f.matches(change.filter_row()))
    }
}

/// Terminal and health states reported by a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    ChannelError,
    TimedOut,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Status(ChannelStatus),
    Change(RowChange),
}

/// Publisher side of the change feed, shared by every table actor.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<RowChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, change: RowChange) {
        // No subscribers is not an error: nobody is watching.
        if self.sender.send(change).is_err() {
            debug!("Change published with no open subscription");
        }
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
            announced: false,
            closed: false,
        }
    }
}

/// Receiving side of one subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<RowChange>,
    filter: SubscriptionFilter,
    announced: bool,
    closed: bool,
}

impl Subscription {
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Next status signal or matching change. Returns `None` once the
    /// `Closed` status has been delivered.
    pub async fn next(&mut self) -> Option<FeedItem> {
        if !self.announced {
            self.announced = true;
            return Some(FeedItem::Status(ChannelStatus::Subscribed));
        }
        if self.closed {
            return None;
        }
        loop {
            match self.receiver.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(FeedItem::Change(change)),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(table = %self.filter.table, skipped, "Subscription lagged, events dropped");
                    return Some(FeedItem::Status(ChannelStatus::ChannelError));
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.closed = true;
                    return Some(FeedItem::Status(ChannelStatus::Closed));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(kind: ChangeKind, new: Option<Value>, old: Option<Value>) -> RowChange {
        RowChange {
            table: "produits".into(),
            kind,
            new,
            old,
            commit_timestamp: Utc::now(),
        }
    }

    #[test]
    fn filter_matches_table_kind_and_column() {
        let filter = SubscriptionFilter::table("produits")
            .only(&[ChangeKind::Update])
            .column_in("id", ["p1", "p2"]);

        assert!(filter.matches(&change(ChangeKind::Update, Some(json!({"id": "p1"})), None)));
        assert!(!filter.matches(&change(ChangeKind::Update, Some(json!({"id": "p3"})), None)));
        assert!(!filter.matches(&change(ChangeKind::Insert, Some(json!({"id": "p1"})), None)));

        let mut other_table = change(ChangeKind::Update, Some(json!({"id": "p1"})), None);
        other_table.table = "commandes".into();
        assert!(!filter.matches(&other_table));
    }

    #[test]
    fn delete_filters_on_old_row() {
        let filter = SubscriptionFilter::table("produits").column_eq("id", json!("p1"));
        assert!(filter.matches(&change(ChangeKind::Delete, None, Some(json!({"id": "p1"})))));
    }

    #[test]
    fn default_identity_keeps_only_id() {
        let row = json!({"id": "c1", "statut": "En attente"});
        assert_eq!(ReplicaIdentity::Default.old_row(row.clone()), json!({"id": "c1"}));
        assert_eq!(ReplicaIdentity::Full.old_row(row.clone()), row);
    }

    #[tokio::test]
    async fn subscription_announces_then_delivers_matching_changes() {
        let feed = ChangeFeed::new(8);
        let mut sub = feed.subscribe(SubscriptionFilter::table("produits").column_in("id", ["p1"]));

        feed.publish(change(ChangeKind::Update, Some(json!({"id": "p2"})), None));
        feed.publish(change(ChangeKind::Update, Some(json!({"id": "p1"})), None));

        assert_eq!(sub.next().await, Some(FeedItem::Status(ChannelStatus::Subscribed)));
        match sub.next().await {
            Some(FeedItem::Change(c)) => assert_eq!(c.new_field("id"), Some(&json!("p1"))),
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[tokio::test]
    async fn lagging_subscription_reports_channel_error() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(SubscriptionFilter::table("produits"));
        for i in 0..5 {
            feed.publish(change(ChangeKind::Insert, Some(json!({"id": format!("p{}", i)})), None));
        }
        assert_eq!(sub.next().await, Some(FeedItem::Status(ChannelStatus::Subscribed)));
        assert_eq!(sub.next().await, Some(FeedItem::Status(ChannelStatus::ChannelError)));
        assert!(matches!(sub.next().await, Some(FeedItem::Change(_))));
    }

    #[tokio::test]
    async fn dropped_feed_closes_subscription() {
        let feed = ChangeFeed::new(2);
        let mut sub = feed.subscribe(SubscriptionFilter::table("produits"));
        drop(feed);
        assert_eq!(sub.next().await, Some(FeedItem::Status(ChannelStatus::Subscribed)));
        assert_eq!(sub.next().await, Some(FeedItem::Status(ChannelStatus::Closed)));
        assert_eq!(sub.next().await, None);
    }
}
