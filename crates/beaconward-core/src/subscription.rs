//! Live query subscriptions.
//!
//! Stores publish a [`Change`] for every committed write. [`subscribe`]
//! turns that feed into snapshots: the callback gets the query's full result
//! once up front and again after every change to the collection the query
//! reads. Dropping or [`Subscription::unsubscribe`]-ing the handle stops it.

use std::sync::Arc;

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  batch::Collection,
  device::{Device, DeviceQuery},
  gateway::Gateway,
  notification::NotificationPoint,
  store::TrackingStore,
  subject::{Elder, MapUser},
};

/// A committed write to one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
  pub collection: Collection,
  pub id:         Uuid,
}

impl Change {
  pub fn new(collection: Collection, id: Uuid) -> Self { Self { collection, id } }
}

/// What a subscription watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveQuery {
  Devices(DeviceQuery),
  Elders,
  MapUsers { include_deleted: bool },
  Gateways,
  NotificationPoints { user_id: Uuid },
}

/// One delivery to a subscriber: the query's complete current result.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
  Devices(Vec<Device>),
  Elders(Vec<Elder>),
  MapUsers(Vec<MapUser>),
  Gateways(Vec<Gateway>),
  NotificationPoints(Vec<NotificationPoint>),
}

impl LiveQuery {
  pub fn collection(&self) -> Collection {
    match self {
      Self::Devices(_) => Collection::Devices,
      Self::Elders => Collection::Elders,
      Self::MapUsers { .. } => Collection::MapUsers,
      Self::Gateways => Collection::Gateways,
      Self::NotificationPoints { .. } => Collection::NotificationPoints,
    }
  }

  pub fn matches(&self, change: &Change) -> bool { change.collection == self.collection() }

  async fn load<S: TrackingStore>(&self, store: &S) -> Result<Snapshot, S::Error> {
    Ok(match self {
      Self::Devices(query) => Snapshot::Devices(store.list_devices(query.clone()).await?),
      Self::Elders => Snapshot::Elders(store.list_elders().await?),
      Self::MapUsers { include_deleted } => {
        Snapshot::MapUsers(store.list_map_users(*include_deleted).await?)
      }
      Self::Gateways => Snapshot::Gateways(store.list_gateways().await?),
      Self::NotificationPoints { user_id } => {
        Snapshot::NotificationPoints(store.list_notification_points(*user_id).await?)
      }
    })
  }
}

/// Handle to a running subscription. Delivery stops when it is dropped.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
  task: JoinHandle<()>,
}

impl Subscription {
  pub fn unsubscribe(self) {}

  pub fn is_active(&self) -> bool { !self.task.is_finished() }
}

impl Drop for Subscription {
  fn drop(&mut self) { self.task.abort(); }
}

/// Register `on_snapshot` for `query`. Must be called inside a tokio
/// runtime.
pub fn subscribe<S, F>(store: Arc<S>, query: LiveQuery, mut on_snapshot: F) -> Subscription
where
  S: TrackingStore + 'static,
  F: FnMut(Snapshot) + Send + 'static,
{
  // Subscribe before the initial load so no change between the two is lost.
  let mut changes = store.changes();

  let task = tokio::spawn(async move {
    let mut reload = true;
    loop {
      if reload {
        match query.load(store.as_ref()).await {
          Ok(snapshot) => on_snapshot(snapshot),
          Err(e) => warn!(error = %e, ?query, "failed to load live query snapshot"),
        }
      }

      reload = match changes.recv().await {
        Ok(change) => query.matches(&change),
        Err(RecvError::Lagged(skipped)) => {
          debug!(skipped, "subscriber lagged behind change feed; reloading");
          true
        }
        Err(RecvError::Closed) => break,
      };
    }
  });

  Subscription { task }
}
