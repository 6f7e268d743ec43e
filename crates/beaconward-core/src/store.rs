//! The `TrackingStore` trait, the document store every other layer talks to.
//!
//! Implemented by storage backends (e.g. `beaconward-store-sqlite`). The
//! binding coordinator and the HTTP layer depend on this abstraction only.
//!
//! Three capabilities matter to the binding protocol: get-by-id,
//! query-by-field-equality (`devices_bound_to`, `elders_with_device`,
//! `map_users_with_device`) and the atomic [`TrackingStore::apply`].

use std::future::Future;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  DomainError,
  activity::{FootprintQuery, NewSighting, Sighting},
  batch::WriteBatch,
  device::{BeaconIdentity, Device, DeviceQuery, DeviceUpdate, NewDevice},
  gateway::{Gateway, NewGateway},
  notification::{NewNotificationPoint, NotificationPoint, NotificationPointUpdate},
  subject::{Elder, ElderUpdate, MapUser, MapUserUpdate, NewElder, NewMapUser},
  subscription::Change,
};

/// Abstraction over a document store backend.
///
/// Inputs are expected to have been validated by the caller. Not-found
/// conditions on updates surface as the matching [`crate::Error`] variant
/// wrapped in `Self::Error`; plain lookups return `Ok(None)`.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait TrackingStore: Send + Sync {
  type Error: DomainError;

  // ── Devices ───────────────────────────────────────────────────────────

  /// Register a new, unbound device. Fails with
  /// [`crate::Error::DeviceAlreadyRegistered`] if the beacon identity is
  /// taken.
  fn create_device(
    &self,
    input: NewDevice,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  fn get_device(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn find_device_by_identity(
    &self,
    identity: BeaconIdentity,
  ) -> impl Future<Output = Result<Option<Device>, Self::Error>> + Send + '_;

  fn list_devices(
    &self,
    query: DeviceQuery,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  /// All devices whose `bound_to` equals `subject_id`.
  fn devices_bound_to(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Device>, Self::Error>> + Send + '_;

  fn update_device(
    &self,
    id: Uuid,
    update: DeviceUpdate,
  ) -> impl Future<Output = Result<Device, Self::Error>> + Send + '_;

  // ── Elders ────────────────────────────────────────────────────────────

  fn create_elder(
    &self,
    input: NewElder,
  ) -> impl Future<Output = Result<Elder, Self::Error>> + Send + '_;

  fn get_elder(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Elder>, Self::Error>> + Send + '_;

  fn list_elders(&self) -> impl Future<Output = Result<Vec<Elder>, Self::Error>> + Send + '_;

  fn update_elder(
    &self,
    id: Uuid,
    update: ElderUpdate,
  ) -> impl Future<Output = Result<Elder, Self::Error>> + Send + '_;

  /// All elders whose `device_id` equals `device_id`.
  fn elders_with_device(
    &self,
    device_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Elder>, Self::Error>> + Send + '_;

  // ── Map app users ─────────────────────────────────────────────────────

  fn create_map_user(
    &self,
    input: NewMapUser,
  ) -> impl Future<Output = Result<MapUser, Self::Error>> + Send + '_;

  fn get_map_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MapUser>, Self::Error>> + Send + '_;

  fn list_map_users(
    &self,
    include_deleted: bool,
  ) -> impl Future<Output = Result<Vec<MapUser>, Self::Error>> + Send + '_;

  fn update_map_user(
    &self,
    id: Uuid,
    update: MapUserUpdate,
  ) -> impl Future<Output = Result<MapUser, Self::Error>> + Send + '_;

  /// All map users whose `bound_device_id` equals `device_id`.
  fn map_users_with_device(
    &self,
    device_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MapUser>, Self::Error>> + Send + '_;

  // ── Bearer tokens ─────────────────────────────────────────────────────

  /// Remember the digest of a freshly issued bearer token for `user_id`.
  /// The plaintext token never reaches the store.
  fn store_token(
    &self,
    user_id: Uuid,
    token_digest: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Resolve a token digest to the user it was issued to.
  fn resolve_token(
    &self,
    token_digest: String,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  // ── Gateways ──────────────────────────────────────────────────────────

  fn create_gateway(
    &self,
    input: NewGateway,
  ) -> impl Future<Output = Result<Gateway, Self::Error>> + Send + '_;

  fn get_gateway(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Gateway>, Self::Error>> + Send + '_;

  fn list_gateways(&self) -> impl Future<Output = Result<Vec<Gateway>, Self::Error>> + Send + '_;

  // ── Notification points ───────────────────────────────────────────────

  /// Fails with `UserNotFound` / `GatewayNotFound` if either end of the
  /// join is missing.
  fn add_notification_point(
    &self,
    user_id: Uuid,
    input: NewNotificationPoint,
  ) -> impl Future<Output = Result<NotificationPoint, Self::Error>> + Send + '_;

  fn get_notification_point(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<NotificationPoint>, Self::Error>> + Send + '_;

  fn list_notification_points(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<NotificationPoint>, Self::Error>> + Send + '_;

  fn update_notification_point(
    &self,
    id: Uuid,
    update: NotificationPointUpdate,
  ) -> impl Future<Output = Result<NotificationPoint, Self::Error>> + Send + '_;

  fn remove_notification_point(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Sightings ─────────────────────────────────────────────────────────

  /// Record that `gateway_id` heard a beacon. Fails with
  /// `BeaconNotRegistered` if no device carries the identity.
  fn record_sighting(
    &self,
    gateway_id: Uuid,
    input: NewSighting,
  ) -> impl Future<Output = Result<Sighting, Self::Error>> + Send + '_;

  /// Sightings attributed to a subject, newest first.
  fn footprint(
    &self,
    query: FootprintQuery,
  ) -> impl Future<Output = Result<Vec<Sighting>, Self::Error>> + Send + '_;

  // ── Atomic writes ─────────────────────────────────────────────────────

  /// Commit every op in `batch` or none of them.
  fn apply(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Change feed ───────────────────────────────────────────────────────

  /// A receiver of change events for every write committed from now on.
  fn changes(&self) -> broadcast::Receiver<Change>;
}
