//! The binding coordinator. Keeps device ↔ subject links one-to-one.
//!
//! A binding is stored twice: on the device (`binding_type`, `bound_to`,
//! `bound_at`) and on the subject (its device pointer). Every operation here
//! reads the current links, then expresses the whole change as a single
//! [`WriteBatch`] so readers never observe one side updated without the
//! other.
//!
//! There is no compare-and-swap between the reads and the commit. Two
//! callers racing to bind the same device both succeed and the last commit
//! wins.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error,
  batch::{DeviceBinding, WriteBatch, WriteOp},
  device::{BindingType, Device},
  store::TrackingStore,
  subject::{MapUser, SubjectKind, SubjectRef},
};

pub struct BindingCoordinator<S> {
  store: Arc<S>,
}

impl<S> Clone for BindingCoordinator<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: TrackingStore> BindingCoordinator<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Bind `device_id` to `subject`, releasing whatever either side was
  /// bound to before.
  ///
  /// Returns the device as committed. Binding a pair that already points
  /// at each other changes nothing and still succeeds.
  pub async fn bind(&self, device_id: Uuid, subject: SubjectRef) -> Result<Device, S::Error> {
    require_id("deviceId", device_id)?;
    require_id("subject.id", subject.id)?;

    let device = self.require_device(device_id).await?;
    let pointer = self.subject_pointer(subject).await?;

    if device.bound_to == Some(subject.id)
      && device.binding_type == subject.kind.binding_type()
      && pointer == Some(device_id)
    {
      debug!(%device_id, %subject, "binding already in place");
      return Ok(device);
    }

    let mut batch = WriteBatch::new();

    for other in self.subjects_pointing_at(device_id).await? {
      if other != subject {
        batch.clear_subject(other);
      }
    }

    for other in self.store.devices_bound_to(subject.id).await? {
      if other.device_id != device_id {
        batch.clear_device(other.device_id);
      }
    }

    batch
      .set_subject_device(subject, Some(device_id))
      .set_device_binding(device_id, DeviceBinding::Subject(subject));

    let ops = batch.len();
    self.store.apply(batch).await?;
    info!(%device_id, %subject, ops, "device bound");

    self.require_device(device_id).await
  }

  /// Return `device_id` to UNBOUND and clear every subject pointer at it.
  pub async fn unbind(&self, device_id: Uuid) -> Result<Device, S::Error> {
    require_id("deviceId", device_id)?;

    let device = self.require_device(device_id).await?;
    let pointing = self.subjects_pointing_at(device_id).await?;

    if device.binding_type == BindingType::Unbound && pointing.is_empty() {
      debug!(%device_id, "device already unbound");
      return Ok(device);
    }

    let mut batch = WriteBatch::new();
    for subject in pointing {
      batch.clear_subject(subject);
    }
    batch.clear_device(device_id);

    self.store.apply(batch).await?;
    info!(%device_id, previous = ?device.bound_to, "device unbound");

    self.require_device(device_id).await
  }

  /// Mark `device_id` as handed out anonymously, releasing any subject.
  pub async fn bind_anonymous(&self, device_id: Uuid) -> Result<Device, S::Error> {
    require_id("deviceId", device_id)?;

    let device = self.require_device(device_id).await?;
    let pointing = self.subjects_pointing_at(device_id).await?;

    if device.binding_type == BindingType::Anonymous && pointing.is_empty() {
      debug!(%device_id, "device already anonymous");
      return Ok(device);
    }

    let mut batch = WriteBatch::new();
    for subject in pointing {
      batch.clear_subject(subject);
    }
    batch.set_device_binding(device_id, DeviceBinding::Anonymous);

    self.store.apply(batch).await?;
    info!(%device_id, "device marked anonymous");

    self.require_device(device_id).await
  }

  /// Soft-delete a map user and release their device in the same batch.
  pub async fn retire_map_user(&self, user_id: Uuid) -> Result<MapUser, S::Error> {
    let user = self
      .store
      .get_map_user(user_id)
      .await?
      .ok_or(Error::UserNotFound(user_id))?;
    user.ensure_active()?;

    let subject = SubjectRef::map_user(user_id);
    let mut batch = WriteBatch::new();
    for device in self.store.devices_bound_to(user_id).await? {
      batch.clear_device(device.device_id);
    }
    batch
      .clear_subject(subject)
      .push(WriteOp::MarkMapUserDeleted { user_id });

    self.store.apply(batch).await?;
    info!(%user_id, "map user retired");

    self
      .store
      .get_map_user(user_id)
      .await?
      .ok_or_else(|| Error::UserNotFound(user_id).into())
  }

  /// Delete an elder and release its device in the same batch.
  pub async fn remove_elder(&self, elder_id: Uuid) -> Result<(), S::Error> {
    if self.store.get_elder(elder_id).await?.is_none() {
      return Err(Error::ElderNotFound(elder_id).into());
    }

    let mut batch = WriteBatch::new();
    for device in self.store.devices_bound_to(elder_id).await? {
      batch.clear_device(device.device_id);
    }
    batch.push(WriteOp::DeleteElder { elder_id });

    self.store.apply(batch).await?;
    info!(%elder_id, "elder removed");
    Ok(())
  }

  // ── Helpers ─────────────────────────────────────────────────────────────

  async fn require_device(&self, device_id: Uuid) -> Result<Device, S::Error> {
    self
      .store
      .get_device(device_id)
      .await?
      .ok_or_else(|| Error::DeviceNotFound(device_id).into())
  }

  /// The subject's current device pointer; fails if the subject is missing
  /// or is a deleted account.
  async fn subject_pointer(&self, subject: SubjectRef) -> Result<Option<Uuid>, S::Error> {
    match subject.kind {
      SubjectKind::Elder => {
        let elder = self
          .store
          .get_elder(subject.id)
          .await?
          .ok_or(Error::ElderNotFound(subject.id))?;
        Ok(elder.device_id)
      }
      SubjectKind::MapUser => {
        let user = self
          .store
          .get_map_user(subject.id)
          .await?
          .ok_or(Error::UserNotFound(subject.id))?;
        user.ensure_active()?;
        Ok(user.bound_device_id)
      }
    }
  }

  async fn subjects_pointing_at(&self, device_id: Uuid) -> Result<Vec<SubjectRef>, S::Error> {
    let elders = self.store.elders_with_device(device_id).await?;
    let users = self.store.map_users_with_device(device_id).await?;
    Ok(
      elders
        .into_iter()
        .map(|e| SubjectRef::elder(e.elder_id))
        .chain(users.into_iter().map(|u| SubjectRef::map_user(u.user_id)))
        .collect(),
    )
  }
}

fn require_id(field: &'static str, id: Uuid) -> Result<(), Error> {
  if id.is_nil() {
    return Err(Error::validation(field, "is required"));
  }
  Ok(())
}
