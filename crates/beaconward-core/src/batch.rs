//! Atomic multi-document writes.
//!
//! A [`WriteBatch`] is an ordered list of [`WriteOp`]s that a store must
//! commit together or not at all. Every op targets a document that must
//! already exist; a missing target aborts the whole batch with the matching
//! not-found error.
//!
//! Binding state is only ever changed through batches, which is what keeps
//! the device and subject sides of a binding from drifting apart.

use uuid::Uuid;

use crate::subject::{SubjectKind, SubjectRef};

/// The binding half of a device document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceBinding {
  Unbound,
  /// Bound to a subject; the store stamps `bound_at` at commit time.
  Subject(SubjectRef),
  /// Marked anonymous; the store stamps `bound_at` at commit time.
  Anonymous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
  /// Overwrite `binding_type`, `bound_to` and `bound_at` of a device.
  SetDeviceBinding {
    device_id: Uuid,
    binding:   DeviceBinding,
  },
  /// Overwrite a subject's device pointer (`device_id` on an elder,
  /// `bound_device_id` on a map user).
  SetSubjectDevice {
    subject:   SubjectRef,
    device_id: Option<Uuid>,
  },
  /// Soft-delete a map user.
  MarkMapUserDeleted { user_id: Uuid },
  /// Hard-delete an elder.
  DeleteElder { elder_id: Uuid },
}

impl WriteOp {
  /// The document this op writes.
  pub fn target(&self) -> (Collection, Uuid) {
    match *self {
      Self::SetDeviceBinding { device_id, .. } => (Collection::Devices, device_id),
      Self::SetSubjectDevice { subject, .. } => (Collection::for_subject(subject.kind), subject.id),
      Self::MarkMapUserDeleted { user_id } => (Collection::MapUsers, user_id),
      Self::DeleteElder { elder_id } => (Collection::Elders, elder_id),
    }
  }
}

/// Document collections, used to address change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
  Devices,
  Elders,
  MapUsers,
  Gateways,
  NotificationPoints,
  Sightings,
}

impl Collection {
  pub fn for_subject(kind: SubjectKind) -> Self {
    match kind {
      SubjectKind::Elder => Self::Elders,
      SubjectKind::MapUser => Self::MapUsers,
    }
  }
}

/// An ordered set of writes committed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
  ops: Vec<WriteOp>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn push(&mut self, op: WriteOp) -> &mut Self {
    self.ops.push(op);
    self
  }

  pub fn set_device_binding(&mut self, device_id: Uuid, binding: DeviceBinding) -> &mut Self {
    self.push(WriteOp::SetDeviceBinding { device_id, binding })
  }

  pub fn clear_device(&mut self, device_id: Uuid) -> &mut Self {
    self.set_device_binding(device_id, DeviceBinding::Unbound)
  }

  pub fn set_subject_device(&mut self, subject: SubjectRef, device_id: Option<Uuid>) -> &mut Self {
    self.push(WriteOp::SetSubjectDevice { subject, device_id })
  }

  pub fn clear_subject(&mut self, subject: SubjectRef) -> &mut Self {
    self.set_subject_device(subject, None)
  }

  pub fn into_ops(self) -> Vec<WriteOp> { self.ops }

  pub fn len(&self) -> usize { self.ops.len() }

  pub fn is_empty(&self) -> bool { self.ops.is_empty() }
}
