//! Integration tests for `SqliteStore` and the binding protocol against an
//! in-memory database.

use std::{sync::Arc, time::Duration};

use beaconward_core::{
  DomainError as _, Error as CoreError,
  activity::{FootprintQuery, NewSighting},
  batch::{DeviceBinding, WriteBatch, WriteOp},
  binding::BindingCoordinator,
  device::{BeaconIdentity, BindingType, Device, DeviceQuery, DeviceUpdate, NewDevice},
  gateway::{GatewayKind, NewGateway},
  notification::{NewNotificationPoint, NotificationPointUpdate},
  store::TrackingStore,
  subject::{Elder, ElderUpdate, MapUser, NewElder, NewMapUser, SubjectRef},
  subscription::{LiveQuery, Snapshot, subscribe},
};
use chrono::{Duration as ChronoDuration, TimeZone as _, Utc};
use tokio::{sync::mpsc, time::timeout};
use uuid::Uuid;

use crate::{Error, SqliteStore, store::CHANGE_FEED_CAPACITY};

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

fn coordinator(s: &Arc<SqliteStore>) -> BindingCoordinator<SqliteStore> {
  BindingCoordinator::new(Arc::clone(s))
}

fn identity(minor: u16) -> BeaconIdentity {
  BeaconIdentity {
    uuid: Uuid::from_u128(0xfda5_0693_a4e2_4fb1_afcf_c6eb_0764_7825),
    major: 1,
    minor,
  }
}

async fn device(s: &SqliteStore, name: &str, minor: u16) -> Device {
  s.create_device(NewDevice {
    identity: identity(minor),
    name:     name.into(),
    notes:    None,
  })
  .await
  .unwrap()
}

async fn elder(s: &SqliteStore, name: &str) -> Elder {
  s.create_elder(NewElder { name: name.into(), notes: None })
    .await
    .unwrap()
}

async fn map_user(s: &SqliteStore, name: &str) -> MapUser {
  s.create_map_user(NewMapUser {
    display_name: name.into(),
    email:        format!("{}@example.org", name.to_lowercase()),
  })
  .await
  .unwrap()
}

fn core_err(e: &Error) -> &CoreError { e.domain().expect("domain error") }

/// Assert the one-to-one invariant over the whole store.
async fn assert_consistent(s: &SqliteStore) {
  let devices = s.list_devices(DeviceQuery::default()).await.unwrap();
  let elders = s.list_elders().await.unwrap();
  let users = s.list_map_users(true).await.unwrap();

  for d in &devices {
    let pointing: Vec<Uuid> = elders
      .iter()
      .filter(|e| e.device_id == Some(d.device_id))
      .map(|e| e.elder_id)
      .chain(
        users
          .iter()
          .filter(|u| u.bound_device_id == Some(d.device_id))
          .map(|u| u.user_id),
      )
      .collect();

    if d.binding_type.has_subject() {
      assert_eq!(pointing.len(), 1, "device {} pointers: {pointing:?}", d.name);
      assert_eq!(d.bound_to, Some(pointing[0]));
    } else {
      assert!(pointing.is_empty(), "{:?} device {} is referenced", d.binding_type, d.name);
      assert_eq!(d.bound_to, None);
    }
  }

  for e in &elders {
    if let Some(id) = e.device_id {
      let d = devices.iter().find(|d| d.device_id == id).expect("pointer target");
      assert_eq!(d.bound_to, Some(e.elder_id));
      assert_eq!(d.binding_type, BindingType::Elder);
    }
  }
  for u in &users {
    if let Some(id) = u.bound_device_id {
      let d = devices.iter().find(|d| d.device_id == id).expect("pointer target");
      assert_eq!(d.bound_to, Some(u.user_id));
      assert_eq!(d.binding_type, BindingType::MapUser);
    }
  }
}

// ─── Devices ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_device() {
  let s = store().await;
  let d = device(&s, "  Beacon 7  ", 7).await;

  assert_eq!(d.name, "Beacon 7");
  assert_eq!(d.binding_type, BindingType::Unbound);
  assert_eq!(d.bound_to, None);
  assert_eq!(d.bound_at, None);

  let fetched = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(fetched, d);

  let by_identity = s.find_device_by_identity(identity(7)).await.unwrap().unwrap();
  assert_eq!(by_identity.device_id, d.device_id);
}

#[tokio::test]
async fn get_device_missing_returns_none() {
  let s = store().await;
  assert!(s.get_device(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.find_device_by_identity(identity(99)).await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_identity_is_rejected() {
  let s = store().await;
  device(&s, "first", 1).await;

  let err = s
    .create_device(NewDevice { identity: identity(1), name: "second".into(), notes: None })
    .await
    .unwrap_err();
  assert_eq!(core_err(&err), &CoreError::DeviceAlreadyRegistered(identity(1)));
  assert_eq!(s.list_devices(DeviceQuery::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_devices_filters_and_pages() {
  let s = store().await;
  let c = coordinator(&s);
  let a = device(&s, "a", 1).await;
  device(&s, "b", 2).await;
  device(&s, "c", 3).await;
  c.bind_anonymous(a.device_id).await.unwrap();

  let unbound = s
    .list_devices(DeviceQuery { binding_type: Some(BindingType::Unbound), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(unbound.len(), 2);
  assert!(unbound.iter().all(|d| d.binding_type == BindingType::Unbound));

  let page = s
    .list_devices(DeviceQuery { limit: Some(1), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].name, "b");
}

#[tokio::test]
async fn update_device_fields() {
  let s = store().await;
  let d = device(&s, "old", 1).await;

  let updated = s
    .update_device(d.device_id, DeviceUpdate {
      name:  Some("new".into()),
      notes: Some(Some("charged 2026-10".into())),
    })
    .await
    .unwrap();
  assert_eq!(updated.name, "new");
  assert_eq!(updated.notes.as_deref(), Some("charged 2026-10"));

  // Absent field keeps, explicit null clears.
  let cleared = s
    .update_device(d.device_id, DeviceUpdate { name: None, notes: Some(None) })
    .await
    .unwrap();
  assert_eq!(cleared.name, "new");
  assert_eq!(cleared.notes, None);
}

#[tokio::test]
async fn update_missing_device_is_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();
  let err = s
    .update_device(id, DeviceUpdate { name: Some("x".into()), notes: None })
    .await
    .unwrap_err();
  assert_eq!(core_err(&err), &CoreError::DeviceNotFound(id));
}

#[tokio::test]
async fn empty_device_update_writes_nothing() {
  let s = store().await;
  let d = device(&s, "quiet", 1).await;
  let mut feed = s.changes();

  let same = s.update_device(d.device_id, DeviceUpdate::default()).await.unwrap();
  assert_eq!(same, d);
  assert!(feed.try_recv().is_err());

  let missing = Uuid::new_v4();
  let err = s.update_device(missing, DeviceUpdate::default()).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::DeviceNotFound(missing));
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn elder_crud() {
  let s = store().await;
  let e = elder(&s, "Ada").await;
  assert_eq!(e.device_id, None);

  let updated = s
    .update_elder(e.elder_id, ElderUpdate { name: Some("Ada L.".into()), notes: None })
    .await
    .unwrap();
  assert_eq!(updated.name, "Ada L.");
  assert_eq!(s.list_elders().await.unwrap().len(), 1);

  let missing = Uuid::new_v4();
  let err = s.update_elder(missing, ElderUpdate::default()).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::ElderNotFound(missing));
}

#[tokio::test]
async fn list_map_users_hides_deleted_by_default() {
  let s = store().await;
  let c = coordinator(&s);
  let keep = map_user(&s, "Keep").await;
  let gone = map_user(&s, "Gone").await;
  c.retire_map_user(gone.user_id).await.unwrap();

  let active = s.list_map_users(false).await.unwrap();
  assert_eq!(active.len(), 1);
  assert_eq!(active[0].user_id, keep.user_id);
  assert_eq!(s.list_map_users(true).await.unwrap().len(), 2);
}

// ─── Binding protocol ────────────────────────────────────────────────────────

#[tokio::test]
async fn bind_sets_both_sides() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;

  let bound = c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();
  assert_eq!(bound.binding_type, BindingType::Elder);
  assert_eq!(bound.bound_to, Some(e.elder_id));
  assert!(bound.bound_at.is_some());

  let e = s.get_elder(e.elder_id).await.unwrap().unwrap();
  assert_eq!(e.device_id, Some(d.device_id));
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_is_idempotent() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let u = map_user(&s, "U").await;
  let subject = SubjectRef::map_user(u.user_id);

  let first = c.bind(d.device_id, subject).await.unwrap();
  let second = c.bind(d.device_id, subject).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(s.get_device(d.device_id).await.unwrap().unwrap(), first);
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_moves_device_between_elders() {
  // dev1 bound to elder1, then bound to elder2.
  let s = store().await;
  let c = coordinator(&s);
  let dev1 = device(&s, "dev1", 1).await;
  let elder1 = elder(&s, "elder1").await;
  let elder2 = elder(&s, "elder2").await;

  c.bind(dev1.device_id, SubjectRef::elder(elder1.elder_id)).await.unwrap();
  let dev1 = c.bind(dev1.device_id, SubjectRef::elder(elder2.elder_id)).await.unwrap();

  assert_eq!(dev1.binding_type, BindingType::Elder);
  assert_eq!(dev1.bound_to, Some(elder2.elder_id));
  let elder1 = s.get_elder(elder1.elder_id).await.unwrap().unwrap();
  let elder2 = s.get_elder(elder2.elder_id).await.unwrap().unwrap();
  assert_eq!(elder1.device_id, None);
  assert_eq!(elder2.device_id, Some(dev1.device_id));
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_swap_releases_both_old_partners() {
  // A→X, B→Y; bind(A, Y) ⇒ A→Y, B unbound, X cleared.
  let s = store().await;
  let c = coordinator(&s);
  let a = device(&s, "A", 1).await;
  let b = device(&s, "B", 2).await;
  let x = elder(&s, "X").await;
  let y = elder(&s, "Y").await;

  c.bind(a.device_id, SubjectRef::elder(x.elder_id)).await.unwrap();
  c.bind(b.device_id, SubjectRef::elder(y.elder_id)).await.unwrap();
  c.bind(a.device_id, SubjectRef::elder(y.elder_id)).await.unwrap();

  let a = s.get_device(a.device_id).await.unwrap().unwrap();
  let b = s.get_device(b.device_id).await.unwrap().unwrap();
  let x = s.get_elder(x.elder_id).await.unwrap().unwrap();
  let y = s.get_elder(y.elder_id).await.unwrap().unwrap();

  assert_eq!(a.bound_to, Some(y.elder_id));
  assert_eq!(b.binding_type, BindingType::Unbound);
  assert_eq!(b.bound_to, None);
  assert_eq!(b.bound_at, None);
  assert_eq!(x.device_id, None);
  assert_eq!(y.device_id, Some(a.device_id));
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_across_subject_kinds() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  let u = map_user(&s, "U").await;

  c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();
  let d = c.bind(d.device_id, SubjectRef::map_user(u.user_id)).await.unwrap();

  assert_eq!(d.binding_type, BindingType::MapUser);
  assert_eq!(d.bound_to, Some(u.user_id));
  assert_eq!(s.get_elder(e.elder_id).await.unwrap().unwrap().device_id, None);
  assert_eq!(
    s.get_map_user(u.user_id).await.unwrap().unwrap().bound_device_id,
    Some(d.device_id)
  );
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_rejects_missing_and_deleted_parties() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let u = map_user(&s, "U").await;

  let ghost = Uuid::new_v4();
  let err = c.bind(ghost, SubjectRef::map_user(u.user_id)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::DeviceNotFound(ghost));

  let err = c.bind(d.device_id, SubjectRef::elder(ghost)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::ElderNotFound(ghost));

  let err = c.bind(d.device_id, SubjectRef::map_user(ghost)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::UserNotFound(ghost));

  let err = c.bind(Uuid::nil(), SubjectRef::map_user(u.user_id)).await.unwrap_err();
  assert!(matches!(core_err(&err), CoreError::Validation { field: "deviceId", .. }));

  c.retire_map_user(u.user_id).await.unwrap();
  let err = c.bind(d.device_id, SubjectRef::map_user(u.user_id)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::AccountDeleted(u.user_id));

  let d = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(d.binding_type, BindingType::Unbound);
}

#[tokio::test]
async fn unbind_clears_both_sides() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();

  let d = c.unbind(d.device_id).await.unwrap();
  assert_eq!(d.binding_type, BindingType::Unbound);
  assert_eq!(d.bound_to, None);
  assert_eq!(d.bound_at, None);
  assert_eq!(s.get_elder(e.elder_id).await.unwrap().unwrap().device_id, None);

  // Second unbind is a no-op.
  assert_eq!(c.unbind(d.device_id).await.unwrap(), d);
  assert_consistent(&s).await;
}

#[tokio::test]
async fn bind_anonymous_releases_subject() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let u = map_user(&s, "U").await;
  c.bind(d.device_id, SubjectRef::map_user(u.user_id)).await.unwrap();

  let d = c.bind_anonymous(d.device_id).await.unwrap();
  assert_eq!(d.binding_type, BindingType::Anonymous);
  assert_eq!(d.bound_to, None);
  assert!(d.bound_at.is_some());
  assert_eq!(s.get_map_user(u.user_id).await.unwrap().unwrap().bound_device_id, None);
  assert_consistent(&s).await;
}

#[tokio::test]
async fn retire_map_user_releases_device() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let u = map_user(&s, "U").await;
  c.bind(d.device_id, SubjectRef::map_user(u.user_id)).await.unwrap();

  let u = c.retire_map_user(u.user_id).await.unwrap();
  assert!(u.deleted);
  assert_eq!(u.bound_device_id, None);
  let d = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(d.binding_type, BindingType::Unbound);

  let err = c.retire_map_user(u.user_id).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::AccountDeleted(u.user_id));
  assert_consistent(&s).await;
}

#[tokio::test]
async fn remove_elder_releases_device() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();

  c.remove_elder(e.elder_id).await.unwrap();
  assert!(s.get_elder(e.elder_id).await.unwrap().is_none());
  let d = s.get_device(d.device_id).await.unwrap().unwrap();
  assert_eq!(d.binding_type, BindingType::Unbound);

  let err = c.remove_elder(e.elder_id).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::ElderNotFound(e.elder_id));
  assert_consistent(&s).await;
}

// ─── Atomic batches ──────────────────────────────────────────────────────────

#[tokio::test]
async fn failing_batch_writes_nothing() {
  let s = store().await;
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  let missing = Uuid::new_v4();

  let mut batch = WriteBatch::new();
  batch
    .set_subject_device(SubjectRef::elder(e.elder_id), Some(d.device_id))
    .set_device_binding(d.device_id, DeviceBinding::Subject(SubjectRef::elder(e.elder_id)))
    .push(WriteOp::MarkMapUserDeleted { user_id: missing });

  let err = s.apply(batch).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::UserNotFound(missing));

  assert_eq!(s.get_device(d.device_id).await.unwrap().unwrap(), d);
  assert_eq!(s.get_elder(e.elder_id).await.unwrap().unwrap(), e);
  assert_consistent(&s).await;
}

#[tokio::test]
async fn empty_batch_is_ok() {
  let s = store().await;
  s.apply(WriteBatch::new()).await.unwrap();
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn token_digest_resolves_to_user() {
  let s = store().await;
  let u = map_user(&s, "U").await;

  s.store_token(u.user_id, "abc123".into()).await.unwrap();
  assert_eq!(s.resolve_token("abc123".into()).await.unwrap(), Some(u.user_id));
  assert_eq!(s.resolve_token("nope".into()).await.unwrap(), None);

  let ghost = Uuid::new_v4();
  let err = s.store_token(ghost, "x".into()).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::UserNotFound(ghost));
}

// ─── Notification points ─────────────────────────────────────────────────────

#[tokio::test]
async fn notification_point_lifecycle() {
  let s = store().await;
  let u = map_user(&s, "U").await;
  let g1 = s
    .create_gateway(NewGateway {
      name:      "Front door".into(),
      kind:      GatewayKind::Fixed,
      location:  Some("Lobby".into()),
      latitude:  None,
      longitude: None,
    })
    .await
    .unwrap();
  let g2 = s
    .create_gateway(NewGateway {
      name:      "Van".into(),
      kind:      GatewayKind::Mobile,
      location:  None,
      latitude:  Some(52.52),
      longitude: Some(13.40),
    })
    .await
    .unwrap();

  let p = s
    .add_notification_point(u.user_id, NewNotificationPoint {
      gateway_id:      g1.gateway_id,
      name:            "Home".into(),
      notify_on_enter: true,
      notify_on_leave: false,
    })
    .await
    .unwrap();
  assert_eq!(s.list_notification_points(u.user_id).await.unwrap(), vec![p.clone()]);

  let updated = s
    .update_notification_point(p.point_id, NotificationPointUpdate {
      gateway_id:      Some(g2.gateway_id),
      notify_on_leave: Some(true),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(updated.gateway_id, g2.gateway_id);
  assert_eq!(updated.name, "Home");
  assert!(updated.notify_on_enter && updated.notify_on_leave);
  assert!(updated.updated_at >= p.updated_at);

  let ghost = Uuid::new_v4();
  let err = s
    .update_notification_point(p.point_id, NotificationPointUpdate {
      gateway_id: Some(ghost),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert_eq!(core_err(&err), &CoreError::GatewayNotFound(ghost));

  s.remove_notification_point(p.point_id).await.unwrap();
  assert!(s.get_notification_point(p.point_id).await.unwrap().is_none());
  let err = s.remove_notification_point(p.point_id).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::NotificationPointNotFound(p.point_id));
}

#[tokio::test]
async fn notification_point_requires_both_ends() {
  let s = store().await;
  let u = map_user(&s, "U").await;
  let ghost = Uuid::new_v4();
  let input = |gateway_id: Uuid| NewNotificationPoint {
    gateway_id,
    name: "x".into(),
    notify_on_enter: true,
    notify_on_leave: false,
  };

  let err = s.add_notification_point(u.user_id, input(ghost)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::GatewayNotFound(ghost));

  let err = s.add_notification_point(ghost, input(ghost)).await.unwrap_err();
  assert_eq!(core_err(&err), &CoreError::UserNotFound(ghost));
}

// ─── Sightings ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sightings_snapshot_subject_and_build_footprint() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  let g = s
    .create_gateway(NewGateway {
      name:      "Hall".into(),
      kind:      GatewayKind::Fixed,
      location:  None,
      latitude:  None,
      longitude: None,
    })
    .await
    .unwrap();

  let t0 = Utc::now() - ChronoDuration::hours(3);
  let sighting = |offset: i64| NewSighting {
    identity: identity(1),
    rssi:     -60,
    seen_at:  Some(t0 + ChronoDuration::hours(offset)),
  };

  // Before binding: no subject attributed.
  let before = s.record_sighting(g.gateway_id, sighting(0)).await.unwrap();
  assert_eq!(before.subject, None);

  c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();
  let first = s.record_sighting(g.gateway_id, sighting(1)).await.unwrap();
  let second = s.record_sighting(g.gateway_id, sighting(2)).await.unwrap();
  assert_eq!(first.subject, Some(SubjectRef::elder(e.elder_id)));
  assert_eq!(first.device_id, d.device_id);

  let all = s.footprint(FootprintQuery::new(e.elder_id)).await.unwrap();
  assert_eq!(
    all.iter().map(|x| x.sighting_id).collect::<Vec<_>>(),
    vec![second.sighting_id, first.sighting_id]
  );

  let windowed = s
    .footprint(FootprintQuery {
      to: Some(t0 + ChronoDuration::minutes(90)),
      ..FootprintQuery::new(e.elder_id)
    })
    .await
    .unwrap();
  assert_eq!(windowed.len(), 1);
  assert_eq!(windowed[0].sighting_id, first.sighting_id);

  let limited = s
    .footprint(FootprintQuery { limit: Some(1), ..FootprintQuery::new(e.elder_id) })
    .await
    .unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].sighting_id, second.sighting_id);
}

#[tokio::test]
async fn sighting_of_unknown_beacon_is_rejected() {
  let s = store().await;
  let g = s
    .create_gateway(NewGateway {
      name:      "Hall".into(),
      kind:      GatewayKind::Fixed,
      location:  None,
      latitude:  None,
      longitude: None,
    })
    .await
    .unwrap();

  let err = s
    .record_sighting(g.gateway_id, NewSighting { identity: identity(42), rssi: -70, seen_at: None })
    .await
    .unwrap_err();
  assert_eq!(core_err(&err), &CoreError::BeaconNotRegistered(identity(42)));

  let ghost = Uuid::new_v4();
  let err = s
    .record_sighting(ghost, NewSighting { identity: identity(42), rssi: -70, seen_at: None })
    .await
    .unwrap_err();
  assert_eq!(core_err(&err), &CoreError::GatewayNotFound(ghost));
}

#[tokio::test]
async fn out_of_range_sighting_time_is_rejected_and_not_stored() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();
  let g = s
    .create_gateway(NewGateway {
      name:      "Porch".into(),
      kind:      GatewayKind::Fixed,
      location:  None,
      latitude:  None,
      longitude: None,
    })
    .await
    .unwrap();

  let far = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
  let err = s
    .record_sighting(g.gateway_id, NewSighting {
      identity: identity(1),
      rssi:     -55,
      seen_at:  Some(far),
    })
    .await
    .unwrap_err();
  assert!(matches!(
    core_err(&err),
    CoreError::Validation { field: "seenAt", .. }
  ));

  // The footprint stays readable and holds only valid sightings.
  let ok = s
    .record_sighting(g.gateway_id, NewSighting { identity: identity(1), rssi: -55, seen_at: None })
    .await
    .unwrap();
  let footprint = s.footprint(FootprintQuery::new(e.elder_id)).await.unwrap();
  assert_eq!(footprint, vec![ok]);
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

async fn next_snapshot(rx: &mut mpsc::UnboundedReceiver<Snapshot>) -> Option<Snapshot> {
  timeout(Duration::from_secs(2), rx.recv()).await.ok().flatten()
}

#[tokio::test]
async fn subscription_delivers_initial_and_changed_snapshots() {
  let s = store().await;
  let (tx, mut rx) = mpsc::unbounded_channel();

  let sub = subscribe(Arc::clone(&s), LiveQuery::Elders, move |snapshot| {
    let _ = tx.send(snapshot);
  });

  assert_eq!(next_snapshot(&mut rx).await, Some(Snapshot::Elders(Vec::new())));

  let e = elder(&s, "e").await;
  assert_eq!(next_snapshot(&mut rx).await, Some(Snapshot::Elders(vec![e])));

  // Changes to other collections do not trigger a reload.
  device(&s, "d", 1).await;
  assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());

  assert!(sub.is_active());
  sub.unsubscribe();
  elder(&s, "after").await;
  assert_eq!(next_snapshot(&mut rx).await, None);
}

#[tokio::test]
async fn device_subscription_sees_binding_batch() {
  let s = store().await;
  let c = coordinator(&s);
  let d = device(&s, "d", 1).await;
  let e = elder(&s, "e").await;
  let (tx, mut rx) = mpsc::unbounded_channel();

  let _sub = subscribe(
    Arc::clone(&s),
    LiveQuery::Devices(DeviceQuery {
      binding_type: Some(BindingType::Elder),
      ..Default::default()
    }),
    move |snapshot| {
      let _ = tx.send(snapshot);
    },
  );
  assert_eq!(next_snapshot(&mut rx).await, Some(Snapshot::Devices(Vec::new())));

  let bound = c.bind(d.device_id, SubjectRef::elder(e.elder_id)).await.unwrap();

  // A batch publishes one change per op; the last delivery reflects the commit.
  let mut last = None;
  while let Ok(Some(snapshot)) = timeout(Duration::from_millis(200), rx.recv()).await {
    last = Some(snapshot);
  }
  assert_eq!(last, Some(Snapshot::Devices(vec![bound])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn lagging_subscriber_reloads_instead_of_failing() {
  let s = store().await;
  let (tx, mut rx) = mpsc::unbounded_channel();
  let (release, gate) = std::sync::mpsc::channel::<()>();

  // The callback holds its worker until `release` is dropped, so the feed
  // overflows while it is stuck.
  let sub = subscribe(Arc::clone(&s), LiveQuery::Elders, move |snapshot| {
    let _ = tx.send(snapshot);
    let _ = gate.recv();
  });
  assert_eq!(next_snapshot(&mut rx).await, Some(Snapshot::Elders(Vec::new())));

  let total = CHANGE_FEED_CAPACITY + 44;
  for i in 0..total {
    elder(&s, &format!("elder {i}")).await;
  }
  drop(release);

  let mut deliveries = 0;
  let mut last = None;
  while let Ok(Some(snapshot)) = timeout(Duration::from_millis(300), rx.recv()).await {
    deliveries += 1;
    last = Some(snapshot);
  }

  let Some(Snapshot::Elders(elders)) = &last else {
    panic!("expected an elder snapshot after the overflow, got {last:?}");
  };
  assert_eq!(elders.len(), total);
  // Skipped changes collapse into a single reload.
  assert!(deliveries <= CHANGE_FEED_CAPACITY + 1, "{deliveries} deliveries");
  assert!(sub.is_active());
}
