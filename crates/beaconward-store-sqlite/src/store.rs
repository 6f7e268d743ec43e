//! [`SqliteStore`], the SQLite implementation of [`TrackingStore`].

use std::path::Path;

use beaconward_core::{
  activity::{FootprintQuery, NewSighting, Sighting},
  batch::{Collection, DeviceBinding, WriteBatch, WriteOp},
  device::{BeaconIdentity, BindingType, Device, DeviceQuery, DeviceUpdate, NewDevice},
  gateway::{Gateway, NewGateway},
  notification::{NewNotificationPoint, NotificationPoint, NotificationPointUpdate},
  store::TrackingStore,
  subject::{Elder, ElderUpdate, MapUser, MapUserUpdate, NewElder, NewMapUser, SubjectKind},
  subscription::Change,
};
use rusqlite::{OptionalExtension as _, Row, Transaction, types::Value};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RawDevice, RawElder, RawGateway, RawMapUser, RawNotificationPoint, RawSighting,
    decode_binding_type, decode_uuid, encode_binding_type, encode_dt, encode_gateway_kind,
    encode_subject_kind, encode_uuid, normalize_dt, now,
  },
  schema::SCHEMA,
};

type CoreError = beaconward_core::Error;

/// Outcome of a closure run on the database thread: the outer result is a
/// database failure, the inner one a domain failure detected in SQL.
type Checked<T> = std::result::Result<T, CoreError>;

pub(crate) const CHANGE_FEED_CAPACITY: usize = 256;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A beaconward document store backed by a single SQLite file.
///
/// Cloning is cheap; the connection and the change feed are shared.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  changes: broadcast::Sender<Change>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
    let store = Self { conn, changes };
    store
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  fn publish(&self, changes: impl IntoIterator<Item = Change>) {
    for change in changes {
      // Err only means nobody is subscribed right now.
      let _ = self.changes.send(change);
    }
  }

  /// Run a SELECT and decode every row.
  async fn select<R, T>(
    &self,
    sql: String,
    args: Vec<Value>,
    from_row: fn(&Row<'_>) -> rusqlite::Result<R>,
    decode: fn(R) -> Result<T>,
  ) -> Result<Vec<T>>
  where
    R: Send + 'static,
  {
    let raws: Vec<R> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(args), from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(decode).collect()
  }

  async fn select_devices(&self, filter: &str, args: Vec<Value>) -> Result<Vec<Device>> {
    let sql = format!("SELECT {} FROM devices {filter}", RawDevice::COLUMNS);
    self.select(sql, args, RawDevice::from_row, RawDevice::into_device).await
  }

  async fn select_elders(&self, filter: &str, args: Vec<Value>) -> Result<Vec<Elder>> {
    let sql = format!("SELECT {} FROM elders {filter}", RawElder::COLUMNS);
    self.select(sql, args, RawElder::from_row, RawElder::into_elder).await
  }

  async fn select_map_users(&self, filter: &str, args: Vec<Value>) -> Result<Vec<MapUser>> {
    let sql = format!("SELECT {} FROM map_users {filter}", RawMapUser::COLUMNS);
    self.select(sql, args, RawMapUser::from_row, RawMapUser::into_map_user).await
  }

  async fn select_gateways(&self, filter: &str, args: Vec<Value>) -> Result<Vec<Gateway>> {
    let sql = format!("SELECT {} FROM gateways {filter}", RawGateway::COLUMNS);
    self.select(sql, args, RawGateway::from_row, RawGateway::into_gateway).await
  }

  async fn select_points(
    &self,
    filter: &str,
    args: Vec<Value>,
  ) -> Result<Vec<NotificationPoint>> {
    let sql = format!(
      "SELECT {} FROM notification_points {filter}",
      RawNotificationPoint::COLUMNS
    );
    self
      .select(sql, args, RawNotificationPoint::from_row, RawNotificationPoint::into_point)
      .await
  }
}

fn text(s: impl Into<String>) -> Value { Value::Text(s.into()) }

fn uuid_arg(id: Uuid) -> Value { text(encode_uuid(id)) }

/// `LIMIT ? OFFSET ?` arguments; SQLite treats a negative limit as "no limit".
fn page_args(limit: Option<usize>, offset: Option<usize>) -> [Value; 2] {
  let to_i64 = |n: usize| i64::try_from(n).unwrap_or(i64::MAX);
  [
    Value::Integer(limit.map(to_i64).unwrap_or(-1)),
    Value::Integer(offset.map(to_i64).unwrap_or(0)),
  ]
}

fn row_exists(tx: &rusqlite::Connection, sql: &str, id: &str) -> rusqlite::Result<bool> {
  Ok(tx.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

// ─── Batch application ───────────────────────────────────────────────────────

/// Apply one op inside the batch transaction. `stamp` is the commit time
/// used for `bound_at`.
fn apply_op(tx: &Transaction<'_>, op: &WriteOp, stamp: &str) -> rusqlite::Result<Checked<()>> {
  match *op {
    WriteOp::SetDeviceBinding { device_id, binding } => {
      let (binding_type, bound_to, bound_at) = match binding {
        DeviceBinding::Unbound => (BindingType::Unbound, None, None),
        DeviceBinding::Subject(subject) => (
          subject.kind.binding_type(),
          Some(encode_uuid(subject.id)),
          Some(stamp),
        ),
        DeviceBinding::Anonymous => (BindingType::Anonymous, None, Some(stamp)),
      };
      let n = tx.execute(
        "UPDATE devices SET binding_type = ?2, bound_to = ?3, bound_at = ?4
         WHERE device_id = ?1",
        rusqlite::params![
          encode_uuid(device_id),
          encode_binding_type(binding_type),
          bound_to,
          bound_at,
        ],
      )?;
      Ok(if n == 0 { Err(CoreError::DeviceNotFound(device_id)) } else { Ok(()) })
    }

    WriteOp::SetSubjectDevice { subject, device_id } => {
      let pointer = device_id.map(encode_uuid);
      let id = encode_uuid(subject.id);
      let (n, missing) = match subject.kind {
        SubjectKind::Elder => (
          tx.execute(
            "UPDATE elders SET device_id = ?2 WHERE elder_id = ?1",
            rusqlite::params![id, pointer],
          )?,
          CoreError::ElderNotFound(subject.id),
        ),
        SubjectKind::MapUser => (
          tx.execute(
            "UPDATE map_users SET bound_device_id = ?2 WHERE user_id = ?1",
            rusqlite::params![id, pointer],
          )?,
          CoreError::UserNotFound(subject.id),
        ),
      };
      Ok(if n == 0 { Err(missing) } else { Ok(()) })
    }

    WriteOp::MarkMapUserDeleted { user_id } => {
      let n = tx.execute(
        "UPDATE map_users SET deleted = 1 WHERE user_id = ?1",
        [encode_uuid(user_id)],
      )?;
      Ok(if n == 0 { Err(CoreError::UserNotFound(user_id)) } else { Ok(()) })
    }

    WriteOp::DeleteElder { elder_id } => {
      let n = tx.execute("DELETE FROM elders WHERE elder_id = ?1", [encode_uuid(elder_id)])?;
      Ok(if n == 0 { Err(CoreError::ElderNotFound(elder_id)) } else { Ok(()) })
    }
  }
}

// ─── TrackingStore impl ──────────────────────────────────────────────────────

impl TrackingStore for SqliteStore {
  type Error = crate::Error;

  // ── Devices ───────────────────────────────────────────────────────────────

  async fn create_device(&self, input: NewDevice) -> Result<Device> {
    let device = Device {
      device_id:    Uuid::new_v4(),
      identity:     input.identity,
      name:         input.name.trim().to_owned(),
      notes:        input.notes,
      binding_type: BindingType::Unbound,
      bound_to:     None,
      bound_at:     None,
      created_at:   now(),
    };

    let id_str     = encode_uuid(device.device_id);
    let beacon_str = encode_uuid(device.identity.uuid);
    let major      = device.identity.major;
    let minor      = device.identity.minor;
    let name       = device.name.clone();
    let notes      = device.notes.clone();
    let at_str     = encode_dt(device.created_at);

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO devices (device_id, beacon_uuid, major, minor, name, notes, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (beacon_uuid, major, minor) DO NOTHING",
          rusqlite::params![id_str, beacon_str, major, minor, name, notes, at_str],
        )?;
        Ok(n == 1)
      })
      .await?;

    if !inserted {
      return Err(CoreError::DeviceAlreadyRegistered(device.identity).into());
    }

    self.publish([Change::new(Collection::Devices, device.device_id)]);
    Ok(device)
  }

  async fn get_device(&self, id: Uuid) -> Result<Option<Device>> {
    Ok(
      self
        .select_devices("WHERE device_id = ?", vec![uuid_arg(id)])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn find_device_by_identity(&self, identity: BeaconIdentity) -> Result<Option<Device>> {
    let args = vec![
      uuid_arg(identity.uuid),
      Value::Integer(identity.major.into()),
      Value::Integer(identity.minor.into()),
    ];
    Ok(
      self
        .select_devices("WHERE beacon_uuid = ? AND major = ? AND minor = ?", args)
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_devices(&self, query: DeviceQuery) -> Result<Vec<Device>> {
    let mut filter = String::new();
    let mut args = Vec::new();
    if let Some(binding_type) = query.binding_type {
      filter.push_str("WHERE binding_type = ? ");
      args.push(text(encode_binding_type(binding_type)));
    }
    filter.push_str("ORDER BY created_at, rowid LIMIT ? OFFSET ?");
    args.extend(page_args(query.limit, query.offset));

    self.select_devices(&filter, args).await
  }

  async fn devices_bound_to(&self, subject_id: Uuid) -> Result<Vec<Device>> {
    self
      .select_devices("WHERE bound_to = ? ORDER BY device_id", vec![uuid_arg(subject_id)])
      .await
  }

  async fn update_device(&self, id: Uuid, update: DeviceUpdate) -> Result<Device> {
    if update.is_empty() {
      return self
        .get_device(id)
        .await?
        .ok_or_else(|| CoreError::DeviceNotFound(id).into());
    }

    let id_str    = encode_uuid(id);
    let name      = update.name.map(|n| n.trim().to_owned());
    let set_notes = update.notes.is_some();
    let notes     = update.notes.flatten();

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE devices
           SET name  = COALESCE(?2, name),
               notes = CASE WHEN ?3 THEN ?4 ELSE notes END
           WHERE device_id = ?1",
          rusqlite::params![id_str, name, set_notes, notes],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(CoreError::DeviceNotFound(id).into());
    }
    self.publish([Change::new(Collection::Devices, id)]);

    self
      .get_device(id)
      .await?
      .ok_or_else(|| CoreError::DeviceNotFound(id).into())
  }

  // ── Elders ────────────────────────────────────────────────────────────────

  async fn create_elder(&self, input: NewElder) -> Result<Elder> {
    let elder = Elder {
      elder_id:   Uuid::new_v4(),
      name:       input.name.trim().to_owned(),
      notes:      input.notes,
      device_id:  None,
      created_at: now(),
    };

    let id_str = encode_uuid(elder.elder_id);
    let name   = elder.name.clone();
    let notes  = elder.notes.clone();
    let at_str = encode_dt(elder.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO elders (elder_id, name, notes, created_at) VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, notes, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish([Change::new(Collection::Elders, elder.elder_id)]);
    Ok(elder)
  }

  async fn get_elder(&self, id: Uuid) -> Result<Option<Elder>> {
    Ok(
      self
        .select_elders("WHERE elder_id = ?", vec![uuid_arg(id)])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_elders(&self) -> Result<Vec<Elder>> {
    self.select_elders("ORDER BY created_at, rowid", Vec::new()).await
  }

  async fn update_elder(&self, id: Uuid, update: ElderUpdate) -> Result<Elder> {
    let id_str    = encode_uuid(id);
    let name      = update.name.map(|n| n.trim().to_owned());
    let set_notes = update.notes.is_some();
    let notes     = update.notes.flatten();

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE elders
           SET name  = COALESCE(?2, name),
               notes = CASE WHEN ?3 THEN ?4 ELSE notes END
           WHERE elder_id = ?1",
          rusqlite::params![id_str, name, set_notes, notes],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(CoreError::ElderNotFound(id).into());
    }
    self.publish([Change::new(Collection::Elders, id)]);

    self
      .get_elder(id)
      .await?
      .ok_or_else(|| CoreError::ElderNotFound(id).into())
  }

  async fn elders_with_device(&self, device_id: Uuid) -> Result<Vec<Elder>> {
    self
      .select_elders("WHERE device_id = ? ORDER BY elder_id", vec![uuid_arg(device_id)])
      .await
  }

  // ── Map app users ─────────────────────────────────────────────────────────

  async fn create_map_user(&self, input: NewMapUser) -> Result<MapUser> {
    let user = MapUser {
      user_id:         Uuid::new_v4(),
      display_name:    input.display_name.trim().to_owned(),
      email:           input.email.trim().to_owned(),
      bound_device_id: None,
      deleted:         false,
      created_at:      now(),
    };

    let id_str = encode_uuid(user.user_id);
    let name   = user.display_name.clone();
    let email  = user.email.clone();
    let at_str = encode_dt(user.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO map_users (user_id, display_name, email, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, name, email, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish([Change::new(Collection::MapUsers, user.user_id)]);
    Ok(user)
  }

  async fn get_map_user(&self, id: Uuid) -> Result<Option<MapUser>> {
    Ok(
      self
        .select_map_users("WHERE user_id = ?", vec![uuid_arg(id)])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_map_users(&self, include_deleted: bool) -> Result<Vec<MapUser>> {
    let filter = if include_deleted {
      "ORDER BY created_at, rowid"
    } else {
      "WHERE deleted = 0 ORDER BY created_at, rowid"
    };
    self.select_map_users(filter, Vec::new()).await
  }

  async fn update_map_user(&self, id: Uuid, update: MapUserUpdate) -> Result<MapUser> {
    let id_str = encode_uuid(id);
    let name   = update.display_name.map(|n| n.trim().to_owned());
    let email  = update.email.map(|e| e.trim().to_owned());

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE map_users
           SET display_name = COALESCE(?2, display_name),
               email        = COALESCE(?3, email)
           WHERE user_id = ?1",
          rusqlite::params![id_str, name, email],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(CoreError::UserNotFound(id).into());
    }
    self.publish([Change::new(Collection::MapUsers, id)]);

    self
      .get_map_user(id)
      .await?
      .ok_or_else(|| CoreError::UserNotFound(id).into())
  }

  async fn map_users_with_device(&self, device_id: Uuid) -> Result<Vec<MapUser>> {
    self
      .select_map_users(
        "WHERE bound_device_id = ? ORDER BY user_id",
        vec![uuid_arg(device_id)],
      )
      .await
  }

  // ── Bearer tokens ─────────────────────────────────────────────────────────

  async fn store_token(&self, user_id: Uuid, token_digest: String) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let at_str   = encode_dt(now());

    let outcome: Checked<()> = self
      .conn
      .call(move |conn| {
        if !row_exists(conn, "SELECT 1 FROM map_users WHERE user_id = ?1", &user_str)? {
          return Ok(Err(CoreError::UserNotFound(user_id)));
        }
        conn.execute(
          "INSERT INTO api_tokens (token_digest, user_id, issued_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![token_digest, user_str, at_str],
        )?;
        Ok(Ok(()))
      })
      .await?;

    Ok(outcome?)
  }

  async fn resolve_token(&self, token_digest: String) -> Result<Option<Uuid>> {
    let user: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id FROM api_tokens WHERE token_digest = ?1",
              [token_digest],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    user.as_deref().map(decode_uuid).transpose()
  }

  // ── Gateways ──────────────────────────────────────────────────────────────

  async fn create_gateway(&self, input: NewGateway) -> Result<Gateway> {
    let gateway = Gateway {
      gateway_id: Uuid::new_v4(),
      name:       input.name.trim().to_owned(),
      kind:       input.kind,
      location:   input.location,
      latitude:   input.latitude,
      longitude:  input.longitude,
      created_at: now(),
    };

    let id_str   = encode_uuid(gateway.gateway_id);
    let name     = gateway.name.clone();
    let kind_str = encode_gateway_kind(gateway.kind);
    let location = gateway.location.clone();
    let lat      = gateway.latitude;
    let lon      = gateway.longitude;
    let at_str   = encode_dt(gateway.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO gateways (gateway_id, name, kind, location, latitude, longitude, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![id_str, name, kind_str, location, lat, lon, at_str],
        )?;
        Ok(())
      })
      .await?;

    self.publish([Change::new(Collection::Gateways, gateway.gateway_id)]);
    Ok(gateway)
  }

  async fn get_gateway(&self, id: Uuid) -> Result<Option<Gateway>> {
    Ok(
      self
        .select_gateways("WHERE gateway_id = ?", vec![uuid_arg(id)])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_gateways(&self) -> Result<Vec<Gateway>> {
    self.select_gateways("ORDER BY name, gateway_id", Vec::new()).await
  }

  // ── Notification points ───────────────────────────────────────────────────

  async fn add_notification_point(
    &self,
    user_id: Uuid,
    input: NewNotificationPoint,
  ) -> Result<NotificationPoint> {
    let at = now();
    let point = NotificationPoint {
      point_id:        Uuid::new_v4(),
      user_id,
      gateway_id:      input.gateway_id,
      name:            input.name.trim().to_owned(),
      notify_on_enter: input.notify_on_enter,
      notify_on_leave: input.notify_on_leave,
      created_at:      at,
      updated_at:      at,
    };

    let id_str      = encode_uuid(point.point_id);
    let user_str    = encode_uuid(user_id);
    let gateway_id  = point.gateway_id;
    let gateway_str = encode_uuid(gateway_id);
    let name        = point.name.clone();
    let on_enter    = point.notify_on_enter;
    let on_leave    = point.notify_on_leave;
    let at_str      = encode_dt(at);

    let outcome: Checked<()> = self
      .conn
      .call(move |conn| {
        let deleted: Option<bool> = conn
          .query_row(
            "SELECT deleted FROM map_users WHERE user_id = ?1",
            [&user_str],
            |r| r.get(0),
          )
          .optional()?;
        match deleted {
          None => return Ok(Err(CoreError::UserNotFound(user_id))),
          Some(true) => return Ok(Err(CoreError::AccountDeleted(user_id))),
          Some(false) => {}
        }
        if !row_exists(conn, "SELECT 1 FROM gateways WHERE gateway_id = ?1", &gateway_str)? {
          return Ok(Err(CoreError::GatewayNotFound(gateway_id)));
        }
        conn.execute(
          "INSERT INTO notification_points (
             point_id, user_id, gateway_id, name,
             notify_on_enter, notify_on_leave, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
          rusqlite::params![id_str, user_str, gateway_str, name, on_enter, on_leave, at_str],
        )?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    self.publish([Change::new(Collection::NotificationPoints, point.point_id)]);
    Ok(point)
  }

  async fn get_notification_point(&self, id: Uuid) -> Result<Option<NotificationPoint>> {
    Ok(
      self
        .select_points("WHERE point_id = ?", vec![uuid_arg(id)])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn list_notification_points(&self, user_id: Uuid) -> Result<Vec<NotificationPoint>> {
    self
      .select_points(
        "WHERE user_id = ? ORDER BY created_at, rowid",
        vec![uuid_arg(user_id)],
      )
      .await
  }

  async fn update_notification_point(
    &self,
    id: Uuid,
    update: NotificationPointUpdate,
  ) -> Result<NotificationPoint> {
    let id_str      = encode_uuid(id);
    let gateway_id  = update.gateway_id;
    let gateway_str = gateway_id.map(encode_uuid);
    let name        = update.name.map(|n| n.trim().to_owned());
    let on_enter    = update.notify_on_enter;
    let on_leave    = update.notify_on_leave;
    let at_str      = encode_dt(now());

    let outcome: Checked<()> = self
      .conn
      .call(move |conn| {
        if !row_exists(conn, "SELECT 1 FROM notification_points WHERE point_id = ?1", &id_str)? {
          return Ok(Err(CoreError::NotificationPointNotFound(id)));
        }
        if let (Some(gateway_id), Some(gateway_str)) = (gateway_id, &gateway_str)
          && !row_exists(conn, "SELECT 1 FROM gateways WHERE gateway_id = ?1", gateway_str)?
        {
          return Ok(Err(CoreError::GatewayNotFound(gateway_id)));
        }
        conn.execute(
          "UPDATE notification_points
           SET gateway_id      = COALESCE(?2, gateway_id),
               name            = COALESCE(?3, name),
               notify_on_enter = COALESCE(?4, notify_on_enter),
               notify_on_leave = COALESCE(?5, notify_on_leave),
               updated_at      = ?6
           WHERE point_id = ?1",
          rusqlite::params![id_str, gateway_str, name, on_enter, on_leave, at_str],
        )?;
        Ok(Ok(()))
      })
      .await?;
    outcome?;

    self.publish([Change::new(Collection::NotificationPoints, id)]);

    self
      .get_notification_point(id)
      .await?
      .ok_or_else(|| CoreError::NotificationPointNotFound(id).into())
  }

  async fn remove_notification_point(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM notification_points WHERE point_id = ?1", [id_str])?)
      })
      .await?;

    if n == 0 {
      return Err(CoreError::NotificationPointNotFound(id).into());
    }
    self.publish([Change::new(Collection::NotificationPoints, id)]);
    Ok(())
  }

  // ── Sightings ─────────────────────────────────────────────────────────────

  async fn record_sighting(&self, gateway_id: Uuid, input: NewSighting) -> Result<Sighting> {
    input.validate()?;

    let identity    = input.identity;
    let sighting_id = encode_uuid(Uuid::new_v4());
    let gateway_str = encode_uuid(gateway_id);
    let beacon_str  = encode_uuid(identity.uuid);
    let rssi        = input.rssi;
    let seen_at     = encode_dt(input.seen_at.map(normalize_dt).unwrap_or_else(now));

    let outcome: Result<Sighting> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !row_exists(&tx, "SELECT 1 FROM gateways WHERE gateway_id = ?1", &gateway_str)? {
          return Ok(Err(Error::Core(CoreError::GatewayNotFound(gateway_id))));
        }

        let device: Option<(String, String, Option<String>)> = tx
          .query_row(
            "SELECT device_id, binding_type, bound_to FROM devices
             WHERE beacon_uuid = ?1 AND major = ?2 AND minor = ?3",
            rusqlite::params![beacon_str, identity.major, identity.minor],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
          )
          .optional()?;
        let Some((device_id, binding_type, bound_to)) = device else {
          return Ok(Err(Error::Core(CoreError::BeaconNotRegistered(identity))));
        };

        let binding_type = match decode_binding_type(&binding_type) {
          Ok(t) => t,
          Err(e) => return Ok(Err(e)),
        };
        let subject_kind = SubjectKind::from_binding_type(binding_type).map(encode_subject_kind);
        let subject_id = subject_kind.and(bound_to);

        tx.execute(
          "INSERT INTO sightings (
             sighting_id, device_id, gateway_id, subject_kind, subject_id, rssi, seen_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            sighting_id,
            device_id,
            gateway_str,
            subject_kind,
            subject_id,
            rssi,
            seen_at,
          ],
        )?;

        // Decode before commit so an unreadable row is never left behind.
        let sighting = RawSighting {
          sighting_id,
          device_id,
          gateway_id: gateway_str,
          subject_kind: subject_kind.map(str::to_owned),
          subject_id,
          rssi,
          seen_at,
        }
        .into_sighting();
        if sighting.is_ok() {
          tx.commit()?;
        }
        Ok(sighting)
      })
      .await?;

    let sighting = outcome?;
    self.publish([Change::new(Collection::Sightings, sighting.sighting_id)]);
    Ok(sighting)
  }

  async fn footprint(&self, query: FootprintQuery) -> Result<Vec<Sighting>> {
    let mut filter = String::from("WHERE subject_id = ?");
    let mut args = vec![uuid_arg(query.subject_id)];
    if let Some(from) = query.from {
      filter.push_str(" AND seen_at >= ?");
      args.push(text(encode_dt(normalize_dt(from))));
    }
    if let Some(to) = query.to {
      filter.push_str(" AND seen_at <= ?");
      args.push(text(encode_dt(normalize_dt(to))));
    }
    filter.push_str(" ORDER BY seen_at DESC, rowid DESC LIMIT ?");
    let [limit, _] = page_args(Some(query.effective_limit()), None);
    args.push(limit);

    let sql = format!("SELECT {} FROM sightings {filter}", RawSighting::COLUMNS);
    self.select(sql, args, RawSighting::from_row, RawSighting::into_sighting).await
  }

  // ── Atomic writes ─────────────────────────────────────────────────────────

  async fn apply(&self, batch: WriteBatch) -> Result<()> {
    if batch.is_empty() {
      return Ok(());
    }

    let ops   = batch.into_ops();
    let stamp = encode_dt(now());

    let outcome: Checked<Vec<Change>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut changes = Vec::with_capacity(ops.len());
        for op in &ops {
          if let Err(e) = apply_op(&tx, op, &stamp)? {
            // Dropping `tx` rolls back everything applied so far.
            return Ok(Err(e));
          }
          let (collection, id) = op.target();
          changes.push(Change::new(collection, id));
        }
        tx.commit()?;
        Ok(Ok(changes))
      })
      .await?;

    let changes = outcome?;
    debug!(ops = changes.len(), "write batch committed");
    self.publish(changes);
    Ok(())
  }

  fn changes(&self) -> broadcast::Receiver<Change> { self.changes.subscribe() }
}
