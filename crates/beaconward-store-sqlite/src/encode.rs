//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with
//! microsecond precision, so lexical order is chronological order. UUIDs are
//! stored as hyphenated lowercase strings.

use beaconward_core::{
  activity::Sighting,
  device::{BeaconIdentity, BindingType, Device},
  gateway::{Gateway, GatewayKind},
  notification::NotificationPoint,
  subject::{Elder, MapUser, SubjectKind, SubjectRef},
};
use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Truncate to the precision the store keeps.
pub fn normalize_dt(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

/// Current server time at store precision.
pub fn now() -> DateTime<Utc> { normalize_dt(Utc::now()) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_binding_type(t: BindingType) -> &'static str {
  match t {
    BindingType::Unbound => "UNBOUND",
    BindingType::Elder => "ELDER",
    BindingType::MapUser => "MAP_USER",
    BindingType::Anonymous => "ANONYMOUS",
  }
}

pub fn decode_binding_type(s: &str) -> Result<BindingType> {
  match s {
    "UNBOUND" => Ok(BindingType::Unbound),
    "ELDER" => Ok(BindingType::Elder),
    "MAP_USER" => Ok(BindingType::MapUser),
    "ANONYMOUS" => Ok(BindingType::Anonymous),
    other => Err(Error::Decode { column: "binding_type", value: other.to_owned() }),
  }
}

pub fn encode_subject_kind(k: SubjectKind) -> &'static str {
  match k {
    SubjectKind::Elder => "elder",
    SubjectKind::MapUser => "map_user",
  }
}

pub fn decode_subject_kind(s: &str) -> Result<SubjectKind> {
  match s {
    "elder" => Ok(SubjectKind::Elder),
    "map_user" => Ok(SubjectKind::MapUser),
    other => Err(Error::Decode { column: "subject_kind", value: other.to_owned() }),
  }
}

pub fn encode_gateway_kind(k: GatewayKind) -> &'static str {
  match k {
    GatewayKind::Fixed => "fixed",
    GatewayKind::Mobile => "mobile",
  }
}

pub fn decode_gateway_kind(s: &str) -> Result<GatewayKind> {
  match s {
    "fixed" => Ok(GatewayKind::Fixed),
    "mobile" => Ok(GatewayKind::Mobile),
    other => Err(Error::Decode { column: "kind", value: other.to_owned() }),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `devices` row.
pub struct RawDevice {
  pub device_id:    String,
  pub beacon_uuid:  String,
  pub major:        u16,
  pub minor:        u16,
  pub name:         String,
  pub notes:        Option<String>,
  pub binding_type: String,
  pub bound_to:     Option<String>,
  pub bound_at:     Option<String>,
  pub created_at:   String,
}

impl RawDevice {
  pub const COLUMNS: &'static str = "device_id, beacon_uuid, major, minor, name, notes, \
     binding_type, bound_to, bound_at, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      device_id:    row.get(0)?,
      beacon_uuid:  row.get(1)?,
      major:        row.get(2)?,
      minor:        row.get(3)?,
      name:         row.get(4)?,
      notes:        row.get(5)?,
      binding_type: row.get(6)?,
      bound_to:     row.get(7)?,
      bound_at:     row.get(8)?,
      created_at:   row.get(9)?,
    })
  }

  pub fn into_device(self) -> Result<Device> {
    Ok(Device {
      device_id:    decode_uuid(&self.device_id)?,
      identity:     BeaconIdentity {
        uuid:  decode_uuid(&self.beacon_uuid)?,
        major: self.major,
        minor: self.minor,
      },
      name:         self.name,
      notes:        self.notes,
      binding_type: decode_binding_type(&self.binding_type)?,
      bound_to:     decode_opt_uuid(self.bound_to)?,
      bound_at:     decode_opt_dt(self.bound_at)?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from an `elders` row.
pub struct RawElder {
  pub elder_id:   String,
  pub name:       String,
  pub notes:      Option<String>,
  pub device_id:  Option<String>,
  pub created_at: String,
}

impl RawElder {
  pub const COLUMNS: &'static str = "elder_id, name, notes, device_id, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      elder_id:   row.get(0)?,
      name:       row.get(1)?,
      notes:      row.get(2)?,
      device_id:  row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_elder(self) -> Result<Elder> {
    Ok(Elder {
      elder_id:   decode_uuid(&self.elder_id)?,
      name:       self.name,
      notes:      self.notes,
      device_id:  decode_opt_uuid(self.device_id)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `map_users` row.
pub struct RawMapUser {
  pub user_id:         String,
  pub display_name:    String,
  pub email:           String,
  pub bound_device_id: Option<String>,
  pub deleted:         bool,
  pub created_at:      String,
}

impl RawMapUser {
  pub const COLUMNS: &'static str =
    "user_id, display_name, email, bound_device_id, deleted, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      display_name:    row.get(1)?,
      email:           row.get(2)?,
      bound_device_id: row.get(3)?,
      deleted:         row.get(4)?,
      created_at:      row.get(5)?,
    })
  }

  pub fn into_map_user(self) -> Result<MapUser> {
    Ok(MapUser {
      user_id:         decode_uuid(&self.user_id)?,
      display_name:    self.display_name,
      email:           self.email,
      bound_device_id: decode_opt_uuid(self.bound_device_id)?,
      deleted:         self.deleted,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `gateways` row.
pub struct RawGateway {
  pub gateway_id: String,
  pub name:       String,
  pub kind:       String,
  pub location:   Option<String>,
  pub latitude:   Option<f64>,
  pub longitude:  Option<f64>,
  pub created_at: String,
}

impl RawGateway {
  pub const COLUMNS: &'static str =
    "gateway_id, name, kind, location, latitude, longitude, created_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      gateway_id: row.get(0)?,
      name:       row.get(1)?,
      kind:       row.get(2)?,
      location:   row.get(3)?,
      latitude:   row.get(4)?,
      longitude:  row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_gateway(self) -> Result<Gateway> {
    Ok(Gateway {
      gateway_id: decode_uuid(&self.gateway_id)?,
      name:       self.name,
      kind:       decode_gateway_kind(&self.kind)?,
      location:   self.location,
      latitude:   self.latitude,
      longitude:  self.longitude,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `notification_points` row.
pub struct RawNotificationPoint {
  pub point_id:        String,
  pub user_id:         String,
  pub gateway_id:      String,
  pub name:            String,
  pub notify_on_enter: bool,
  pub notify_on_leave: bool,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawNotificationPoint {
  pub const COLUMNS: &'static str = "point_id, user_id, gateway_id, name, \
     notify_on_enter, notify_on_leave, created_at, updated_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      point_id:        row.get(0)?,
      user_id:         row.get(1)?,
      gateway_id:      row.get(2)?,
      name:            row.get(3)?,
      notify_on_enter: row.get(4)?,
      notify_on_leave: row.get(5)?,
      created_at:      row.get(6)?,
      updated_at:      row.get(7)?,
    })
  }

  pub fn into_point(self) -> Result<NotificationPoint> {
    Ok(NotificationPoint {
      point_id:        decode_uuid(&self.point_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      gateway_id:      decode_uuid(&self.gateway_id)?,
      name:            self.name,
      notify_on_enter: self.notify_on_enter,
      notify_on_leave: self.notify_on_leave,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `sightings` row.
pub struct RawSighting {
  pub sighting_id:  String,
  pub device_id:    String,
  pub gateway_id:   String,
  pub subject_kind: Option<String>,
  pub subject_id:   Option<String>,
  pub rssi:         i16,
  pub seen_at:      String,
}

impl RawSighting {
  pub const COLUMNS: &'static str =
    "sighting_id, device_id, gateway_id, subject_kind, subject_id, rssi, seen_at";

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sighting_id:  row.get(0)?,
      device_id:    row.get(1)?,
      gateway_id:   row.get(2)?,
      subject_kind: row.get(3)?,
      subject_id:   row.get(4)?,
      rssi:         row.get(5)?,
      seen_at:      row.get(6)?,
    })
  }

  pub fn into_sighting(self) -> Result<Sighting> {
    let subject = match (self.subject_kind, self.subject_id) {
      (Some(kind), Some(id)) => Some(SubjectRef {
        kind: decode_subject_kind(&kind)?,
        id:   decode_uuid(&id)?,
      }),
      _ => None,
    };

    Ok(Sighting {
      sighting_id: decode_uuid(&self.sighting_id)?,
      device_id: decode_uuid(&self.device_id)?,
      gateway_id: decode_uuid(&self.gateway_id)?,
      subject,
      rssi: self.rssi,
      seen_at: decode_dt(&self.seen_at)?,
    })
  }
}
