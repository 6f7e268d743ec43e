//! SQL schema for the beaconward SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS devices (
    device_id     TEXT PRIMARY KEY,
    beacon_uuid   TEXT NOT NULL,
    major         INTEGER NOT NULL CHECK (major BETWEEN 0 AND 65535),
    minor         INTEGER NOT NULL CHECK (minor BETWEEN 0 AND 65535),
    name          TEXT NOT NULL,
    notes         TEXT,
    binding_type  TEXT NOT NULL DEFAULT 'UNBOUND'
                  CHECK (binding_type IN ('UNBOUND', 'ELDER', 'MAP_USER', 'ANONYMOUS')),
    bound_to      TEXT,            -- elder_id or user_id; NULL unless ELDER / MAP_USER
    bound_at      TEXT,            -- RFC 3339 UTC; server-assigned at commit
    created_at    TEXT NOT NULL,
    UNIQUE (beacon_uuid, major, minor),
    CHECK ((binding_type IN ('ELDER', 'MAP_USER')) = (bound_to IS NOT NULL))
);

CREATE TABLE IF NOT EXISTS elders (
    elder_id    TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    notes       TEXT,
    device_id   TEXT REFERENCES devices(device_id),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS map_users (
    user_id          TEXT PRIMARY KEY,
    display_name     TEXT NOT NULL,
    email            TEXT NOT NULL,
    bound_device_id  TEXT REFERENCES devices(device_id),
    deleted          INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

-- SHA-256 digests of issued bearer tokens; plaintext is never stored.
CREATE TABLE IF NOT EXISTS api_tokens (
    token_digest  TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL REFERENCES map_users(user_id),
    issued_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS gateways (
    gateway_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    kind        TEXT NOT NULL,     -- 'fixed' | 'mobile'
    location    TEXT,
    latitude    REAL,
    longitude   REAL,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification_points (
    point_id         TEXT PRIMARY KEY,
    user_id          TEXT NOT NULL REFERENCES map_users(user_id),
    gateway_id       TEXT NOT NULL REFERENCES gateways(gateway_id),
    name             TEXT NOT NULL,
    notify_on_enter  INTEGER NOT NULL,
    notify_on_leave  INTEGER NOT NULL,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL
);

-- Append-only. The subject columns snapshot the device binding at seen_at.
CREATE TABLE IF NOT EXISTS sightings (
    sighting_id   TEXT PRIMARY KEY,
    device_id     TEXT NOT NULL REFERENCES devices(device_id),
    gateway_id    TEXT NOT NULL REFERENCES gateways(gateway_id),
    subject_kind  TEXT,            -- 'elder' | 'map_user' | NULL
    subject_id    TEXT,
    rssi          INTEGER NOT NULL,
    seen_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS devices_bound_to_idx      ON devices(bound_to);
CREATE INDEX IF NOT EXISTS elders_device_idx         ON elders(device_id);
CREATE INDEX IF NOT EXISTS map_users_device_idx      ON map_users(bound_device_id);
CREATE INDEX IF NOT EXISTS points_user_idx           ON notification_points(user_id);
CREATE INDEX IF NOT EXISTS sightings_subject_seen_idx ON sightings(subject_id, seen_at);

PRAGMA user_version = 1;
";
