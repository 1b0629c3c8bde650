// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! v1 schema DDL. WAL mode and foreign keys are turned on by the opener
//! (§6), not here, so tests can exercise the DDL against any connection.

pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS events (
    event_id        TEXT PRIMARY KEY,
    sequence        INTEGER NOT NULL,
    type            TEXT NOT NULL,
    timestamp       TEXT NOT NULL,
    origin_daemon   TEXT NOT NULL,
    payload         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_sequence ON events (origin_daemon, sequence);

CREATE TABLE IF NOT EXISTS agents (
    agent_id        TEXT PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    role            TEXT NOT NULL,
    module          TEXT NOT NULL,
    display         TEXT,
    hostname        TEXT NOT NULL,
    public_key      TEXT,
    registered_at   TEXT NOT NULL,
    last_seen_at    TEXT NOT NULL,
    deregistered_at TEXT
);

CREATE TABLE IF NOT EXISTS sessions (
    session_id      TEXT PRIMARY KEY,
    agent_id        TEXT NOT NULL REFERENCES agents(agent_id),
    started_at      TEXT NOT NULL,
    ended_at        TEXT,
    last_seen_at    TEXT NOT NULL,
    intent          TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_agent ON sessions (agent_id);

CREATE TABLE IF NOT EXISTS threads (
    thread_id       TEXT PRIMARY KEY,
    title           TEXT,
    created_at      TEXT NOT NULL,
    created_by      TEXT NOT NULL REFERENCES agents(agent_id)
);

CREATE TABLE IF NOT EXISTS messages (
    message_id      TEXT PRIMARY KEY,
    thread_id       TEXT REFERENCES threads(thread_id),
    agent_id        TEXT NOT NULL REFERENCES agents(agent_id),
    authored_by     TEXT,
    disclosed       INTEGER,
    session_id      TEXT NOT NULL REFERENCES sessions(session_id),
    created_at      TEXT NOT NULL,
    format          TEXT NOT NULL,
    content         TEXT NOT NULL,
    scopes          TEXT NOT NULL,
    refs            TEXT NOT NULL,
    reply_to        TEXT,
    deleted_at      TEXT
);
CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages (thread_id);
CREATE INDEX IF NOT EXISTS idx_messages_agent ON messages (agent_id);

CREATE TABLE IF NOT EXISTS message_reads (
    message_id      TEXT NOT NULL REFERENCES messages(message_id),
    agent_id        TEXT NOT NULL REFERENCES agents(agent_id),
    session_id      TEXT NOT NULL,
    read_at         TEXT NOT NULL,
    PRIMARY KEY (message_id, agent_id)
);

CREATE TABLE IF NOT EXISTS groups (
    group_id        TEXT PRIMARY KEY,
    name            TEXT NOT NULL UNIQUE,
    description     TEXT,
    created_by      TEXT NOT NULL REFERENCES agents(agent_id),
    created_at      TEXT NOT NULL,
    updated_at      TEXT,
    deleted_at      TEXT
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id        TEXT NOT NULL REFERENCES groups(group_id),
    member_type     TEXT NOT NULL,
    member_value    TEXT NOT NULL,
    PRIMARY KEY (group_id, member_type, member_value)
);

CREATE TABLE IF NOT EXISTS checkpoints (
    peer_daemon_id      TEXT PRIMARY KEY,
    last_synced_sequence INTEGER NOT NULL,
    last_sync_timestamp  TEXT NOT NULL,
    sync_status          TEXT NOT NULL
);
"#;
