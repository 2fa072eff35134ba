//! SQL schema for the Scholink SQLite stores.
//!
//! Executed once at connection startup. Both schemas are idempotent thanks
//! to `CREATE TABLE IF NOT EXISTS`.

/// Graph store DDL: assertion log, groups, group edges and their metadata.
pub const GRAPH_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identifiers (
    id          TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    scheme      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    UNIQUE (value, scheme)
);

CREATE TABLE IF NOT EXISTS relationships (
    id          TEXT PRIMARY KEY,
    source_id   TEXT NOT NULL REFERENCES identifiers(id),
    target_id   TEXT NOT NULL REFERENCES identifiers(id),
    relation    TEXT NOT NULL,
    deleted     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (source_id, target_id, relation),
    CHECK  (source_id != target_id)
);

-- Events are never deleted; status only moves forward (or back to 'new'
-- when an operator or the janitor re-enqueues).
CREATE TABLE IF NOT EXISTS events (
    id              TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,   -- 'relationship_created' | 'relationship_deleted'
    status          TEXT NOT NULL,   -- 'new' | 'processing' | 'error' | 'done'
    payload         TEXT NOT NULL,
    payload_digest  TEXT NOT NULL,
    user_id         TEXT,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS object_events (
    event_id       TEXT NOT NULL REFERENCES events(id),
    object_uuid    TEXT NOT NULL,
    payload_type   TEXT NOT NULL,    -- 'Identifier' | 'Relationship'
    payload_index  INTEGER NOT NULL,
    PRIMARY KEY (event_id, object_uuid, payload_type, payload_index)
);

CREATE TABLE IF NOT EXISTS object_groups (
    id          TEXT PRIMARY KEY,
    type        TEXT NOT NULL,       -- 'identity' | 'version'
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_metadata (
    group_id    TEXT PRIMARY KEY REFERENCES object_groups(id) ON DELETE CASCADE,
    json        TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- One Identity group per identifier.
CREATE TABLE IF NOT EXISTS identifier_groups (
    identifier_id  TEXT PRIMARY KEY REFERENCES identifiers(id),
    group_id       TEXT NOT NULL REFERENCES object_groups(id)
);

-- One Version group per Identity group.
CREATE TABLE IF NOT EXISTS group_m2m (
    group_id     TEXT NOT NULL REFERENCES object_groups(id),
    subgroup_id  TEXT PRIMARY KEY REFERENCES object_groups(id)
);

CREATE TABLE IF NOT EXISTS group_relationships (
    id          TEXT PRIMARY KEY,
    type        TEXT NOT NULL,
    relation    TEXT NOT NULL,
    source_id   TEXT NOT NULL REFERENCES object_groups(id),
    target_id   TEXT NOT NULL REFERENCES object_groups(id),
    created_at  TEXT NOT NULL,
    UNIQUE (source_id, target_id, relation)
);

CREATE TABLE IF NOT EXISTS group_relationship_metadata (
    group_relationship_id  TEXT PRIMARY KEY
                           REFERENCES group_relationships(id) ON DELETE CASCADE,
    json                   TEXT NOT NULL,
    updated_at             TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS relationship_group_relationship (
    relationship_id        TEXT NOT NULL REFERENCES relationships(id),
    group_relationship_id  TEXT NOT NULL
                           REFERENCES group_relationships(id) ON DELETE CASCADE,
    PRIMARY KEY (relationship_id, group_relationship_id)
);

-- Version edge -> Identity sub-edge.
CREATE TABLE IF NOT EXISTS group_relationship_m2m (
    relationship_id     TEXT NOT NULL
                        REFERENCES group_relationships(id) ON DELETE CASCADE,
    subrelationship_id  TEXT NOT NULL
                        REFERENCES group_relationships(id) ON DELETE CASCADE,
    PRIMARY KEY (relationship_id, subrelationship_id)
);

CREATE TABLE IF NOT EXISTS error_monitoring (
    id          TEXT PRIMARY KEY,
    event_id    TEXT NOT NULL REFERENCES events(id),
    origin      TEXT NOT NULL,
    error       TEXT NOT NULL,
    n_retries   INTEGER NOT NULL,
    payload     TEXT NOT NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS events_status_idx        ON events(status);
CREATE INDEX IF NOT EXISTS events_digest_idx        ON events(payload_digest);
CREATE INDEX IF NOT EXISTS relationships_target_idx ON relationships(target_id, relation);
CREATE INDEX IF NOT EXISTS identifier_groups_idx    ON identifier_groups(group_id);
CREATE INDEX IF NOT EXISTS group_m2m_group_idx      ON group_m2m(group_id);
CREATE INDEX IF NOT EXISTS group_rel_target_idx     ON group_relationships(target_id);
CREATE INDEX IF NOT EXISTS gr_m2m_sub_idx           ON group_relationship_m2m(subrelationship_id);
CREATE INDEX IF NOT EXISTS error_event_idx          ON error_monitoring(event_id);

PRAGMA user_version = 1;
";

/// Search backend DDL: suffixed indices, aliases and flattened documents.
pub const INDEX_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS search_indices (
    name        TEXT PRIMARY KEY,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS search_aliases (
    alias       TEXT PRIMARY KEY,
    index_name  TEXT NOT NULL REFERENCES search_indices(name) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS search_documents (
    index_name    TEXT NOT NULL REFERENCES search_indices(name) ON DELETE CASCADE,
    doc_id        TEXT NOT NULL,
    grouping      TEXT NOT NULL,
    relation      TEXT NOT NULL,
    source_group  TEXT NOT NULL,
    target_group  TEXT NOT NULL,
    body          TEXT NOT NULL,
    PRIMARY KEY (index_name, doc_id)
);

-- Flattened SearchIdentifier entries, one row per side and identifier.
CREATE TABLE IF NOT EXISTS search_identifiers (
    index_name  TEXT NOT NULL,
    doc_id      TEXT NOT NULL,
    side        TEXT NOT NULL,       -- 'source' | 'target'
    value       TEXT NOT NULL,
    scheme      TEXT NOT NULL,
    FOREIGN KEY (index_name, doc_id)
        REFERENCES search_documents(index_name, doc_id) ON DELETE CASCADE
);

-- Flattened History[*].LinkPublicationDate.
CREATE TABLE IF NOT EXISTS search_dates (
    index_name  TEXT NOT NULL,
    doc_id      TEXT NOT NULL,
    date        TEXT NOT NULL,
    FOREIGN KEY (index_name, doc_id)
        REFERENCES search_documents(index_name, doc_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS search_docs_source_idx ON search_documents(index_name, source_group);
CREATE INDEX IF NOT EXISTS search_docs_target_idx ON search_documents(index_name, target_group);
CREATE INDEX IF NOT EXISTS search_ids_lookup_idx  ON search_identifiers(index_name, value, scheme, side);
CREATE INDEX IF NOT EXISTS search_ids_doc_idx     ON search_identifiers(index_name, doc_id);
CREATE INDEX IF NOT EXISTS search_dates_doc_idx   ON search_dates(index_name, doc_id);

PRAGMA user_version = 1;
";

/// A synchronous in-memory graph connection for engine-level tests.
#[cfg(test)]
pub(crate) fn graph_connection() -> rusqlite::Connection {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(GRAPH_SCHEMA).unwrap();
  conn
}
