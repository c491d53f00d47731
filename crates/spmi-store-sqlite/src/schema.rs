//! SQL schema for the SPMI SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       INTEGER PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL
);

-- position 0 is the default active role.
CREATE TABLE IF NOT EXISTS user_roles (
    user_id  INTEGER NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    role     TEXT    NOT NULL,   -- 'superadmin' | 'admin' | 'auditor' | 'auditee'
    position INTEGER NOT NULL,
    PRIMARY KEY (user_id, role)
);

-- ── Catalog ────────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS scopes (
    scope_id INTEGER PRIMARY KEY,
    name     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS criteria (
    criterion_id INTEGER PRIMARY KEY,
    name         TEXT    NOT NULL,
    scope_id     INTEGER NOT NULL REFERENCES scopes(scope_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS departments (
    department_id INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    owner_user_id INTEGER REFERENCES users(user_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS standards (
    standard_id   INTEGER PRIMARY KEY,
    statement     TEXT    NOT NULL,
    criterion_id  INTEGER NOT NULL REFERENCES criteria(criterion_id) ON DELETE CASCADE,
    department_id INTEGER REFERENCES departments(department_id) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS indicators (
    indicator_id INTEGER PRIMARY KEY,
    statement    TEXT    NOT NULL,
    criterion_id INTEGER NOT NULL REFERENCES criteria(criterion_id) ON DELETE CASCADE,
    standard_id  INTEGER NOT NULL REFERENCES standards(standard_id) ON DELETE CASCADE
);

-- ── Schedule ───────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS audit_cycles (
    cycle_id      INTEGER PRIMARY KEY,
    year          INTEGER NOT NULL,
    sk_number     TEXT,
    start_date    TEXT    NOT NULL,   -- YYYY-MM-DD
    end_date      TEXT    NOT NULL,
    department_id INTEGER NOT NULL REFERENCES departments(department_id) ON DELETE RESTRICT,
    UNIQUE (year, department_id),
    CHECK  (end_date >= start_date)
);

CREATE TABLE IF NOT EXISTS audit_assignments (
    assignment_id   INTEGER PRIMARY KEY,
    cycle_id        INTEGER NOT NULL REFERENCES audit_cycles(cycle_id) ON DELETE CASCADE,
    auditor_user_id INTEGER NOT NULL REFERENCES users(user_id) ON DELETE RESTRICT,
    department_id   INTEGER NOT NULL REFERENCES departments(department_id) ON DELETE RESTRICT,
    UNIQUE (cycle_id, auditor_user_id)
);

-- ── Audit results ──────────────────────────────────────────────────────────

-- One row per (cycle, indicator); score is NULL until the first score.
CREATE TABLE IF NOT EXISTS assessments (
    assessment_id INTEGER PRIMARY KEY,
    cycle_id      INTEGER NOT NULL REFERENCES audit_cycles(cycle_id) ON DELETE CASCADE,
    indicator_id  INTEGER NOT NULL REFERENCES indicators(indicator_id) ON DELETE CASCADE,
    score         TEXT,
    auditor_note  TEXT,
    updated_at    TEXT NOT NULL,      -- RFC 3339 UTC
    UNIQUE (cycle_id, indicator_id)
);

-- Append-only; rows are only ever inserted or deleted.
CREATE TABLE IF NOT EXISTS evidence (
    evidence_id      INTEGER PRIMARY KEY,
    assessment_id    INTEGER NOT NULL REFERENCES assessments(assessment_id) ON DELETE CASCADE,
    file_path        TEXT,            -- relative to the storage directory
    file_name        TEXT,
    content_hash     TEXT,            -- SHA-256 hex
    size_bytes       INTEGER,
    note             TEXT,
    uploaded_by_role TEXT    NOT NULL,
    uploaded_by      INTEGER REFERENCES users(user_id) ON DELETE SET NULL,
    created_at       TEXT    NOT NULL,
    CHECK (file_path IS NOT NULL OR note IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS cars (
    car_id            INTEGER PRIMARY KEY,
    cycle_id          INTEGER NOT NULL REFERENCES audit_cycles(cycle_id) ON DELETE CASCADE,
    indicator_id      INTEGER NOT NULL REFERENCES indicators(indicator_id) ON DELETE CASCADE,
    level             TEXT    NOT NULL,   -- 'Observasi' | 'Minor' | 'Mayor'
    finding           TEXT    NOT NULL,
    root_cause        TEXT,
    corrective_action TEXT,
    due_date          TEXT,
    status            TEXT    NOT NULL,   -- 'OPEN' | 'SUBMITTED' | 'Close'
    ptk_number        TEXT UNIQUE,
    submitted_at      TEXT,
    closed_at         TEXT,
    created_at        TEXT    NOT NULL,
    updated_at        TEXT    NOT NULL,
    UNIQUE (cycle_id, indicator_id)
);

-- Last PTK sequence handed out per calendar year.
CREATE TABLE IF NOT EXISTS ptk_counters (
    year       INTEGER PRIMARY KEY,
    last_value INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS assignments_department_idx ON audit_assignments(department_id);
CREATE INDEX IF NOT EXISTS evidence_assessment_idx    ON evidence(assessment_id);
CREATE INDEX IF NOT EXISTS cars_status_idx            ON cars(status);
CREATE INDEX IF NOT EXISTS indicators_standard_idx    ON indicators(standard_id);

PRAGMA user_version = 1;
";
