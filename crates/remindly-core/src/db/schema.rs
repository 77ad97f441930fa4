//! SQLite schema definition.

/// Complete database schema for remindly.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Payments (checks and bills)
-- ============================================================================

CREATE TABLE IF NOT EXISTS payments (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    amount REAL NOT NULL,
    payment_date TEXT,                            -- YYYY-MM-DD
    is_paid INTEGER NOT NULL DEFAULT 0,
    is_recurring INTEGER NOT NULL DEFAULT 0,
    recurring_type TEXT CHECK (recurring_type IN ('daily', 'weekly', 'monthly', 'yearly')),
    recurring_day INTEGER,
    recurring_days TEXT NOT NULL DEFAULT '[]',    -- JSON array of weekdays, Monday=1
    recurring_end_count INTEGER,
    recurring_end_months INTEGER,
    recurring_end_date TEXT,
    next_payment_date TEXT,
    position INTEGER NOT NULL DEFAULT 0,          -- storage order
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_payments_user ON payments(user_id, position);

-- ============================================================================
-- Medications
-- ============================================================================

CREATE TABLE IF NOT EXISTS medications (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    dosage TEXT,
    times TEXT NOT NULL DEFAULT '[]',             -- JSON array of "HH:MM"
    active INTEGER NOT NULL DEFAULT 1,
    start_date TEXT,
    end_date TEXT,
    last_taken TEXT,
    position INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_medications_user ON medications(user_id, position);

-- ============================================================================
-- Notification History (de-duplication ledger)
-- ============================================================================

CREATE TABLE IF NOT EXISTS notification_history (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_id TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('reminder', 'due-today', 'daily', 'medication')),
    sent_at TEXT NOT NULL,                        -- local wall clock, ISO 8601
    reference_date TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_history_key ON notification_history(subject_id, kind, reference_date);

-- ============================================================================
-- Settings (single JSON document)
-- ============================================================================

CREATE TABLE IF NOT EXISTS settings (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Sync State
-- ============================================================================

CREATE TABLE IF NOT EXISTS sync_state (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One-time import of the legacy key-value file
INSERT OR IGNORE INTO sync_state (key, value) VALUES ('kv_migrated_at', '');
"#;
