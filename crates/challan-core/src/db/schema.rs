//! SQLite schema definition.

/// Complete database schema for the local DC store.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Saved Delivery Challans
-- ============================================================================

CREATE TABLE IF NOT EXISTS saved_dcs (
    id TEXT PRIMARY KEY,
    hospital_name TEXT NOT NULL,
    dc_no TEXT NOT NULL,
    material_type TEXT NOT NULL DEFAULT '',
    received_by TEXT NOT NULL DEFAULT '',
    remarks TEXT NOT NULL DEFAULT '',
    saved_at TEXT NOT NULL,                      -- RFC 3339
    status TEXT NOT NULL CHECK (status IN ('pending', 'returned', 'cash', 'completed')),
    items TEXT NOT NULL DEFAULT '[]',            -- JSON array of DcItem
    instruments TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    box_numbers TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    returned_by TEXT,
    returned_at TEXT,
    returned_remarks TEXT,
    invoice_ref TEXT,
    invoice_remarks TEXT,
    cash_at TEXT,
    cash_amount REAL,
    cash_remarks TEXT,
    history TEXT NOT NULL DEFAULT '[]'           -- JSON array of HistoryEntry
);

CREATE INDEX IF NOT EXISTS idx_saved_dcs_status ON saved_dcs(status);
CREATE INDEX IF NOT EXISTS idx_saved_dcs_saved_at ON saved_dcs(saved_at);

-- ============================================================================
-- Packing Checklist
-- ============================================================================

CREATE TABLE IF NOT EXISTS packing_checklist (
    procedure_name TEXT NOT NULL,
    entity_key TEXT NOT NULL,                    -- e.g. 'instrument:Drill'
    packed INTEGER NOT NULL DEFAULT 0,
    packed_at TEXT,
    PRIMARY KEY (procedure_name, entity_key)
);

-- ============================================================================
-- Local Flags
-- ============================================================================

CREATE TABLE IF NOT EXISTS local_flags (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
