pub const CREATE_SCHEMA_SQL: &str = r#"
BEGIN TRANSACTION;

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

INSERT OR REPLACE INTO meta (key, value) VALUES ('schema_version', '2');

-- Items are the tracked assets (applications, systems, databases, ...)
-- whose security posture is being assessed
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    category TEXT,
    item_type TEXT,
    owner TEXT,
    criticality TEXT,            -- 'low', 'medium', 'high', 'critical'
    tags TEXT,                   -- JSON array of strings, NULL reads as empty
    created_at TEXT NOT NULL,    -- ISO-8601 UTC
    updated_at TEXT NOT NULL
);

-- Top-level security control categories (e.g. "Access Control")
CREATE TABLE IF NOT EXISTS security_controls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,  -- user-reorderable display position
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Finer-grained requirements under exactly one control
CREATE TABLE IF NOT EXISTS sub_controls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    control_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (control_id) REFERENCES security_controls(id)
);

CREATE INDEX IF NOT EXISTS idx_sub_controls_control ON sub_controls (control_id);

-- Stored red/yellow/green status of one control for one item.
-- At most one row per (item_id, control_id); no row means "not implemented"
CREATE TABLE IF NOT EXISTS control_implementations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    control_id INTEGER NOT NULL,
    status TEXT NOT NULL,        -- 'red', 'yellow', 'green'
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (item_id) REFERENCES items(id),
    FOREIGN KEY (control_id) REFERENCES security_controls(id),
    UNIQUE (item_id, control_id)
);

-- Same shape as control_implementations, keyed on the sub-control
CREATE TABLE IF NOT EXISTS sub_control_implementations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL,
    sub_control_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (item_id) REFERENCES items(id),
    FOREIGN KEY (sub_control_id) REFERENCES sub_controls(id),
    UNIQUE (item_id, sub_control_id)
);

CREATE INDEX IF NOT EXISTS idx_ci_item ON control_implementations (item_id);
CREATE INDEX IF NOT EXISTS idx_sci_item ON sub_control_implementations (item_id);

COMMIT;
"#;
