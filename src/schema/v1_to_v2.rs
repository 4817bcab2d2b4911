// Version 1 databases predate control reordering and item tags.
// sort_order is backfilled from the existing insertion order so that the
// matrix column order does not change on upgrade.
pub const UPGRADE_1_TO_2_SQL: &str = r#"
BEGIN TRANSACTION;

ALTER TABLE security_controls ADD COLUMN sort_order INTEGER NOT NULL DEFAULT 0;
ALTER TABLE items ADD COLUMN tags TEXT;

UPDATE security_controls
SET sort_order = (
    SELECT COUNT(*)
    FROM security_controls AS sc
    WHERE sc.id < security_controls.id
);

UPDATE meta SET value = '2' WHERE key = 'schema_version';

COMMIT;
"#;
