use std::fs;
use std::path::Path;

use log::info;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::controls::{SecurityControl, SubControl};
use crate::error::SecTrackError;
use crate::implementations::{ControlImplementation, SubControlImplementation};
use crate::items::Item;
use crate::utils::now_iso;

const EXPORT_FORMAT_VERSION: &str = "1.0.0";
const EXPORT_APPLICATION: &str = "sectrack";

/// Envelope describing an export file. A backup mechanism, not a sync
/// protocol: row ids are preserved verbatim so foreign keys survive the
/// round trip.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub exported_at: String,
    pub version: String,
    pub application: String,
    pub total_items: usize,
    pub total_controls: usize,
    pub total_sub_controls: usize,
    pub total_implementations: usize,
    pub total_sub_control_implementations: usize,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub items: Vec<Item>,
    pub security_controls: Vec<SecurityControl>,
    pub sub_controls: Vec<SubControl>,
    pub control_implementations: Vec<ControlImplementation>,
    pub sub_control_implementations: Vec<SubControlImplementation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Export {
    pub metadata: ExportMetadata,
    pub data: ExportData,
}

/// Snapshots all five tables into an Export value.
pub fn build_export(conn: &Connection) -> Result<Export, SecTrackError> {
    let data = ExportData {
        items: Item::list(conn)?,
        security_controls: SecurityControl::list(conn)?,
        sub_controls: SubControl::list(conn)?,
        control_implementations: ControlImplementation::list(conn)?,
        sub_control_implementations: SubControlImplementation::list(conn)?,
    };

    let metadata = ExportMetadata {
        exported_at: now_iso(),
        version: EXPORT_FORMAT_VERSION.to_string(),
        application: EXPORT_APPLICATION.to_string(),
        total_items: data.items.len(),
        total_controls: data.security_controls.len(),
        total_sub_controls: data.sub_controls.len(),
        total_implementations: data.control_implementations.len(),
        total_sub_control_implementations: data.sub_control_implementations.len(),
    };

    Ok(Export { metadata, data })
}

pub fn export_to_file(conn: &Connection, path: &Path) -> Result<ExportMetadata, SecTrackError> {
    let export = build_export(conn)?;
    let json = serde_json::to_string_pretty(&export)?;
    fs::write(path, json)?;
    info!(
        "Exported {} items, {} controls, {} sub-controls to {}",
        export.metadata.total_items,
        export.metadata.total_controls,
        export.metadata.total_sub_controls,
        path.display()
    );
    Ok(export.metadata)
}

/// Replaces the database contents with the export file's rows, preserving
/// ids. Clearing and reinserting happen in one transaction, so a failed
/// import leaves the prior contents intact.
pub fn import_from_file(conn: &mut Connection, path: &Path) -> Result<ExportMetadata, SecTrackError> {
    let json = fs::read_to_string(path)?;
    let export: Export = serde_json::from_str(&json)
        .map_err(|e| SecTrackError::Validation(format!("Invalid export file: {}", e)))?;

    if export.metadata.application != EXPORT_APPLICATION {
        return Err(SecTrackError::Validation(format!(
            "Export file was produced by '{}', not {}",
            export.metadata.application, EXPORT_APPLICATION
        )));
    }

    let tx = conn.transaction()?;

    // Children before parents on the way out, parents before children on
    // the way back in.
    tx.execute("DELETE FROM sub_control_implementations", [])?;
    tx.execute("DELETE FROM control_implementations", [])?;
    tx.execute("DELETE FROM sub_controls", [])?;
    tx.execute("DELETE FROM security_controls", [])?;
    tx.execute("DELETE FROM items", [])?;

    for item in &export.data.items {
        let tags_json = serde_json::to_string(&item.tags)?;
        tx.execute(
            "INSERT INTO items (id, name, description, category, item_type, owner, criticality, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.name,
                item.description,
                item.category,
                item.item_type,
                item.owner,
                item.criticality.as_str(),
                tags_json,
                item.created_at,
                item.updated_at,
            ],
        )?;
    }

    for control in &export.data.security_controls {
        tx.execute(
            "INSERT INTO security_controls (id, name, description, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                control.id,
                control.name,
                control.description,
                control.sort_order,
                control.created_at,
                control.updated_at,
            ],
        )?;
    }

    for sub_control in &export.data.sub_controls {
        tx.execute(
            "INSERT INTO sub_controls (id, control_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                sub_control.id,
                sub_control.control_id,
                sub_control.name,
                sub_control.description,
                sub_control.created_at,
                sub_control.updated_at,
            ],
        )?;
    }

    for implementation in &export.data.control_implementations {
        tx.execute(
            "INSERT INTO control_implementations (id, item_id, control_id, status, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                implementation.id,
                implementation.item_id,
                implementation.control_id,
                implementation.status.as_str(),
                implementation.notes,
                implementation.created_at,
                implementation.updated_at,
            ],
        )?;
    }

    for implementation in &export.data.sub_control_implementations {
        tx.execute(
            "INSERT INTO sub_control_implementations (id, item_id, sub_control_id, status, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                implementation.id,
                implementation.item_id,
                implementation.sub_control_id,
                implementation.status.as_str(),
                implementation.notes,
                implementation.created_at,
                implementation.updated_at,
            ],
        )?;
    }

    tx.commit()?;

    info!(
        "Imported {} items, {} controls, {} sub-controls from {}",
        export.metadata.total_items,
        export.metadata.total_controls,
        export.metadata.total_sub_controls,
        path.display()
    );

    Ok(export.metadata)
}

/// Deletes every row from all five tables. The schema (and meta table)
/// stay in place.
pub fn wipe(conn: &mut Connection) -> Result<(), SecTrackError> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM sub_control_implementations", [])?;
    tx.execute("DELETE FROM control_implementations", [])?;
    tx.execute("DELETE FROM sub_controls", [])?;
    tx.execute("DELETE FROM security_controls", [])?;
    tx.execute("DELETE FROM items", [])?;
    tx.commit()?;
    info!("Wiped all data");
    Ok(())
}

/// True if no table holds any rows. Used by seeding to refuse a populated
/// database.
pub fn is_empty(conn: &Connection) -> Result<bool, SecTrackError> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM items)
              + (SELECT COUNT(*) FROM security_controls)
              + (SELECT COUNT(*) FROM sub_controls)
              + (SELECT COUNT(*) FROM control_implementations)
              + (SELECT COUNT(*) FROM sub_control_implementations)",
        [],
        |row| row.get(0),
    )?;
    Ok(count == 0)
}
