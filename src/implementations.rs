use rusqlite::{named_params, Connection, OptionalExtension, Row, Transaction};
use serde::{Deserialize, Serialize};

use crate::controls::SubControl;
use crate::error::SecTrackError;
use crate::items::Item;
use crate::utils::now_iso;

/// Appended to the parent control's notes when a sub-control write forces
/// an automatic green-to-yellow downgrade.
pub const DOWNGRADE_NOTE: &str = " (Downgraded due to sub-control status)";

/// Persisted implementation status. "Gray/unknown" is never stored; a pair
/// with no row reads as Red at the boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Red,
    Yellow,
    Green,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Red => "red",
            Status::Yellow => "yellow",
            Status::Green => "green",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, SecTrackError> {
        match s {
            "red" => Ok(Status::Red),
            "yellow" => Ok(Status::Yellow),
            "green" => Ok(Status::Green),
            _ => Err(SecTrackError::Validation(format!(
                "Invalid status: '{}'",
                s
            ))),
        }
    }
}

/// Stored status of one control for one item. At most one row per
/// (item_id, control_id) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlImplementation {
    pub id: i64,
    pub item_id: i64,
    pub control_id: i64,
    pub status: Status,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Same shape, keyed on the sub-control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubControlImplementation {
    pub id: i64,
    pub item_id: i64,
    pub sub_control_id: i64,
    pub status: Status,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ControlImplementation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(3)?;
        Ok(ControlImplementation {
            id: row.get(0)?,
            item_id: row.get(1)?,
            control_id: row.get(2)?,
            status: Status::from_str(&status).unwrap_or(Status::Red),
            notes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn list(conn: &Connection) -> Result<Vec<ControlImplementation>, SecTrackError> {
        let mut stmt = conn.prepare(
            "SELECT id, item_id, control_id, status, notes, created_at, updated_at
             FROM control_implementations ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], ControlImplementation::from_row)?;
        let mut impls = Vec::new();
        for row in rows {
            impls.push(row?);
        }
        Ok(impls)
    }

    pub fn get_by_pair(
        conn: &Connection,
        item_id: i64,
        control_id: i64,
    ) -> Result<Option<ControlImplementation>, SecTrackError> {
        conn.query_row(
            "SELECT id, item_id, control_id, status, notes, created_at, updated_at
             FROM control_implementations WHERE item_id = ?1 AND control_id = ?2",
            [item_id, control_id],
            ControlImplementation::from_row,
        )
        .optional()
        .map_err(SecTrackError::DatabaseError)
    }
}

impl SubControlImplementation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let status: String = row.get(3)?;
        Ok(SubControlImplementation {
            id: row.get(0)?,
            item_id: row.get(1)?,
            sub_control_id: row.get(2)?,
            status: Status::from_str(&status).unwrap_or(Status::Red),
            notes: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    pub fn list(conn: &Connection) -> Result<Vec<SubControlImplementation>, SecTrackError> {
        let mut stmt = conn.prepare(
            "SELECT id, item_id, sub_control_id, status, notes, created_at, updated_at
             FROM sub_control_implementations ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], SubControlImplementation::from_row)?;
        let mut impls = Vec::new();
        for row in rows {
            impls.push(row?);
        }
        Ok(impls)
    }
}

/// True if any sub-control of `control_id` is not green for `item_id`.
/// Sub-controls with no stored implementation row count as non-green, since
/// an absent row reads as red.
pub fn has_non_green_sub_controls(
    conn: &Connection,
    item_id: i64,
    control_id: i64,
) -> Result<bool, SecTrackError> {
    let sql = r#"
        SELECT EXISTS (
            SELECT 1
            FROM   sub_controls sc
            LEFT JOIN sub_control_implementations sci
                   ON  sci.sub_control_id = sc.id
                   AND sci.item_id = :item_id
            WHERE  sc.control_id = :control_id
            AND   (sci.status IS NULL OR sci.status != 'green')
        )
    "#;

    let has_non_green: bool = conn.query_row(
        sql,
        named_params! {
            ":item_id": item_id,
            ":control_id": control_id,
        },
        |row| row.get(0),
    )?;

    Ok(has_non_green)
}

fn require_item(conn: &Connection, item_id: i64) -> Result<(), SecTrackError> {
    if Item::get_by_id(conn, item_id)?.is_none() {
        return Err(SecTrackError::NotFound(format!(
            "Item {} not found",
            item_id
        )));
    }
    Ok(())
}

fn upsert_control_implementation(
    tx: &Transaction,
    item_id: i64,
    control_id: i64,
    status: Status,
    notes: Option<&str>,
) -> Result<(), SecTrackError> {
    tx.execute(
        "INSERT INTO control_implementations
             (item_id, control_id, status, notes, created_at, updated_at)
         VALUES (:item_id, :control_id, :status, :notes, :now, :now)
         ON CONFLICT(item_id, control_id) DO UPDATE SET
             status = excluded.status,
             notes = excluded.notes,
             updated_at = excluded.updated_at",
        named_params! {
            ":item_id": item_id,
            ":control_id": control_id,
            ":status": status.as_str(),
            ":notes": notes,
            ":now": now_iso(),
        },
    )?;
    Ok(())
}

/// Sets the stored status of a control for an item (upsert semantics).
///
/// Requesting green while any sub-control of the pair is non-green fails
/// with PreconditionFailed and leaves the stored row untouched. Red and
/// yellow are accepted unconditionally.
pub fn set_control_status(
    conn: &mut Connection,
    item_id: i64,
    control_id: i64,
    status: Status,
    notes: Option<&str>,
) -> Result<(), SecTrackError> {
    let tx = conn.transaction()?;

    require_item(&tx, item_id)?;
    let control_exists: bool = tx
        .query_row(
            "SELECT 1 FROM security_controls WHERE id = ?",
            [control_id],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);
    if !control_exists {
        return Err(SecTrackError::NotFound(format!(
            "Control {} not found",
            control_id
        )));
    }

    if status == Status::Green && has_non_green_sub_controls(&tx, item_id, control_id)? {
        return Err(SecTrackError::PreconditionFailed(format!(
            "Control {} cannot be green for item {} while sub-controls are not all green",
            control_id, item_id
        )));
    }

    upsert_control_implementation(&tx, item_id, control_id, status, notes)?;

    tx.commit()?;
    Ok(())
}

/// Sets the stored status of a sub-control for an item (upsert semantics),
/// then re-evaluates the owning control: a green parent whose sub-controls
/// are no longer all green is downgraded to yellow and DOWNGRADE_NOTE is
/// appended to its notes. The write and the downgrade are one transaction.
///
/// This is the only automatic cross-record mutation in the system. It is
/// triggered solely by sub-control writes, never by parent writes.
pub fn set_sub_control_status(
    conn: &mut Connection,
    item_id: i64,
    sub_control_id: i64,
    status: Status,
    notes: Option<&str>,
) -> Result<(), SecTrackError> {
    let tx = conn.transaction()?;

    require_item(&tx, item_id)?;
    let sub_control = SubControl::get_by_id(&tx, sub_control_id)?.ok_or_else(|| {
        SecTrackError::NotFound(format!("Sub-control {} not found", sub_control_id))
    })?;

    tx.execute(
        "INSERT INTO sub_control_implementations
             (item_id, sub_control_id, status, notes, created_at, updated_at)
         VALUES (:item_id, :sub_control_id, :status, :notes, :now, :now)
         ON CONFLICT(item_id, sub_control_id) DO UPDATE SET
             status = excluded.status,
             notes = excluded.notes,
             updated_at = excluded.updated_at",
        named_params! {
            ":item_id": item_id,
            ":sub_control_id": sub_control_id,
            ":status": status.as_str(),
            ":notes": notes,
            ":now": now_iso(),
        },
    )?;

    let parent = ControlImplementation::get_by_pair(&tx, item_id, sub_control.control_id)?;
    if let Some(parent) = parent {
        if parent.status == Status::Green
            && has_non_green_sub_controls(&tx, item_id, sub_control.control_id)?
        {
            let new_notes = format!("{}{}", parent.notes.unwrap_or_default(), DOWNGRADE_NOTE);
            tx.execute(
                "UPDATE control_implementations
                 SET status = :status, notes = :notes, updated_at = :now
                 WHERE item_id = :item_id AND control_id = :control_id",
                named_params! {
                    ":status": Status::Yellow.as_str(),
                    ":notes": new_notes,
                    ":now": now_iso(),
                    ":item_id": item_id,
                    ":control_id": sub_control.control_id,
                },
            )?;
            log::info!(
                "Downgraded control {} to yellow for item {} after sub-control {} update",
                sub_control.control_id,
                item_id,
                sub_control_id
            );
        }
    }

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::{NewControl, NewSubControl, SecurityControl};
    use crate::database::test_support::open_test_db;
    use crate::items::{Criticality, NewItem};
    use pretty_assertions::assert_eq;

    fn seed_pair(conn: &Connection) -> (i64, i64) {
        let item = Item::create(
            conn,
            NewItem {
                name: "Payment System".to_string(),
                description: None,
                category: None,
                item_type: None,
                owner: None,
                criticality: Criticality::Critical,
                tags: vec![],
            },
        )
        .unwrap();
        let control = SecurityControl::create(
            conn,
            NewControl {
                name: "Access Control".to_string(),
                description: None,
            },
        )
        .unwrap();
        (item.id, control.id)
    }

    fn add_sub_control(conn: &Connection, control_id: i64, name: &str) -> i64 {
        SubControl::create(
            conn,
            NewSubControl {
                control_id,
                name: name.to_string(),
                description: None,
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["red", "yellow", "green"] {
            assert_eq!(Status::from_str(s).unwrap().as_str(), s);
        }
        assert!(Status::from_str("gray").is_err());
        assert!(Status::from_str("GREEN").is_err());
    }

    #[test]
    fn test_set_control_status_is_idempotent_upsert() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);

        set_control_status(conn, item_id, control_id, Status::Yellow, Some("x")).unwrap();
        set_control_status(conn, item_id, control_id, Status::Yellow, Some("x")).unwrap();

        let impls = ControlImplementation::list(conn).unwrap();
        assert_eq!(impls.len(), 1);
        assert_eq!(impls[0].status, Status::Yellow);
        assert_eq!(impls[0].notes.as_deref(), Some("x"));
    }

    #[test]
    fn test_green_without_sub_controls_is_allowed() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);

        set_control_status(conn, item_id, control_id, Status::Green, None).unwrap();
        let stored = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Green);
    }

    #[test]
    fn test_green_rejected_while_sub_control_not_green() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);
        let sub_id = add_sub_control(conn, control_id, "MFA");

        set_sub_control_status(conn, item_id, sub_id, Status::Yellow, None).unwrap();
        set_control_status(conn, item_id, control_id, Status::Yellow, Some("wip")).unwrap();

        let result = set_control_status(conn, item_id, control_id, Status::Green, None);
        assert!(matches!(result, Err(SecTrackError::PreconditionFailed(_))));

        // stored status unchanged by the rejected write
        let stored = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, Status::Yellow);
        assert_eq!(stored.notes.as_deref(), Some("wip"));
    }

    #[test]
    fn test_missing_sub_control_row_counts_as_non_green() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);
        add_sub_control(conn, control_id, "MFA");

        // The sub-control was never assessed; the parent cannot be green.
        let result = set_control_status(conn, item_id, control_id, Status::Green, None);
        assert!(matches!(result, Err(SecTrackError::PreconditionFailed(_))));

        assert!(has_non_green_sub_controls(conn, item_id, control_id).unwrap());
    }

    #[test]
    fn test_sub_control_regression_downgrades_green_parent() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);
        let mfa = add_sub_control(conn, control_id, "MFA");
        let rbac = add_sub_control(conn, control_id, "RBAC");

        set_sub_control_status(conn, item_id, mfa, Status::Green, None).unwrap();
        set_sub_control_status(conn, item_id, rbac, Status::Green, None).unwrap();
        set_control_status(conn, item_id, control_id, Status::Green, Some("all good")).unwrap();

        // One sub-control regresses; no direct parent write happens.
        set_sub_control_status(conn, item_id, mfa, Status::Red, Some("token outage")).unwrap();

        let parent = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(parent.status, Status::Yellow);
        assert_eq!(
            parent.notes.as_deref(),
            Some("all good (Downgraded due to sub-control status)")
        );
    }

    #[test]
    fn test_downgrade_only_fires_on_green_parent() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);
        let mfa = add_sub_control(conn, control_id, "MFA");

        set_control_status(conn, item_id, control_id, Status::Yellow, Some("wip")).unwrap();
        set_sub_control_status(conn, item_id, mfa, Status::Red, None).unwrap();

        let parent = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(parent.status, Status::Yellow);
        assert_eq!(parent.notes.as_deref(), Some("wip"));
    }

    #[test]
    fn test_sub_control_write_without_parent_row_does_not_create_one() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);
        let mfa = add_sub_control(conn, control_id, "MFA");

        set_sub_control_status(conn, item_id, mfa, Status::Red, None).unwrap();

        assert!(ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .is_none());
        assert_eq!(SubControlImplementation::list(conn).unwrap().len(), 1);
    }

    #[test]
    fn test_new_sub_control_does_not_retroactively_downgrade() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);

        set_control_status(conn, item_id, control_id, Status::Green, None).unwrap();

        // Adding a sub-control leaves the parent green until the next
        // sub-control status write.
        let mfa = add_sub_control(conn, control_id, "MFA");
        let parent = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(parent.status, Status::Green);

        set_sub_control_status(conn, item_id, mfa, Status::Yellow, None).unwrap();
        let parent = ControlImplementation::get_by_pair(conn, item_id, control_id)
            .unwrap()
            .unwrap();
        assert_eq!(parent.status, Status::Yellow);
    }

    #[test]
    fn test_writes_against_missing_references_are_not_found() {
        let conn = &mut open_test_db();
        let (item_id, control_id) = seed_pair(conn);

        assert!(matches!(
            set_control_status(conn, 999, control_id, Status::Red, None),
            Err(SecTrackError::NotFound(_))
        ));
        assert!(matches!(
            set_control_status(conn, item_id, 999, Status::Red, None),
            Err(SecTrackError::NotFound(_))
        ));
        assert!(matches!(
            set_sub_control_status(conn, item_id, 999, Status::Red, None),
            Err(SecTrackError::NotFound(_))
        ));
    }
}
