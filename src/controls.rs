use std::collections::HashSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::SecTrackError;
use crate::utils::now_iso;

/// A top-level security control category (e.g. "Access Control").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityControl {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A finer-grained requirement under exactly one control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubControl {
    pub id: i64,
    pub control_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewControl {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ControlPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewSubControl {
    pub control_id: i64,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubControlPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl SecurityControl {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SecurityControl {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            sort_order: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    /// Controls in display order.
    pub fn list(conn: &Connection) -> Result<Vec<SecurityControl>, SecTrackError> {
        let mut stmt = conn.prepare(
            "SELECT id, name, description, sort_order, created_at, updated_at
             FROM security_controls
             ORDER BY sort_order ASC, id ASC",
        )?;
        let rows = stmt.query_map([], SecurityControl::from_row)?;
        let mut controls = Vec::new();
        for row in rows {
            controls.push(row?);
        }
        Ok(controls)
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<SecurityControl>, SecTrackError> {
        conn.query_row(
            "SELECT id, name, description, sort_order, created_at, updated_at
             FROM security_controls WHERE id = ?",
            [id],
            SecurityControl::from_row,
        )
        .optional()
        .map_err(SecTrackError::DatabaseError)
    }

    /// New controls append at the end of the display order.
    pub fn create(conn: &Connection, new: NewControl) -> Result<SecurityControl, SecTrackError> {
        if new.name.trim().is_empty() {
            return Err(SecTrackError::Validation(
                "Control name is required".to_string(),
            ));
        }

        let now = now_iso();
        let sort_order: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM security_controls",
            [],
            |row| row.get(0),
        )?;

        let id: i64 = conn.query_row(
            "INSERT INTO security_controls (name, description, sort_order, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING id",
            params![new.name, new.description, sort_order, now],
            |row| row.get(0),
        )?;

        Ok(SecurityControl {
            id,
            name: new.name,
            description: new.description,
            sort_order,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn update(conn: &Connection, id: i64, patch: ControlPatch) -> Result<(), SecTrackError> {
        let existing = SecurityControl::get_by_id(conn, id)?
            .ok_or_else(|| SecTrackError::NotFound(format!("Control {} not found", id)))?;

        let name = patch.name.unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(SecTrackError::Validation(
                "Control name is required".to_string(),
            ));
        }

        conn.execute(
            "UPDATE security_controls SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                name,
                patch.description.or(existing.description),
                now_iso(),
                id
            ],
        )?;

        Ok(())
    }

    /// Deletes the control, its sub-controls, and every implementation row
    /// referencing either, as a single transaction.
    pub fn delete(conn: &mut Connection, id: i64) -> Result<(), SecTrackError> {
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row("SELECT 1 FROM security_controls WHERE id = ?", [id], |_| {
                Ok(true)
            })
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(SecTrackError::NotFound(format!("Control {} not found", id)));
        }

        tx.execute(
            "DELETE FROM sub_control_implementations
             WHERE sub_control_id IN (SELECT id FROM sub_controls WHERE control_id = ?)",
            [id],
        )?;
        tx.execute("DELETE FROM sub_controls WHERE control_id = ?", [id])?;
        tx.execute(
            "DELETE FROM control_implementations WHERE control_id = ?",
            [id],
        )?;
        tx.execute("DELETE FROM security_controls WHERE id = ?", [id])?;

        tx.commit()?;
        Ok(())
    }

    /// Rewrites sort_order for every control to its position in
    /// `ordered_ids` (0-indexed). The sequence must cover exactly the
    /// existing control ids; anything missing or unknown is rejected so a
    /// stale client cannot silently drop controls from the ordering.
    pub fn reorder(conn: &mut Connection, ordered_ids: &[i64]) -> Result<(), SecTrackError> {
        let tx = conn.transaction()?;

        let existing: HashSet<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM security_controls")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };

        let given: HashSet<i64> = ordered_ids.iter().copied().collect();
        if given.len() != ordered_ids.len() {
            return Err(SecTrackError::Validation(
                "Duplicate control id in reorder sequence".to_string(),
            ));
        }
        if given != existing {
            return Err(SecTrackError::Validation(format!(
                "Reorder sequence must contain every control id exactly once ({} given, {} exist)",
                given.len(),
                existing.len()
            )));
        }

        let now = now_iso();
        for (position, control_id) in ordered_ids.iter().enumerate() {
            tx.execute(
                "UPDATE security_controls SET sort_order = ?1, updated_at = ?2 WHERE id = ?3",
                params![position as i64, now, control_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

impl SubControl {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SubControl {
            id: row.get(0)?,
            control_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    pub fn list(conn: &Connection) -> Result<Vec<SubControl>, SecTrackError> {
        let mut stmt = conn.prepare(
            "SELECT id, control_id, name, description, created_at, updated_at
             FROM sub_controls ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], SubControl::from_row)?;
        let mut sub_controls = Vec::new();
        for row in rows {
            sub_controls.push(row?);
        }
        Ok(sub_controls)
    }

    pub fn list_by_control(
        conn: &Connection,
        control_id: i64,
    ) -> Result<Vec<SubControl>, SecTrackError> {
        let mut stmt = conn.prepare(
            "SELECT id, control_id, name, description, created_at, updated_at
             FROM sub_controls WHERE control_id = ? ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([control_id], SubControl::from_row)?;
        let mut sub_controls = Vec::new();
        for row in rows {
            sub_controls.push(row?);
        }
        Ok(sub_controls)
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<SubControl>, SecTrackError> {
        conn.query_row(
            "SELECT id, control_id, name, description, created_at, updated_at
             FROM sub_controls WHERE id = ?",
            [id],
            SubControl::from_row,
        )
        .optional()
        .map_err(SecTrackError::DatabaseError)
    }

    /// Creating a sub-control under a currently green parent does not touch
    /// the parent's stored status. The parent is only re-evaluated on the
    /// next sub-control status write.
    pub fn create(conn: &Connection, new: NewSubControl) -> Result<SubControl, SecTrackError> {
        if new.name.trim().is_empty() {
            return Err(SecTrackError::Validation(
                "Sub-control name is required".to_string(),
            ));
        }

        let parent_exists = SecurityControl::get_by_id(conn, new.control_id)?.is_some();
        if !parent_exists {
            return Err(SecTrackError::NotFound(format!(
                "Control {} not found",
                new.control_id
            )));
        }

        let now = now_iso();
        let id: i64 = conn.query_row(
            "INSERT INTO sub_controls (control_id, name, description, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING id",
            params![new.control_id, new.name, new.description, now],
            |row| row.get(0),
        )?;

        Ok(SubControl {
            id,
            control_id: new.control_id,
            name: new.name,
            description: new.description,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn update(conn: &Connection, id: i64, patch: SubControlPatch) -> Result<(), SecTrackError> {
        let existing = SubControl::get_by_id(conn, id)?
            .ok_or_else(|| SecTrackError::NotFound(format!("Sub-control {} not found", id)))?;

        let name = patch.name.unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(SecTrackError::Validation(
                "Sub-control name is required".to_string(),
            ));
        }

        conn.execute(
            "UPDATE sub_controls SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                name,
                patch.description.or(existing.description),
                now_iso(),
                id
            ],
        )?;

        Ok(())
    }

    pub fn delete(conn: &mut Connection, id: i64) -> Result<(), SecTrackError> {
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row("SELECT 1 FROM sub_controls WHERE id = ?", [id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(SecTrackError::NotFound(format!(
                "Sub-control {} not found",
                id
            )));
        }

        tx.execute(
            "DELETE FROM sub_control_implementations WHERE sub_control_id = ?",
            [id],
        )?;
        tx.execute("DELETE FROM sub_controls WHERE id = ?", [id])?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_test_db;
    use pretty_assertions::assert_eq;

    fn control(conn: &Connection, name: &str) -> SecurityControl {
        SecurityControl::create(
            conn,
            NewControl {
                name: name.to_string(),
                description: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_create_assigns_increasing_sort_order() {
        let conn = open_test_db();
        let a = control(&conn, "Access Control");
        let b = control(&conn, "Data Encryption");
        let c = control(&conn, "Audit Logging");

        assert_eq!((a.sort_order, b.sort_order, c.sort_order), (0, 1, 2));
        let listed: Vec<i64> = SecurityControl::list(&conn)
            .unwrap()
            .iter()
            .map(|ctl| ctl.id)
            .collect();
        assert_eq!(listed, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn test_reorder_rewrites_sort_order_by_position() {
        let conn = &mut open_test_db();
        let a = control(conn, "Access Control");
        let b = control(conn, "Data Encryption");
        let c = control(conn, "Audit Logging");

        SecurityControl::reorder(conn, &[c.id, a.id, b.id]).unwrap();

        let listed: Vec<(i64, i64)> = SecurityControl::list(conn)
            .unwrap()
            .iter()
            .map(|ctl| (ctl.id, ctl.sort_order))
            .collect();
        assert_eq!(listed, vec![(c.id, 0), (a.id, 1), (b.id, 2)]);
    }

    #[test]
    fn test_reorder_rejects_incomplete_or_unknown_ids() {
        let conn = &mut open_test_db();
        let a = control(conn, "Access Control");
        let b = control(conn, "Data Encryption");

        // missing b
        assert!(matches!(
            SecurityControl::reorder(conn, &[a.id]),
            Err(SecTrackError::Validation(_))
        ));
        // unknown id
        assert!(matches!(
            SecurityControl::reorder(conn, &[a.id, b.id, 999]),
            Err(SecTrackError::Validation(_))
        ));
        // duplicate
        assert!(matches!(
            SecurityControl::reorder(conn, &[a.id, a.id]),
            Err(SecTrackError::Validation(_))
        ));

        // ordering unchanged after the failed attempts
        let listed: Vec<i64> = SecurityControl::list(conn)
            .unwrap()
            .iter()
            .map(|ctl| ctl.id)
            .collect();
        assert_eq!(listed, vec![a.id, b.id]);
    }

    #[test]
    fn test_sub_control_requires_existing_parent() {
        let conn = open_test_db();
        let result = SubControl::create(
            &conn,
            NewSubControl {
                control_id: 42,
                name: "MFA".to_string(),
                description: None,
            },
        );
        assert!(matches!(result, Err(SecTrackError::NotFound(_))));
    }

    #[test]
    fn test_sub_controls_listed_by_owning_control() {
        let conn = open_test_db();
        let a = control(&conn, "Access Control");
        let b = control(&conn, "Data Encryption");

        for name in ["MFA", "RBAC"] {
            SubControl::create(
                &conn,
                NewSubControl {
                    control_id: a.id,
                    name: name.to_string(),
                    description: None,
                },
            )
            .unwrap();
        }
        SubControl::create(
            &conn,
            NewSubControl {
                control_id: b.id,
                name: "At-rest encryption".to_string(),
                description: None,
            },
        )
        .unwrap();

        let names: Vec<String> = SubControl::list_by_control(&conn, a.id)
            .unwrap()
            .into_iter()
            .map(|sc| sc.name)
            .collect();
        assert_eq!(names, vec!["MFA", "RBAC"]);
        assert_eq!(SubControl::list(&conn).unwrap().len(), 3);
    }

    #[test]
    fn test_delete_control_cascades_sub_controls() {
        let conn = &mut open_test_db();
        let a = control(conn, "Access Control");
        SubControl::create(
            conn,
            NewSubControl {
                control_id: a.id,
                name: "MFA".to_string(),
                description: None,
            },
        )
        .unwrap();

        SecurityControl::delete(conn, a.id).unwrap();

        assert!(SecurityControl::get_by_id(conn, a.id).unwrap().is_none());
        assert!(SubControl::list(conn).unwrap().is_empty());
    }
}
