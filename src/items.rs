use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::SecTrackError;
use crate::utils::now_iso;

/// How critical the tracked asset is to the business.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
            Criticality::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, SecTrackError> {
        match s {
            "low" => Ok(Criticality::Low),
            "medium" => Ok(Criticality::Medium),
            "high" => Ok(Criticality::High),
            "critical" => Ok(Criticality::Critical),
            _ => Err(SecTrackError::Validation(format!(
                "Invalid criticality: '{}'",
                s
            ))),
        }
    }
}

/// A tracked asset (application, system, database, ...) whose security
/// posture is being assessed. Called "environment" in the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub item_type: Option<String>,
    pub owner: Option<String>,
    pub criticality: Criticality,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields accepted when creating an item. Ids and timestamps are
/// server-assigned.
#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub item_type: Option<String>,
    pub owner: Option<String>,
    pub criticality: Criticality,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub item_type: Option<String>,
    pub owner: Option<String>,
    pub criticality: Option<Criticality>,
    pub tags: Option<Vec<String>>,
}

const ITEM_COLUMNS: &str =
    "id, name, description, category, item_type, owner, criticality, tags, created_at, updated_at";

impl Item {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let criticality: String = row.get(6)?;
        let tags_json: Option<String> = row.get(7)?;
        let tags = tags_json
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        Ok(Item {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            item_type: row.get(4)?,
            owner: row.get(5)?,
            criticality: Criticality::from_str(&criticality).unwrap_or(Criticality::Medium),
            tags,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    pub fn list(conn: &Connection) -> Result<Vec<Item>, SecTrackError> {
        let mut stmt =
            conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY id ASC"))?;
        let rows = stmt.query_map([], Item::from_row)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Item>, SecTrackError> {
        conn.query_row(
            &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"),
            [id],
            Item::from_row,
        )
        .optional()
        .map_err(SecTrackError::DatabaseError)
    }

    pub fn create(conn: &Connection, new: NewItem) -> Result<Item, SecTrackError> {
        if new.name.trim().is_empty() {
            return Err(SecTrackError::Validation("Item name is required".to_string()));
        }

        let now = now_iso();
        let tags_json = serde_json::to_string(&new.tags)?;

        let id: i64 = conn.query_row(
            "INSERT INTO items (name, description, category, item_type, owner, criticality, tags, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             RETURNING id",
            params![
                new.name,
                new.description,
                new.category,
                new.item_type,
                new.owner,
                new.criticality.as_str(),
                tags_json,
                now,
            ],
            |row| row.get(0),
        )?;

        Ok(Item {
            id,
            name: new.name,
            description: new.description,
            category: new.category,
            item_type: new.item_type,
            owner: new.owner,
            criticality: new.criticality,
            tags: new.tags,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    /// Merges the patch into the stored row and rewrites it. created_at is
    /// preserved; updated_at is refreshed.
    pub fn update(conn: &Connection, id: i64, patch: ItemPatch) -> Result<(), SecTrackError> {
        let existing = Item::get_by_id(conn, id)?
            .ok_or_else(|| SecTrackError::NotFound(format!("Item {} not found", id)))?;

        let name = patch.name.unwrap_or(existing.name);
        if name.trim().is_empty() {
            return Err(SecTrackError::Validation("Item name is required".to_string()));
        }

        let tags = patch.tags.unwrap_or(existing.tags);
        let tags_json = serde_json::to_string(&tags)?;

        conn.execute(
            "UPDATE items
             SET name = ?1, description = ?2, category = ?3, item_type = ?4,
                 owner = ?5, criticality = ?6, tags = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                name,
                patch.description.or(existing.description),
                patch.category.or(existing.category),
                patch.item_type.or(existing.item_type),
                patch.owner.or(existing.owner),
                patch.criticality.unwrap_or(existing.criticality).as_str(),
                tags_json,
                now_iso(),
                id,
            ],
        )?;

        Ok(())
    }

    /// Deletes the item together with every implementation row that points
    /// at it. Runs in one transaction so a crash cannot leave orphans.
    pub fn delete(conn: &mut Connection, id: i64) -> Result<(), SecTrackError> {
        let tx = conn.transaction()?;

        let exists: bool = tx
            .query_row("SELECT 1 FROM items WHERE id = ?", [id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if !exists {
            return Err(SecTrackError::NotFound(format!("Item {} not found", id)));
        }

        tx.execute(
            "DELETE FROM sub_control_implementations WHERE item_id = ?",
            [id],
        )?;
        tx.execute("DELETE FROM control_implementations WHERE item_id = ?", [id])?;
        tx.execute("DELETE FROM items WHERE id = ?", [id])?;

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_test_db;
    use pretty_assertions::assert_eq;

    fn sample_item() -> NewItem {
        NewItem {
            name: "Customer Portal".to_string(),
            description: Some("Public-facing web application".to_string()),
            category: Some("Web Application".to_string()),
            item_type: Some("Application".to_string()),
            owner: Some("Engineering Team".to_string()),
            criticality: Criticality::High,
            tags: vec!["pci".to_string(), "external".to_string()],
        }
    }

    #[test]
    fn test_criticality_round_trip() {
        for s in ["low", "medium", "high", "critical"] {
            assert_eq!(Criticality::from_str(s).unwrap().as_str(), s);
        }
        assert!(Criticality::from_str("severe").is_err());
        assert!(Criticality::from_str("").is_err());
    }

    #[test]
    fn test_create_and_get_preserves_tags() {
        let conn = open_test_db();
        let created = Item::create(&conn, sample_item()).unwrap();

        let fetched = Item::get_by_id(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Customer Portal");
        assert_eq!(fetched.criticality, Criticality::High);
        assert_eq!(fetched.tags, vec!["pci", "external"]);
        assert_eq!(fetched.created_at, fetched.updated_at);
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let conn = open_test_db();
        let mut new = sample_item();
        new.name = "  ".to_string();
        assert!(matches!(
            Item::create(&conn, new),
            Err(SecTrackError::Validation(_))
        ));
    }

    #[test]
    fn test_update_merges_partial_fields() {
        let conn = open_test_db();
        let created = Item::create(&conn, sample_item()).unwrap();

        Item::update(
            &conn,
            created.id,
            ItemPatch {
                owner: Some("Platform Team".to_string()),
                criticality: Some(Criticality::Critical),
                ..Default::default()
            },
        )
        .unwrap();

        let fetched = Item::get_by_id(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched.owner.as_deref(), Some("Platform Team"));
        assert_eq!(fetched.criticality, Criticality::Critical);
        // untouched fields survive
        assert_eq!(fetched.name, "Customer Portal");
        assert_eq!(fetched.tags, vec!["pci", "external"]);
    }

    #[test]
    fn test_update_missing_item_is_not_found() {
        let conn = open_test_db();
        assert!(matches!(
            Item::update(&conn, 42, ItemPatch::default()),
            Err(SecTrackError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_missing_item_is_not_found() {
        let mut conn = open_test_db();
        assert!(matches!(
            Item::delete(&mut conn, 42),
            Err(SecTrackError::NotFound(_))
        ));
    }
}
