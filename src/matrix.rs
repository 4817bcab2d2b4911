use std::collections::BTreeMap;

use rusqlite::Connection;
use serde::Serialize;

use crate::controls::SecurityControl;
use crate::error::SecTrackError;
use crate::implementations::{ControlImplementation, Status};
use crate::items::Item;

const NOT_IMPLEMENTED_NOTES: &str = "Not implemented";

/// One cell of the environments x controls grid.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixCell {
    pub status: Status,
    pub notes: String,
}

/// An item annotated with its status for every control. Pairs with no
/// stored implementation row default to red / "Not implemented"; nothing
/// gray or "unknown" is ever materialized here.
#[derive(Debug, Serialize)]
pub struct MatrixEnvironment {
    #[serde(flatten)]
    pub item: Item,
    #[serde(rename = "controlStatuses")]
    pub control_statuses: BTreeMap<i64, MatrixCell>,
}

#[derive(Debug, Serialize)]
pub struct Matrix {
    pub controls: Vec<SecurityControl>,
    pub environments: Vec<MatrixEnvironment>,
}

/// Joins every item against every control, filling stored implementation
/// rows into the grid. Three full-table reads, assembled in memory; the
/// stored row set is small (items x controls).
pub fn get_matrix(conn: &Connection) -> Result<Matrix, SecTrackError> {
    let controls = SecurityControl::list(conn)?;
    let items = Item::list(conn)?;
    let implementations = ControlImplementation::list(conn)?;

    let mut stored: BTreeMap<(i64, i64), &ControlImplementation> = BTreeMap::new();
    for implementation in &implementations {
        stored.insert(
            (implementation.item_id, implementation.control_id),
            implementation,
        );
    }

    let environments = items
        .into_iter()
        .map(|item| {
            let control_statuses = controls
                .iter()
                .map(|control| {
                    let cell = match stored.get(&(item.id, control.id)) {
                        Some(implementation) => MatrixCell {
                            status: implementation.status,
                            notes: implementation
                                .notes
                                .clone()
                                .unwrap_or_else(|| NOT_IMPLEMENTED_NOTES.to_string()),
                        },
                        None => MatrixCell {
                            status: Status::Red,
                            notes: NOT_IMPLEMENTED_NOTES.to_string(),
                        },
                    };
                    (control.id, cell)
                })
                .collect();

            MatrixEnvironment {
                item,
                control_statuses,
            }
        })
        .collect();

    Ok(Matrix {
        controls,
        environments,
    })
}
