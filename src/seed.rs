use log::info;
use rusqlite::Connection;

use crate::backup;
use crate::controls::{NewControl, SecurityControl};
use crate::error::SecTrackError;
use crate::implementations::{set_control_status, Status};
use crate::items::{Criticality, Item, NewItem};

struct SeedItem {
    name: &'static str,
    description: &'static str,
    category: &'static str,
    item_type: &'static str,
    owner: &'static str,
    criticality: Criticality,
}

const SEED_ITEMS: &[SeedItem] = &[
    SeedItem {
        name: "Customer Portal Web Application",
        description: "Public-facing web application for customer self-service",
        category: "Web Application",
        item_type: "Application",
        owner: "Engineering Team",
        criticality: Criticality::High,
    },
    SeedItem {
        name: "Payment Processing System",
        description: "Core payment processing infrastructure",
        category: "Financial System",
        item_type: "System",
        owner: "Finance Team",
        criticality: Criticality::Critical,
    },
    SeedItem {
        name: "Employee Database",
        description: "Internal HR database containing employee records",
        category: "Database",
        item_type: "Database",
        owner: "HR Team",
        criticality: Criticality::High,
    },
    SeedItem {
        name: "Marketing Website",
        description: "Public marketing and company information website",
        category: "Web Application",
        item_type: "Application",
        owner: "Marketing Team",
        criticality: Criticality::Medium,
    },
];

const SEED_CONTROLS: &[(&str, &str)] = &[
    ("Access Control", "User authentication and authorization"),
    ("Data Encryption", "Encryption of sensitive data"),
    (
        "Vulnerability Management",
        "Regular vulnerability scanning and patching",
    ),
    ("Audit Logging", "System and user activity logging"),
    ("Backup and Recovery", "Data backup and disaster recovery"),
];

// (item index, control index, status, notes)
const SEED_STATUSES: &[(usize, usize, Status, &str)] = &[
    (0, 0, Status::Green, "Multi-factor authentication implemented"),
    (0, 1, Status::Green, "TLS 1.3 and AES-256 encryption in place"),
    (0, 2, Status::Yellow, "Weekly scans running, CI/CD integration in progress"),
    (0, 3, Status::Green, "Comprehensive audit logging implemented"),
    (0, 4, Status::Yellow, "Daily backups configured, testing recovery procedures"),
    (1, 0, Status::Green, "Hardware security modules and biometric auth"),
    (1, 1, Status::Green, "PCI DSS compliant encryption and tokenization"),
    (1, 2, Status::Green, "Automated vulnerability scanning with immediate alerts"),
    (1, 3, Status::Green, "Tamper-evident transaction logging"),
    (1, 4, Status::Green, "Real-time replication and tested disaster recovery"),
    (2, 0, Status::Green, "Active Directory integration with role-based access"),
    (2, 1, Status::Yellow, "Database encryption enabled, reviewing key management"),
    (2, 2, Status::Yellow, "Monthly scans scheduled, working on patch automation"),
    (2, 3, Status::Green, "All HR database access logged and monitored"),
    (2, 4, Status::Red, "Backup infrastructure pending budget approval"),
    (3, 0, Status::Yellow, "Basic authentication, planning MFA implementation"),
    (3, 1, Status::Green, "HTTPS enabled, no sensitive data collected"),
    (3, 2, Status::Yellow, "Monthly scans running, working on automated patching"),
    (3, 3, Status::Yellow, "Basic web server logs, enhancing monitoring"),
    (3, 4, Status::Green, "Static site with automated daily backups"),
];

/// Loads the example data set into an empty database. Refuses to touch a
/// database that already holds rows.
pub fn seed(conn: &mut Connection) -> Result<(), SecTrackError> {
    if !backup::is_empty(conn)? {
        return Err(SecTrackError::PreconditionFailed(
            "Database is not empty; refusing to seed".to_string(),
        ));
    }

    let mut item_ids = Vec::with_capacity(SEED_ITEMS.len());
    for seed_item in SEED_ITEMS {
        let item = Item::create(
            conn,
            NewItem {
                name: seed_item.name.to_string(),
                description: Some(seed_item.description.to_string()),
                category: Some(seed_item.category.to_string()),
                item_type: Some(seed_item.item_type.to_string()),
                owner: Some(seed_item.owner.to_string()),
                criticality: seed_item.criticality,
                tags: vec![],
            },
        )?;
        item_ids.push(item.id);
    }

    let mut control_ids = Vec::with_capacity(SEED_CONTROLS.len());
    for (name, description) in SEED_CONTROLS {
        let control = SecurityControl::create(
            conn,
            NewControl {
                name: name.to_string(),
                description: Some(description.to_string()),
            },
        )?;
        control_ids.push(control.id);
    }

    for (item_index, control_index, status, notes) in SEED_STATUSES {
        set_control_status(
            conn,
            item_ids[*item_index],
            control_ids[*control_index],
            *status,
            Some(notes),
        )?;
    }

    info!(
        "Seeded {} items, {} controls, {} implementations",
        SEED_ITEMS.len(),
        SEED_CONTROLS.len(),
        SEED_STATUSES.len()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::open_test_db;
    use crate::implementations::ControlImplementation;

    #[test]
    fn test_seed_fills_empty_database() {
        let conn = &mut open_test_db();
        seed(conn).unwrap();

        assert_eq!(Item::list(conn).unwrap().len(), 4);
        assert_eq!(SecurityControl::list(conn).unwrap().len(), 5);
        assert_eq!(ControlImplementation::list(conn).unwrap().len(), 20);
    }

    #[test]
    fn test_seed_refuses_populated_database() {
        let conn = &mut open_test_db();
        seed(conn).unwrap();

        assert!(matches!(
            seed(conn),
            Err(SecTrackError::PreconditionFailed(_))
        ));
    }
}
