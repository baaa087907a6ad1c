//! Account and container database probes.
//!
//! Each partition collects its `.db` files during the walk; once the
//! subtree is done they are read here, oldest first. Access is strictly
//! read-only and single-row; any open or query error logs, leaves the
//! sentinel fields in place, and never fails the walk.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::warn;

/// Row read from `account_stat`. Numeric sentinels are `-1`, text
/// sentinels empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountDbRecord {
    pub account: String,
    pub status: String,
    pub container_count: i64,
    pub object_count: i64,
    pub bytes_used: i64,
}

impl Default for AccountDbRecord {
    fn default() -> Self {
        Self {
            account: String::new(),
            status: String::new(),
            container_count: -1,
            object_count: -1,
            bytes_used: -1,
        }
    }
}

/// Row read from `container_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerDbRecord {
    pub account: String,
    pub container: String,
    pub status: String,
    pub object_count: i64,
    pub bytes_used: i64,
    pub policy_index: i64,
}

impl Default for ContainerDbRecord {
    fn default() -> Self {
        Self {
            account: String::new(),
            container: String::new(),
            status: String::new(),
            object_count: -1,
            bytes_used: -1,
            policy_index: -1,
        }
    }
}

/// Read the single `account_stat` row. rusqlite is synchronous, so the
/// read runs on the blocking pool.
pub async fn index_account(path: PathBuf) -> AccountDbRecord {
    tokio::task::spawn_blocking(move || read_account(&path))
        .await
        .unwrap_or_default()
}

/// Read the single `container_info` row on the blocking pool.
pub async fn index_container(path: PathBuf) -> ContainerDbRecord {
    tokio::task::spawn_blocking(move || read_container(&path))
        .await
        .unwrap_or_default()
}

fn open_readonly(path: &Path) -> Option<Connection> {
    match Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY) {
        Ok(conn) => Some(conn),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "open sqlite file failed");
            None
        }
    }
}

fn read_account(path: &Path) -> AccountDbRecord {
    let mut record = AccountDbRecord::default();
    let Some(conn) = open_readonly(path) else {
        return record;
    };

    let result = conn.query_row(
        "SELECT account, status, container_count, object_count, bytes_used \
         FROM account_stat LIMIT 1",
        [],
        |row| {
            Ok(AccountDbRecord {
                account: row.get(0)?,
                status: row.get(1)?,
                container_count: row.get(2)?,
                object_count: row.get(3)?,
                bytes_used: row.get(4)?,
            })
        },
    );

    match result {
        Ok(read) => record = read,
        Err(rusqlite::Error::QueryReturnedNoRows) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "sql query failed"),
    }
    record
}

fn read_container(path: &Path) -> ContainerDbRecord {
    let mut record = ContainerDbRecord::default();
    let Some(conn) = open_readonly(path) else {
        return record;
    };

    let result = conn.query_row(
        "SELECT account, container, status, reported_object_count, reported_bytes_used, \
                storage_policy_index \
         FROM container_info LIMIT 1",
        [],
        |row| {
            Ok(ContainerDbRecord {
                account: row.get(0)?,
                container: row.get(1)?,
                status: row.get(2)?,
                object_count: row.get(3)?,
                bytes_used: row.get(4)?,
                policy_index: row.get(5)?,
            })
        },
    );

    match result {
        Ok(read) => record = read,
        Err(rusqlite::Error::QueryReturnedNoRows) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "sql query failed"),
    }
    record
}
