// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("no.minibors", "Minibors", "minibors"));

/// Environment variable overriding the database location.
pub const DB_ENV: &str = "MINIBORS_DB";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("minibors.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    open_at(&path)
}

pub fn open_at(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    init_schema(&conn)?;
    debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS profiles(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        password_hash TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- exactly one role per user
    CREATE TABLE IF NOT EXISTS user_roles(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL UNIQUE,
        role TEXT NOT NULL CHECK(role IN ('admin','investor','company')),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES profiles(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS user_pins(
        user_id INTEGER PRIMARY KEY,
        pin_hash TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES profiles(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS companies(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        sector TEXT NOT NULL,
        description TEXT,
        website TEXT,
        approved INTEGER NOT NULL DEFAULT 0,
        approved_at TEXT,
        approved_by INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(owner_id) REFERENCES profiles(id) ON DELETE CASCADE,
        FOREIGN KEY(approved_by) REFERENCES profiles(id) ON DELETE SET NULL
    );
    CREATE INDEX IF NOT EXISTS idx_companies_owner ON companies(owner_id);

    CREATE TABLE IF NOT EXISTS company_applications(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        company_name TEXT NOT NULL,
        org_number TEXT,
        contact_person TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT,
        website TEXT,
        sector TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','approved','rejected')),
        rejection_reason TEXT,
        reviewed_at TEXT,
        reviewed_by INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(user_id) REFERENCES profiles(id) ON DELETE CASCADE,
        FOREIGN KEY(reviewed_by) REFERENCES profiles(id) ON DELETE SET NULL
    );

    -- one complaint per rejected application
    CREATE TABLE IF NOT EXISTS application_complaints(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        application_id INTEGER NOT NULL UNIQUE,
        user_id INTEGER NOT NULL,
        message TEXT NOT NULL,
        resolved INTEGER NOT NULL DEFAULT 0,
        resolved_at TEXT,
        resolved_by INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(application_id) REFERENCES company_applications(id) ON DELETE CASCADE,
        FOREIGN KEY(user_id) REFERENCES profiles(id) ON DELETE CASCADE,
        FOREIGN KEY(resolved_by) REFERENCES profiles(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS stock_requests(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        symbol TEXT NOT NULL,
        price TEXT NOT NULL,
        total_shares INTEGER NOT NULL CHECK(total_shares > 0),
        sector TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL DEFAULT 'pending' CHECK(status IN ('pending','approved','rejected')),
        reviewed_at TEXT,
        reviewed_by INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(company_id) REFERENCES companies(id) ON DELETE CASCADE,
        FOREIGN KEY(reviewed_by) REFERENCES profiles(id) ON DELETE SET NULL
    );

    CREATE TABLE IF NOT EXISTS stocks(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        company_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        symbol TEXT NOT NULL,
        price TEXT NOT NULL,
        total_shares INTEGER NOT NULL CHECK(total_shares > 0),
        available_shares INTEGER NOT NULL
            CHECK(available_shares >= 0 AND available_shares <= total_shares),
        sector TEXT NOT NULL,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(company_id) REFERENCES companies(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_stocks_created ON stocks(created_at);

    CREATE TABLE IF NOT EXISTS investments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        investor_id INTEGER NOT NULL,
        stock_id INTEGER NOT NULL,
        shares INTEGER NOT NULL CHECK(shares > 0),
        price_per_share TEXT NOT NULL,
        total_amount TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(investor_id) REFERENCES profiles(id),
        FOREIGN KEY(stock_id) REFERENCES stocks(id)
    );
    CREATE INDEX IF NOT EXISTS idx_investments_investor ON investments(investor_id);
    CREATE INDEX IF NOT EXISTS idx_investments_stock ON investments(stock_id);
    "#,
    )?;
    Ok(())
}
