// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use dotenvy::dotenv;
use tracing_subscriber::EnvFilter;

use minibors::{cli, commands, db};

fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = match matches.get_one::<String>("db") {
        Some(path) => db::open_at(path)?,
        None => db::open_or_init()?,
    };

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized.");
        }
        Some(("auth", sub)) => commands::auth::handle(&mut conn, sub)?,
        Some(("dashboard", sub)) => commands::dashboard::handle(&conn, sub)?,
        Some(("stocks", sub)) => commands::stocks::handle(&conn, sub)?,
        Some(("buy", sub)) => commands::purchase::handle(&mut conn, sub)?,
        Some(("portfolio", sub)) => commands::portfolio::handle(&conn, sub)?,
        Some(("company", sub)) => commands::companies::handle(&conn, sub)?,
        Some(("application", sub)) => commands::applications::handle(&mut conn, sub)?,
        Some(("complaint", sub)) => commands::applications::handle_complaints(&conn, sub)?,
        Some(("request", sub)) => commands::requests::handle(&mut conn, sub)?,
        Some(("stats", sub)) => commands::dashboard::handle_stats(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
