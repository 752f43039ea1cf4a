// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::db::DB_ENV;
use clap::{Arg, ArgAction, Command, crate_version};

fn req(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(true).help(help)
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn json_flags() -> [Arg; 2] {
    [
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    ]
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Print as pretty JSON")
}

fn status_filter() -> Arg {
    opt("status", "Only show pending, approved or rejected entries")
        .value_parser(["pending", "approved", "rejected"])
}

pub fn build_cli() -> Command {
    Command::new("minibors")
        .version(crate_version!())
        .about("Minibørs: list and trade shares in private companies")
        .arg(
            Arg::new("db")
                .long("db")
                .global(true)
                .env(DB_ENV)
                .help("Path to the SQLite database"),
        )
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("auth")
                .about("Sign up, log in and manage the PIN")
                .subcommand(
                    Command::new("signup")
                        .about("Register a new investor account")
                        .arg(req("email", "Email address"))
                        .arg(req("password", "Password, at least 6 characters"))
                        .arg(opt("name", "Full name")),
                )
                .subcommand(
                    Command::new("login")
                        .arg(req("email", "Email address"))
                        .arg(req("password", "Password")),
                )
                .subcommand(Command::new("logout"))
                .subcommand(Command::new("whoami"))
                .subcommand(
                    Command::new("set-pin")
                        .about("Create a 6-digit PIN for quick login")
                        .arg(req("pin", "6-digit PIN"))
                        .arg(req("confirm", "Repeat the PIN")),
                )
                .subcommand(
                    Command::new("pin-login")
                        .arg(req("email", "Email address"))
                        .arg(req("pin", "6-digit PIN")),
                )
                .subcommand(
                    Command::new("grant-admin")
                        .about("Make a user admin (open until the first admin exists)")
                        .arg(req("email", "Email of the user to promote")),
                ),
        )
        .subcommand(
            Command::new("dashboard")
                .about("Show the view for your role")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("stocks")
                .about("Browse and list stocks")
                .subcommand(
                    Command::new("list")
                        .about("Stocks with shares for sale")
                        .args(json_flags()),
                )
                .subcommand(
                    Command::new("show")
                        .arg(req("id", "Stock id"))
                        .arg(json_flag()),
                )
                .subcommand(
                    Command::new("create")
                        .about("List a stock directly (admin)")
                        .arg(req("company", "Company id"))
                        .arg(req("name", "Stock name"))
                        .arg(req("symbol", "Ticker symbol, A-Z and 0-9"))
                        .arg(req("price", "Price per share in NOK"))
                        .arg(req("shares", "Total shares issued"))
                        .arg(req("sector", "Sector"))
                        .arg(opt("description", "Description")),
                ),
        )
        .subcommand(
            Command::new("buy")
                .about("Buy shares of a stock")
                .arg(req("stock", "Stock id"))
                .arg(req("shares", "Number of shares")),
        )
        .subcommand(
            Command::new("portfolio")
                .about("Your holdings and other investors' portfolios")
                .subcommand(Command::new("mine").args(json_flags()))
                .subcommand(
                    Command::new("public")
                        .arg(opt("search", "Filter by investor name or email"))
                        .args(json_flags()),
                ),
        )
        .subcommand(
            Command::new("company")
                .about("Company profile and application")
                .subcommand(
                    Command::new("apply")
                        .about("Apply to become a listed company")
                        .arg(req("name", "Company name"))
                        .arg(
                            Arg::new("org_number")
                                .long("org-number")
                                .help("Organisation number"),
                        )
                        .arg(req("contact", "Contact person"))
                        .arg(req("email", "Contact email"))
                        .arg(opt("phone", "Phone"))
                        .arg(opt("website", "Website URL"))
                        .arg(req("sector", "Sector"))
                        .arg(req("description", "At least 50 characters")),
                )
                .subcommand(Command::new("status").arg(json_flag()))
                .subcommand(
                    Command::new("create")
                        .about("Create an approved company for a user (admin)")
                        .arg(req("owner", "Owner's email"))
                        .arg(req("name", "Company name"))
                        .arg(req("sector", "Sector"))
                        .arg(opt("description", "Description"))
                        .arg(opt("website", "Website URL")),
                )
                .subcommand(Command::new("list").args(json_flags())),
        )
        .subcommand(
            Command::new("application")
                .about("Review company applications")
                .subcommand(
                    Command::new("list")
                        .arg(status_filter())
                        .args(json_flags()),
                )
                .subcommand(Command::new("approve").arg(req("id", "Application id")))
                .subcommand(
                    Command::new("reject")
                        .arg(req("id", "Application id"))
                        .arg(req("reason", "Reason shown to the applicant")),
                )
                .subcommand(
                    Command::new("complain")
                        .about("Complain about a rejected application")
                        .arg(req("id", "Application id")),
                ),
        )
        .subcommand(
            Command::new("complaint")
                .about("Handle complaints on rejected applications (admin)")
                .subcommand(
                    Command::new("list")
                        .arg(
                            Arg::new("open")
                                .long("open")
                                .action(ArgAction::SetTrue)
                                .help("Only unresolved complaints"),
                        )
                        .args(json_flags()),
                )
                .subcommand(Command::new("resolve").arg(req("id", "Complaint id"))),
        )
        .subcommand(
            Command::new("request")
                .about("Stock listing requests")
                .subcommand(
                    Command::new("submit")
                        .about("Ask the admins to list a stock for your company")
                        .arg(req("name", "Stock name"))
                        .arg(req("symbol", "Ticker symbol"))
                        .arg(req("price", "Price per share in NOK"))
                        .arg(req("shares", "Total shares to issue"))
                        .arg(req("sector", "Sector"))
                        .arg(req("description", "10 to 500 characters")),
                )
                .subcommand(
                    Command::new("list")
                        .arg(status_filter())
                        .args(json_flags()),
                )
                .subcommand(Command::new("approve").arg(req("id", "Request id")))
                .subcommand(Command::new("reject").arg(req("id", "Request id"))),
        )
        .subcommand(
            Command::new("stats")
                .about("Platform counts (admin)")
                .arg(json_flag()),
        )
        .subcommand(Command::new("doctor").about("Check share counts for inconsistencies"))
        .subcommand(
            Command::new("export").subcommand(
                Command::new("investments")
                    .arg(
                        opt("format", "csv or json")
                            .default_value("csv")
                            .value_parser(["csv", "json"]),
                    )
                    .arg(req("out", "Output file")),
            ),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        build_cli().debug_assert();
    }

    #[test]
    fn org_number_uses_dashed_flag() {
        let m = build_cli().get_matches_from([
            "minibors",
            "company",
            "apply",
            "--name",
            "Nordlys AS",
            "--org-number",
            "912345678",
            "--contact",
            "Kari",
            "--email",
            "kari@nordlys.no",
            "--sector",
            "Energi",
            "--description",
            "x",
        ]);
        let (_, company) = m.subcommand().unwrap();
        let (_, apply) = company.subcommand().unwrap();
        assert_eq!(
            apply.get_one::<String>("org_number").map(String::as_str),
            Some("912345678")
        );
    }
}
