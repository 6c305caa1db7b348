//! Conciliar CLI - Bank statement reconciliation
//!
//! Usage:
//!   conciliar init                                  Initialize database
//!   conciliar statement import-items 1 --file CSV   Load normalized bank lines
//!   conciliar auto-match 1                          Run the batch matcher
//!   conciliar suggest 42                            Rank candidates for a line
//!   conciliar serve --port 3000                     Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = cli.config.as_deref();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, config),
        Commands::Serve { port, host } => commands::cmd_serve(&cli.db, config, &host, port).await,
        Commands::Statement { action } => {
            let db = commands::open_db(&cli.db, config)?;
            match action {
                StatementAction::Create {
                    company,
                    account,
                    period,
                    amount_tolerance,
                    date_tolerance,
                } => commands::cmd_statement_create(
                    &db,
                    company,
                    account,
                    &period,
                    amount_tolerance,
                    date_tolerance,
                ),
                StatementAction::List { company } => commands::cmd_statement_list(&db, company),
                StatementAction::Show { id, state } => commands::cmd_statement_show(&db, id, &state),
                StatementAction::ImportItems { id, file } => {
                    commands::cmd_statement_import_items(&db, id, &file)
                }
            }
        }
        Commands::Records { action } => {
            let db = commands::open_db(&cli.db, config)?;
            match action {
                RecordsAction::Add {
                    company,
                    account,
                    date,
                    amount,
                    direction,
                    category,
                    document,
                    counterparty_id,
                    counterparty_name,
                    description,
                } => commands::cmd_records_add(
                    &db,
                    commands::RecordArgs {
                        company_id: company,
                        account_id: account,
                        date: &date,
                        amount,
                        direction: &direction,
                        category: &category,
                        document_number: document.as_deref(),
                        counterparty_id,
                        counterparty_name: counterparty_name.as_deref(),
                        description: description.as_deref(),
                    },
                ),
                RecordsAction::Import {
                    company,
                    account,
                    file,
                } => commands::cmd_records_import(&db, company, account, &file),
                RecordsAction::Unmatched {
                    account,
                    company,
                    direction,
                    from,
                    to,
                    min,
                    max,
                    search,
                    limit,
                } => commands::cmd_records_unmatched(
                    &db,
                    account,
                    commands::UnmatchedArgs {
                        company_id: company,
                        direction: direction.as_deref(),
                        from: from.as_deref(),
                        to: to.as_deref(),
                        min_amount: min,
                        max_amount: max,
                        search: search.as_deref(),
                        limit,
                    },
                ),
            }
        }
        Commands::AutoMatch {
            statement_id,
            no_patterns,
            json,
        } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_auto_match(&db, statement_id, !no_patterns, json)
        }
        Commands::Suggest { item_id, json } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_suggest(&db, item_id, json)
        }
        Commands::Match { item_id, record_id } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_match(&db, item_id, record_id, &cli.user)
        }
        Commands::Unmatch { item_id } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_unmatch(&db, item_id)
        }
        Commands::Resolve { item_id, notes } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_resolve(&db, item_id, &notes, &cli.user)
        }
        Commands::Materialize {
            item_id,
            reference_type,
            description,
        } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_materialize(
                &db,
                item_id,
                reference_type.as_deref(),
                description.as_deref(),
                &cli.user,
            )
        }
        Commands::Summary { statement_id, json } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_summary(&db, statement_id, json)
        }
        Commands::Verify { statement_id } => {
            let db = commands::open_db(&cli.db, config)?;
            commands::cmd_verify(&db, statement_id)
        }
    }
}
