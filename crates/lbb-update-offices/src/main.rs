use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use lbb_common::db::{UpdateReport, create_pool_from_url, run_migrations, update_offices};
use lbb_common::logging::{init_tracing_subscriber, install_tracing_panic_hook};
use lbb_common::run_id;
use tracing::{info, warn};

/// Writes admin and third-party office overrides onto the office table.
#[derive(Debug, Parser)]
#[command(name = "lbb-update-offices")]
struct Cli {
    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL")]
    db_url: String,

    /// Skip schema migrations when the schema is managed elsewhere
    #[arg(long, env = "LBB_SKIP_MIGRATIONS", default_value_t = false)]
    skip_migrations: bool,
}

fn summary(report: &UpdateReport) -> String {
    format!(
        "{} override(s), {} office(s) updated, {} email(s) blacklisted, {} unknown siret(s)",
        report.overrides,
        report.offices_updated,
        report.blacklisted_emails,
        report.missing_sirets.len()
    )
}

async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing_subscriber(env!("CARGO_PKG_NAME"));
    install_tracing_panic_hook(env!("CARGO_PKG_NAME"));

    let args = Cli::parse();
    let run_id = run_id::get();
    let pool = create_pool_from_url(&args.db_url).context("failed to create postgres pool")?;

    if args.skip_migrations {
        warn!(run_id, "skipping schema migrations");
    } else {
        run_migrations(&pool).await.context("failed to run migrations")?;
    }

    let report = update_offices(&pool, run_id)
        .await
        .context("failed to apply office overrides")?;
    info!(run_id, summary = %summary(&report), "update_offices finished");

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!(error = %format!("{err:#}"), "lbb-update-offices failed");
        eprintln!("lbb-update-offices failed: {err:#}");
        std::process::exit(1);
    }
}
