use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;

use slack_archive::slack::{SlackApi, SlackConfig};
use slack_archive::sync::{
    ArchiveError, ArchiveStore, PgArchiveStore, Scheduler, SyncConfig, run_migrations,
};

#[derive(Parser, Debug)]
#[command(
    name = "archive_ctl",
    about = "Operate the workspace archive without starting the HTTP server"
)]
struct Args {
    /// Postgres connection string; defaults to `DATABASE_URL`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run exactly one ingestion pass and exit.
    Pass,
    /// Print ingestion progress counts.
    Status,
}

#[tokio::main]
async fn main() -> Result<(), ArchiveError> {
    slack_archive::init_logger();

    let args = Args::parse();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;
    run_migrations(&pool).await?;

    let store = PgArchiveStore::new(pool.clone());

    match args.command {
        Command::Pass => {
            let api = SlackApi::from_config(&SlackConfig::from_env()?)?;
            let mut scheduler = Scheduler::new(store, api, SyncConfig::from_env());
            let report = scheduler.run_pass(chrono::Utc::now()).await?;
            println!("{report}");
        }
        Command::Status => {
            let progress = store.progress().await?;
            println!("members          {}", progress.members);
            println!("channels         {}", progress.channels);
            println!(
                "channel backfill {} pending, {} completed",
                progress.channels_pending, progress.channels_completed
            );
            println!("messages         {}", progress.messages);
            println!("replies          {}", progress.replies);
            println!(
                "reply queue      {} pending, {} completed",
                progress.reply_queue_pending, progress.reply_queue_completed
            );
        }
    }

    pool.close().await;
    Ok(())
}
