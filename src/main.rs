use clap::{error::ErrorKind, Parser};
use serde::Serialize;
use skillboard_processor::{
    args::{Args, Mode},
    database::db::DbClient,
    error::Error,
    model::RatingEngine
};
use tracing::{error, info};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if e.kind() == ErrorKind::MissingRequiredArgument => {
            eprintln!("CONNECTION_STRING environment variable must be set");
            e.exit()
        }
        Err(e) => e.exit()
    };
    init_logging(&args.log_level);

    let client = match DbClient::connect(&args.connection_string).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to connect to database: {}", e);
            error!("Application cannot start without a valid database connection");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(client, &args).await {
        error!("Processing failed: {}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let indicatif_layer = IndicatifLayer::new();
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stderr_writer()))
        .with(indicatif_layer)
        .init();
}

async fn run(client: DbClient, args: &Args) -> Result<(), Error> {
    client.migrate().await?;
    let engine = RatingEngine::with_default_model(client);

    match (args.mode, args.board) {
        (Mode::Settle, Some(board)) => report(&[engine.settle_board(board, args.max_passes).await?]),
        (Mode::Settle, None) => report(&engine.settle_all(args.max_passes).await?),
        (Mode::Replay, Some(board)) => report(&[engine.replay(board).await?]),
        (Mode::Replay, None) => report(&engine.replay_all().await?)
    }

    info!("Processing complete");
    Ok(())
}

fn report<T: Serialize>(summaries: &[T]) {
    match serde_json::to_string_pretty(summaries) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialise summary: {}", e)
    }
}
