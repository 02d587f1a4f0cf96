// Content-crawl ETL connector
//
// Runs one crawl cycle: acquire the run lock, decide full vs incremental,
// drive Extract → Transform → Publish against the configured search index,
// then report and unlock.
//
// Exit codes: 0 normal, 1 fatal-init, 2 lock-busy.

use log::{error, info};
use std::process::ExitCode;
use std::sync::Arc;

use nsd_connector::queue::AbortFlag;
use nsd_connector::run::{CrawlType, RunController};
use nsd_connector::{HttpSearchIndex, load_properties};

fn usage() -> ! {
    eprintln!("Usage: nsd-connector <config-file> [--full|--incremental] [--prefix <namespace>]");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        usage();
    };
    let mut force = None;
    let mut prefix = "connector".to_string();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--full" => force = Some(CrawlType::Full),
            "--incremental" => force = Some(CrawlType::Incremental),
            "--prefix" => match args.next() {
                Some(value) => prefix = value,
                None => usage(),
            },
            _ => usage(),
        }
    }

    let config = match load_properties(config_path.as_ref(), &prefix) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::from(1);
        }
    };

    let Some(index_url) = config.index_url().map(ToString::to_string) else {
        error!("Missing configuration: {prefix}.index_url");
        return ExitCode::from(1);
    };
    let client = match config.http_client() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {e}");
            return ExitCode::from(1);
        }
    };
    let index = Arc::new(HttpSearchIndex::new(index_url, client));

    let controller = RunController::new(config, index);
    let outcome = controller.run_once(force, AbortFlag::new()).await;
    info!(
        "Run finished: {:?} ({} document(s) published, {} commit(s))",
        outcome.status, outcome.published, outcome.commits
    );
    ExitCode::from(u8::try_from(outcome.exit_code).unwrap_or(1))
}
