use dotenv::dotenv;
use std::error::Error;

use kalender::day_detail::DayDetailService;
use kalender::sync::{BatchSync, SyncOutcome};
use kalender::{AppConfig, YEAR};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load()?;
    let service = DayDetailService::from_config(&config)?;
    let sync = BatchSync::new(service, config.sync.batch_delay());

    let mut progress = sync.subscribe();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            if let Some(progress) = *progress.borrow_and_update() {
                log::info!("{} / {} days", progress.current, progress.total);
            }
        }
    });

    let outcome = sync.sync_year(YEAR).await;
    drop(sync);
    reporter.await?;

    match outcome {
        SyncOutcome::Completed { fetched, failed } => {
            println!("fetched {fetched} days, {failed} failed");
        }
        SyncOutcome::NothingToDo => println!("all days of {YEAR} are cached already"),
        SyncOutcome::Unavailable => {
            return Err("no API key configured, set GEMINI_API_KEY or KAL_ENRICHMENT__API_KEY".into())
        }
        SyncOutcome::AlreadyRunning => println!("another sync is running"),
    }

    Ok(())
}
