use chrono::Utc;
use teloxide::Bot;
use tracing::{error, info};

use vipbot::{controllers, models::AppSettings};

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let settings = match AppSettings::from_env() {
    Ok(settings) => settings,
    Err(e) => {
      error!("missing or invalid configuration: {}", e);
      std::process::exit(1);
    }
  };

  let app = match settings.into_app().await {
    Ok(app) => app,
    Err(e) => {
      error!("could not initialize the bot: {}", e);
      std::process::exit(1);
    }
  };

  let bot = Bot::new(app.settings.telegram_bot_token.clone());

  let sweeper = app.clone();
  tokio::spawn(async move {
    let mut every = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
    loop {
      every.tick().await;
      match sweeper.subscriptions().sweep_expired(Utc::now()).await {
        Ok(removed) if removed > 0 => info!("sweep removed {} expired subscriptions", removed),
        Ok(_) => {}
        Err(e) => error!("sweep failed: {}", e),
      }
    }
  });

  info!("starting VIP bot");
  controllers::dispatch(bot, app).await;
}
