use chrono::{DateTime, Utc};
use figment::{providers::Env, Figment};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::error::Result;

pub mod mercado_pago;
pub mod subscription;

pub use mercado_pago::{GatewayError, MercadoPago, PaymentStatus, PixCharge};
pub use subscription::{ConfirmOutcome, SubscribeOutcome, Subscription, SubscriptionHub};

pub type UtcDateTime = DateTime<Utc>;

/// Subscriptions last this long, counted from request or confirmation time.
pub const SUBSCRIPTION_DAYS: i64 = 30;
/// Invite links are single use and die after this many hours.
pub const INVITE_LINK_HOURS: i64 = 24;

pub const SUBSCRIPTION_DESCRIPTION: &str = "VIP subscription - 30 days";

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
  pub telegram_bot_token: String,
  pub vip_group_id: i64,
  pub mercado_pago_access_token: String,
  #[serde(default = "default_database_uri")]
  pub database_uri: String,
  #[serde(default = "default_mercado_pago_api_url")]
  pub mercado_pago_api_url: String,
  #[serde(default = "default_subscription_price")]
  pub subscription_price: f64,
}

fn default_database_uri() -> String {
  "sqlite:vipbot.db".to_string()
}

fn default_mercado_pago_api_url() -> String {
  "https://api.mercadopago.com".to_string()
}

fn default_subscription_price() -> f64 {
  10.0
}

impl AppSettings {
  pub fn from_env() -> Result<Self> {
    Ok(Figment::new().merge(Env::raw()).extract()?)
  }

  pub async fn into_app(self) -> Result<App> {
    let options = SqliteConnectOptions::from_str(&self.database_uri)?.create_if_missing(true);
    // One long-lived connection: writes stay serialized and in-memory
    // databases keep their contents for the life of the pool.
    let db = SqlitePoolOptions::new()
      .max_connections(1)
      .idle_timeout(None)
      .max_lifetime(None)
      .connect_with(options)
      .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let pago = MercadoPago::new(&self.mercado_pago_api_url, &self.mercado_pago_access_token);

    Ok(App { settings: self, db, pago })
  }
}

#[derive(Clone)]
pub struct App {
  pub settings: AppSettings,
  pub db: SqlitePool,
  pub pago: MercadoPago,
}

impl App {
  pub fn subscriptions(&self) -> SubscriptionHub<'_> {
    SubscriptionHub { app: self }
  }
}
