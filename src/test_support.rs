use serde_json::{json, Value};
use teloxide::Bot;

use crate::models::{App, AppSettings};

pub async fn test_app(gateway_url: &str) -> App {
  let settings = AppSettings {
    telegram_bot_token: "123:TEST".to_string(),
    vip_group_id: -1001234,
    mercado_pago_access_token: "test-token".to_string(),
    database_uri: "sqlite::memory:".to_string(),
    mercado_pago_api_url: gateway_url.to_string(),
    subscription_price: 10.0,
  };
  settings.into_app().await.expect("test app")
}

pub fn test_bot(api_url: &str) -> Bot {
  Bot::new("123:TEST").set_api_url(url::Url::parse(api_url).expect("api url"))
}

pub fn pix_payment_json(id: i64, status: &str, qr_code: Option<&str>) -> Value {
  json!({
    "id": id,
    "status": status,
    "point_of_interaction": {
      "transaction_data": {
        "qr_code": qr_code,
      }
    }
  })
}

pub fn payment_lookup_json(status: &str, amount: f64, currency: &str) -> Value {
  json!({
    "status": status,
    "transaction_amount": amount,
    "currency_id": currency,
  })
}

pub fn invite_link_json(link: &str) -> Value {
  json!({
    "ok": true,
    "result": {
      "invite_link": link,
      "creator": { "id": 42, "is_bot": true, "first_name": "vipbot" },
      "creates_join_request": false,
      "is_primary": false,
      "is_revoked": false,
    }
  })
}
