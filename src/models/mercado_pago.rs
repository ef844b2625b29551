use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Everything the gateway can do wrong - network, non-2xx, malformed body -
/// is flattened into this one shape so callers only ever branch once.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct GatewayError {
  pub message: String,
}

impl GatewayError {
  fn from_response(code: u16, response: ureq::Response) -> Self {
    let message = response
      .into_json::<serde_json::Value>()
      .ok()
      .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(str::to_string))
      .unwrap_or_else(|| format!("gateway returned status {}", code));
    GatewayError { message }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixCharge {
  pub id: String,
  pub status: String,
  pub pix_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentStatus {
  pub status: String,
  pub amount: f64,
  pub currency: String,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
  id: i64,
  status: String,
  point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
  transaction_data: Option<TransactionData>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
  qr_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentLookup {
  status: String,
  transaction_amount: f64,
  currency_id: String,
}

#[derive(Clone)]
pub struct MercadoPago {
  base_url: String,
  access_token: String,
  agent: ureq::Agent,
}

impl MercadoPago {
  pub fn new(base_url: &str, access_token: &str) -> Self {
    let agent = ureq::AgentBuilder::new()
      .timeout(Duration::from_secs(10))
      .build();

    MercadoPago {
      base_url: base_url.trim_end_matches('/').to_string(),
      access_token: access_token.to_string(),
      agent,
    }
  }

  pub fn create_pix_payment(
    &self,
    amount: f64,
    description: &str,
  ) -> std::result::Result<PixCharge, GatewayError> {
    let body = serde_json::json!({
      "transaction_amount": amount,
      "description": description,
      "payment_method_id": "pix",
      "payer": {
        "email": "payer@example.com",
        "first_name": "VIP",
        "last_name": "Member",
      }
    });

    let payment: PaymentResponse = self.send(|| {
      self
        .agent
        .post(&format!("{}/v1/payments", self.base_url))
        .set("Authorization", &format!("Bearer {}", self.access_token))
        .send_json(&body)
    })?;

    let pix_code = payment
      .point_of_interaction
      .and_then(|poi| poi.transaction_data)
      .and_then(|data| data.qr_code)
      .ok_or_else(|| GatewayError {
        message: "PIX code missing from gateway response".to_string(),
      })?;

    Ok(PixCharge {
      id: payment.id.to_string(),
      status: payment.status,
      pix_code,
    })
  }

  pub fn check_payment(
    &self,
    payment_id: &str,
  ) -> std::result::Result<PaymentStatus, GatewayError> {
    let payment: PaymentLookup = self.send(|| {
      self
        .agent
        .get(&format!("{}/v1/payments/{}", self.base_url, payment_id))
        .set("Authorization", &format!("Bearer {}", self.access_token))
        .call()
    })?;

    Ok(PaymentStatus {
      status: payment.status,
      amount: payment.transaction_amount,
      currency: payment.currency_id,
    })
  }

  // Transport failures and 5xx responses get exactly one retry. 4xx responses
  // are final and surface the gateway's own message when it sends one.
  fn send<T: DeserializeOwned>(
    &self,
    request: impl Fn() -> std::result::Result<ureq::Response, ureq::Error>,
  ) -> std::result::Result<T, GatewayError> {
    let mut attempts = 0;
    loop {
      attempts += 1;
      match request() {
        Ok(response) => {
          return response.into_json().map_err(|e| GatewayError {
            message: format!("malformed gateway response: {}", e),
          })
        }
        Err(ureq::Error::Status(code, response)) if code < 500 => {
          return Err(GatewayError::from_response(code, response))
        }
        Err(err) if attempts < 2 => {
          tracing::warn!("gateway request failed, retrying once: {}", err);
        }
        Err(ureq::Error::Status(code, response)) => {
          return Err(GatewayError::from_response(code, response))
        }
        Err(err) => return Err(GatewayError { message: err.to_string() }),
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::test_support::{pix_payment_json, payment_lookup_json};

  fn client(server: &mockito::ServerGuard) -> MercadoPago {
    MercadoPago::new(&server.url(), "test-token")
  }

  #[test]
  fn creates_pix_payment() {
    let mut server = mockito::Server::new();
    let mock = server
      .mock("POST", "/v1/payments")
      .match_header("authorization", "Bearer test-token")
      .with_status(201)
      .with_body(pix_payment_json(12345, "pending", Some("00020126pixcode")).to_string())
      .create();

    let charge = client(&server)
      .create_pix_payment(10.0, "VIP subscription - 30 days")
      .expect("pix charge");

    assert_eq!(charge.id, "12345");
    assert_eq!(charge.status, "pending");
    assert_eq!(charge.pix_code, "00020126pixcode");
    mock.assert();
  }

  #[test]
  fn missing_pix_code_is_an_error() {
    let mut server = mockito::Server::new();
    server
      .mock("POST", "/v1/payments")
      .with_status(201)
      .with_body(pix_payment_json(12345, "pending", None).to_string())
      .create();

    let err = client(&server)
      .create_pix_payment(10.0, "VIP subscription - 30 days")
      .unwrap_err();

    assert_eq!(err.message, "PIX code missing from gateway response");
  }

  #[test]
  fn client_errors_surface_gateway_message_without_retry() {
    let mut server = mockito::Server::new();
    let mock = server
      .mock("POST", "/v1/payments")
      .with_status(400)
      .with_body(r#"{"message":"invalid access token"}"#)
      .expect(1)
      .create();

    let err = client(&server)
      .create_pix_payment(10.0, "VIP subscription - 30 days")
      .unwrap_err();

    assert_eq!(err.message, "invalid access token");
    mock.assert();
  }

  #[test]
  fn server_errors_are_retried_once() {
    let mut server = mockito::Server::new();
    let mock = server
      .mock("GET", "/v1/payments/99")
      .with_status(503)
      .with_body(r#"{"message":"down for maintenance"}"#)
      .expect(2)
      .create();

    let err = client(&server).check_payment("99").unwrap_err();

    assert_eq!(err.message, "down for maintenance");
    mock.assert();
  }

  #[test]
  fn checks_payment_status() {
    let mut server = mockito::Server::new();
    server
      .mock("GET", "/v1/payments/12345")
      .match_header("authorization", "Bearer test-token")
      .with_body(payment_lookup_json("approved", 10.0, "BRL").to_string())
      .create();

    let status = client(&server).check_payment("12345").expect("payment status");

    assert_eq!(
      status,
      PaymentStatus { status: "approved".to_string(), amount: 10.0, currency: "BRL".to_string() }
    );
  }
}
