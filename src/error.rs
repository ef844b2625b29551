use crate::models::mercado_pago::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error(transparent)]
  IOError(#[from] std::io::Error),
  #[error(transparent)]
  DatabaseError(#[from] sqlx::Error),
  #[error(transparent)]
  Migration(#[from] sqlx::migrate::MigrateError),
  #[error(transparent)]
  Config(#[from] figment::Error),
  #[error(transparent)]
  JsonSerde(#[from] serde_json::Error),
  #[error(transparent)]
  Telegram(#[from] teloxide::RequestError),
  #[error("Payment gateway error: {0}")]
  Gateway(String),
}

impl From<GatewayError> for Error {
  fn from(err: GatewayError) -> Error {
    Error::Gateway(err.message)
  }
}

pub type Result<T> = std::result::Result<T, Error>;
