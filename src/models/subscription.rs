use chrono::{Duration, Utc};
use teloxide::prelude::*;
use teloxide::types::ChatId;

use super::{App, UtcDateTime, INVITE_LINK_HOURS, SUBSCRIPTION_DAYS, SUBSCRIPTION_DESCRIPTION};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Subscription {
  pub user_id: i64,
  pub payment_id: String,
  pub expiration: UtcDateTime,
  pub invite_link: Option<String>,
}

impl Subscription {
  // A payment_id alone is a pending payment, not a membership, even while
  // the optimistic request-time expiration is still in the future.
  pub fn is_active_at(&self, now: UtcDateTime) -> bool {
    self.invite_link.is_some() && self.expiration > now
  }

  pub fn days_left(&self, now: UtcDateTime) -> i64 {
    (self.expiration - now).num_days()
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
  AlreadyActive { invite_link: String, days_left: i64 },
  PixCreated { payment_id: String, pix_code: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
  Approved { invite_link: String },
  NotYetApproved,
}

pub struct SubscriptionHub<'a> {
  pub app: &'a App,
}

/// Store operations. One row per user, writes are all-or-nothing.
impl<'a> SubscriptionHub<'a> {
  pub async fn save(
    &self,
    user_id: i64,
    payment_id: &str,
    expiration: UtcDateTime,
    invite_link: Option<&str>,
  ) -> Result<()> {
    sqlx::query(
      "INSERT OR REPLACE INTO subscriptions (user_id, payment_id, expiration, invite_link)
       VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(payment_id)
    .bind(expiration)
    .bind(invite_link)
    .execute(&self.app.db)
    .await?;
    Ok(())
  }

  pub async fn find(&self, user_id: i64) -> Result<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>(
      "SELECT user_id, payment_id, expiration, invite_link FROM subscriptions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(&self.app.db)
    .await?;
    Ok(subscription)
  }

  pub async fn remove(&self, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM subscriptions WHERE user_id = ?")
      .bind(user_id)
      .execute(&self.app.db)
      .await?;
    Ok(())
  }

  // Expiration alone decides: lapsed PENDING rows are reaped the same way
  // as lapsed ACTIVE ones.
  pub async fn expired_at(&self, now: UtcDateTime) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> =
      sqlx::query_as("SELECT user_id FROM subscriptions WHERE expiration < ?")
        .bind(now)
        .fetch_all(&self.app.db)
        .await?;
    Ok(rows.into_iter().map(|row| row.0).collect())
  }
}

/// Lifecycle: NONE -> PENDING -> ACTIVE -> EXPIRED -> deleted.
impl<'a> SubscriptionHub<'a> {
  pub async fn request(&self, user_id: i64) -> Result<SubscribeOutcome> {
    let now = Utc::now();

    if let Some(subscription) = self.find(user_id).await? {
      if subscription.is_active_at(now) {
        let invite_link = subscription.invite_link.clone().unwrap_or_default();
        return Ok(SubscribeOutcome::AlreadyActive {
          invite_link,
          days_left: subscription.days_left(now),
        });
      }
    }

    tracing::info!("creating PIX payment for user {}", user_id);
    let pago = self.app.pago.clone();
    let price = self.app.settings.subscription_price;
    // ureq blocks, so gateway calls run on the blocking thread pool.
    let charge = tokio::task::spawn_blocking(move || {
      pago.create_pix_payment(price, SUBSCRIPTION_DESCRIPTION)
    })
    .await
    .map_err(|e| crate::Error::Gateway(e.to_string()))??;

    self
      .save(user_id, &charge.id, now + Duration::days(SUBSCRIPTION_DAYS), None)
      .await?;

    Ok(SubscribeOutcome::PixCreated { payment_id: charge.id, pix_code: charge.pix_code })
  }

  pub async fn confirm(
    &self,
    bot: &Bot,
    user_id: i64,
    payment_id: &str,
  ) -> Result<ConfirmOutcome> {
    tracing::info!("checking payment {} for user {}", payment_id, user_id);
    let pago = self.app.pago.clone();
    let id = payment_id.to_string();
    let payment = tokio::task::spawn_blocking(move || pago.check_payment(&id))
      .await
      .map_err(|e| crate::Error::Gateway(e.to_string()))??;

    if payment.status != "approved" {
      return Ok(ConfirmOutcome::NotYetApproved);
    }

    let now = Utc::now();
    let invite = bot
      .create_chat_invite_link(ChatId(self.app.settings.vip_group_id))
      .member_limit(1)
      .expire_date(now + Duration::hours(INVITE_LINK_HOURS))
      .await?;

    self
      .save(
        user_id,
        payment_id,
        now + Duration::days(SUBSCRIPTION_DAYS),
        Some(&invite.invite_link),
      )
      .await?;

    tracing::info!("subscription activated for user {}", user_id);
    Ok(ConfirmOutcome::Approved { invite_link: invite.invite_link })
  }

  pub async fn sweep_expired(&self, now: UtcDateTime) -> Result<u64> {
    let mut removed = 0;
    for user_id in self.expired_at(now).await? {
      self.remove(user_id).await?;
      tracing::info!("expired subscription removed for user {}", user_id);
      removed += 1;
    }
    Ok(removed)
  }
}
