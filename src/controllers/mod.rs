use teloxide::{
  dptree,
  prelude::*,
  types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode},
  utils::command::BotCommands,
};
use tracing::{error, info};

use crate::error::Result;
use crate::models::{App, ConfirmOutcome, SubscribeOutcome};

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
  Start,
  Status,
  Subscribe,
}

const WELCOME: &str = "🌟 Welcome to the VIP bot! 🌟\n\n\
  🎯 Available commands:\n\
  • /subscribe - join the VIP group\n\
  • /status - check your subscription\n\n\
  💎 VIP perks:\n\
  • Exclusive access to our secret VIP group\n\
  • Member-only meetups\n\
  • Giveaways\n\
  • News first, right here\n\n\
  Use the button below to get started! 🚀";

const PIX_INSTRUCTIONS: &str = "📱 How to pay with PIX:\n\
  1. Open your banking app\n\
  2. Choose to pay with PIX\n\
  3. Paste the code below\n\
  4. Confirm the payment";

const NOT_A_MEMBER: &str = "❌ You are not a VIP member yet.\n\
  Use /subscribe to become one!";

const RETRY_LATER: &str = "❌ Sorry, something went wrong.\n\
  Please try again in a few minutes or contact support.";

fn subscribe_keyboard() -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
    "💎 Subscribe to VIP - R$ 10.00 monthly",
    "subscribe",
  )]])
}

fn verify_keyboard(payment_id: &str) -> InlineKeyboardMarkup {
  InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
    "✅ Verify payment",
    verify_callback_data(payment_id),
  )]])
}

fn verify_callback_data(payment_id: &str) -> String {
  format!("verify:{}", payment_id)
}

pub async fn dispatch(bot: Bot, app: App) {
  let handler = dptree::entry()
    .branch(Update::filter_message().filter_command::<Command>().endpoint(command))
    .branch(Update::filter_callback_query().endpoint(callback));

  Dispatcher::builder(bot, handler)
    .dependencies(dptree::deps![app])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

async fn command(bot: Bot, msg: Message, cmd: Command, app: App) -> Result<()> {
  let user_id = match msg.from.as_ref() {
    Some(user) => user.id.0 as i64,
    None => return Ok(()),
  };

  match cmd {
    Command::Start => {
      info!("/start from {}", user_id);
      bot
        .send_message(msg.chat.id, WELCOME)
        .reply_markup(subscribe_keyboard())
        .await?;
    }
    Command::Status => {
      info!("/status from {}", user_id);
      status(&bot, msg.chat.id, user_id, &app).await?;
    }
    Command::Subscribe => {
      info!("/subscribe from {}", user_id);
      subscribe(&bot, msg.chat.id, user_id, &app).await?;
    }
  }
  Ok(())
}

async fn callback(bot: Bot, q: CallbackQuery, app: App) -> Result<()> {
  bot.answer_callback_query(q.id.clone()).await?;

  let user_id = q.from.id.0 as i64;
  let chat = q.message.as_ref().map(|m| m.chat().id).unwrap_or(ChatId(user_id));

  let data = match q.data.as_deref() {
    Some(data) => data,
    None => return Ok(()),
  };

  if data == "subscribe" {
    info!("subscribe button from {}", user_id);
    subscribe(&bot, chat, user_id, &app).await?;
  } else if let Some(payment_id) = data.strip_prefix("verify:") {
    info!("verifying payment {} for {}", payment_id, user_id);
    verify(&bot, chat, user_id, payment_id, &app).await?;
  }
  Ok(())
}

async fn status(bot: &Bot, chat: ChatId, user_id: i64, app: &App) -> Result<()> {
  let now = chrono::Utc::now();
  match app.subscriptions().find(user_id).await {
    Ok(Some(sub)) if sub.is_active_at(now) => {
      bot
        .send_message(
          chat,
          format!(
            "✅ You are a VIP member!\n\n📅 Your subscription expires in {} days.",
            sub.days_left(now)
          ),
        )
        .await?;
    }
    Ok(_) => {
      bot.send_message(chat, NOT_A_MEMBER).await?;
    }
    Err(err) => {
      error!("status lookup failed for {}: {}", user_id, err);
      bot.send_message(chat, RETRY_LATER).await?;
    }
  }
  Ok(())
}

async fn subscribe(bot: &Bot, chat: ChatId, user_id: i64, app: &App) -> Result<()> {
  match app.subscriptions().request(user_id).await {
    Ok(SubscribeOutcome::AlreadyActive { invite_link, days_left }) => {
      bot
        .send_message(
          chat,
          format!(
            "✅ You are already a VIP member!\n\n\
             📅 Your subscription expires in {} days.\n\
             🔗 Group link: {}\n\n\
             To renew, wait for your current subscription to expire.",
            days_left, invite_link
          ),
        )
        .await?;
    }
    Ok(SubscribeOutcome::PixCreated { payment_id, pix_code }) => {
      bot.send_message(chat, PIX_INSTRUCTIONS).await?;
      bot
        .send_message(chat, format!("📋 PIX copy and paste code:\n```\n{}\n```", pix_code))
        .parse_mode(ParseMode::MarkdownV2)
        .await?;
      bot
        .send_message(chat, "Tap the button below once you have paid:")
        .reply_markup(verify_keyboard(&payment_id))
        .await?;
    }
    Err(err) => {
      error!("could not create subscription for {}: {}", user_id, err);
      bot.send_message(chat, RETRY_LATER).await?;
    }
  }
  Ok(())
}

async fn verify(bot: &Bot, chat: ChatId, user_id: i64, payment_id: &str, app: &App) -> Result<()> {
  match app.subscriptions().confirm(bot, user_id, payment_id).await {
    Ok(ConfirmOutcome::Approved { invite_link }) => {
      bot
        .send_message(
          chat,
          format!(
            "✅ Payment confirmed!\n\n\
             🎉 Congratulations! You are now a VIP member!\n\n\
             🔗 Use the link below to join the group:\n{}\n\n\
             ⚠️ The link expires in 24 hours.\n\
             💎 Your subscription is valid for 30 days.",
            invite_link
          ),
        )
        .await?;
    }
    Ok(ConfirmOutcome::NotYetApproved) => {
      bot
        .send_message(
          chat,
          "⏳ Your payment has not been confirmed yet.\n\
           Please wait a few minutes and try again.",
        )
        .await?;
    }
    Err(err) => {
      error!("could not verify payment {} for {}: {}", payment_id, user_id, err);
      bot.send_message(chat, RETRY_LATER).await?;
    }
  }
  Ok(())
}
