//! Conversational front-end: start command, invite links, and Mini App
//! payloads.

use std::sync::Arc;

use serde::Deserialize;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage, Message, User, WebAppInfo,
};
use tracing::{debug, info, warn};
use url::Url;

use giftlink_shared::constants::INVITE_PREFIX;
use giftlink_shared::UserClaims;

use crate::service::{ContactService, ServiceError};

const SELECT_GIFT_CALLBACK: &str = "select_gift";
const PICK_GIFT_LABEL: &str = "🎁 Pick a gift";

const WELCOME_TEXT: &str =
    "👋 Hi! I'll help you find the perfect gift.\n\nTap the button below to get started:";
const INVITED_WELCOME_TEXT: &str = "👋 Welcome!\n\n\
     You were invited by another user. You can now use the bot to pick gifts!";
const MINI_APP_SOON_TEXT: &str = "The Mini App will open here soon! 🚀";

/// What a `/start` message asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartCommand<'a> {
    Plain,
    Invite { inviter_id: &'a str },
}

/// Parse `/start`, `/start@bot`, and their optional deep-link payload.
/// Returns `None` for anything that is not a start command.
pub fn parse_start(text: &str) -> Option<StartCommand<'_>> {
    let mut parts = text.split_whitespace();
    let command = parts.next()?;
    let command = command.split('@').next().unwrap_or(command);
    if command != "/start" {
        return None;
    }

    let invite = parts
        .next()
        .and_then(|param| param.strip_prefix(INVITE_PREFIX))
        .filter(|id| !id.is_empty());

    Some(match invite {
        Some(inviter_id) => StartCommand::Invite { inviter_id },
        None => StartCommand::Plain,
    })
}

/// Gift request sent from the Mini App through `sendData`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GiftRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub budget: Option<serde_json::Value>,
}

impl GiftRequest {
    pub fn summary(&self) -> String {
        let budget = match &self.budget {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        };
        format!(
            "🎁 Gift request received!\n\nFor: {}\nOccasion: {}\nBudget: {}",
            self.name.as_deref().unwrap_or("-"),
            self.event.as_deref().unwrap_or("-"),
            budget,
        )
    }
}

fn claims_from(user: &User) -> UserClaims {
    let mut claims = UserClaims::new(user.id.0);
    claims.username = user.username.clone();
    claims.first_name = Some(user.first_name.clone());
    claims.last_name = user.last_name.clone();
    claims.language_code = user.language_code.clone();
    claims
}

pub struct GiftBot {
    bot: Bot,
    service: Arc<ContactService>,
    mini_app_url: Url,
}

impl GiftBot {
    pub fn new(bot: Bot, service: Arc<ContactService>, mini_app_url: Url) -> Self {
        Self {
            bot,
            service,
            mini_app_url,
        }
    }

    /// Run the long-polling dispatcher until it is shut down.
    pub async fn start(self: Arc<Self>) {
        info!("Starting bot dispatcher");

        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint({
                let gift_bot = Arc::clone(&self);
                move |msg: Message, bot: Bot| {
                    let gift_bot = Arc::clone(&gift_bot);
                    async move {
                        gift_bot.handle_message(msg, bot).await;
                        respond(())
                    }
                }
            }))
            .branch(Update::filter_callback_query().endpoint({
                let gift_bot = Arc::clone(&self);
                move |q: CallbackQuery, bot: Bot| {
                    let gift_bot = Arc::clone(&gift_bot);
                    async move {
                        gift_bot.handle_callback(q, bot).await;
                        respond(())
                    }
                }
            }));

        Dispatcher::builder(self.bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;
    }

    fn keyboard(&self) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
            PICK_GIFT_LABEL,
            WebAppInfo {
                url: self.mini_app_url.clone(),
            },
        )]])
    }

    async fn handle_message(&self, msg: Message, bot: Bot) {
        if let Some(data) = msg.web_app_data() {
            self.handle_web_app_data(&msg, &data.data, &bot).await;
            return;
        }

        let Some(text) = msg.text() else {
            return;
        };
        let Some(command) = parse_start(text) else {
            return;
        };
        let Some(user) = msg.from.as_ref() else {
            return;
        };

        let claims = claims_from(user);
        let reply = match self.handle_start(&claims, command).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(user_id = claims.id, error = %e, "Start command failed");
                WELCOME_TEXT
            }
        };

        if let Err(e) = bot
            .send_message(msg.chat.id, reply)
            .reply_markup(self.keyboard())
            .await
        {
            warn!(chat_id = msg.chat.id.0, error = %e, "Failed to send welcome");
        }
    }

    /// Register the sender and, for invite links, accept the invitation.
    async fn handle_start(
        &self,
        claims: &UserClaims,
        command: StartCommand<'_>,
    ) -> Result<&'static str, ServiceError> {
        self.service.ensure_user(claims).await?;

        let StartCommand::Invite { inviter_id } = command else {
            return Ok(WELCOME_TEXT);
        };

        if inviter_id == claims.user_id() {
            debug!(user_id = claims.id, "Ignoring own invite link");
            return Ok(WELCOME_TEXT);
        }

        self.service.accept_invitation(inviter_id, claims).await?;
        Ok(INVITED_WELCOME_TEXT)
    }

    async fn handle_web_app_data(&self, msg: &Message, data: &str, bot: &Bot) {
        let reply = match serde_json::from_str::<GiftRequest>(data) {
            Ok(request) => {
                debug!(chat_id = msg.chat.id.0, "Gift request from Mini App");
                request.summary()
            }
            Err(e) => {
                warn!(chat_id = msg.chat.id.0, error = %e, "Unreadable Mini App payload");
                "Sorry, I couldn't read that request.".to_string()
            }
        };

        if let Err(e) = bot.send_message(msg.chat.id, reply).await {
            warn!(error = %e, "Failed to answer Mini App payload");
        }
    }

    async fn handle_callback(&self, q: CallbackQuery, bot: Bot) {
        if q.data.as_deref() != Some(SELECT_GIFT_CALLBACK) {
            answer_callback(&bot, q.id).await;
            return;
        }

        if let Some(MaybeInaccessibleMessage::Regular(m)) = &q.message {
            if let Err(e) = bot.send_message(m.chat.id, MINI_APP_SOON_TEXT).await {
                warn!(error = %e, "Failed to answer select_gift");
            }
        }
        answer_callback(&bot, q.id).await;
    }
}

/// Stop the client's loading indicator. Returns whether the answer was
/// delivered.
async fn answer_callback(bot: &Bot, query_id: String) -> bool {
    match bot.answer_callback_query(query_id.clone()).await {
        Ok(_) => true,
        Err(e) => {
            warn!(query_id, error = %e, "Failed to answer callback query");
            false
        }
    }
}
