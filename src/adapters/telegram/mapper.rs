//! Bot API wire types and their mapping to what the application sees.
//!
//! Only the fields we read are modelled; serde ignores the rest.

use serde::Deserialize;

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<TgMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgMessage {
    pub chat: TgChat,
    pub from: Option<TgUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

/// A batch of updates sorted out by sender.
#[derive(Debug, Default, PartialEq)]
pub struct RoutedUpdates {
    /// Texts typed in the admin chat, in arrival order.
    pub admin_texts: Vec<String>,
    /// Notices about messages from anyone else, to be forwarded to the admin.
    pub stranger_notices: Vec<String>,
    /// Offset acknowledging the whole batch.
    pub next_offset: Option<i64>,
}

/// Split a `getUpdates` batch into admin input and notices about strangers.
pub fn route_updates(updates: Vec<Update>, admin_chat_id: i64) -> RoutedUpdates {
    let mut routed = RoutedUpdates::default();
    for update in updates {
        routed.next_offset = Some(
            routed
                .next_offset
                .map_or(update.update_id + 1, |o| o.max(update.update_id + 1)),
        );
        let Some(message) = update.message else {
            continue;
        };
        let Some(text) = message.text else {
            continue;
        };
        if message.chat.id == admin_chat_id {
            routed.admin_texts.push(text.trim().to_string());
        } else {
            routed
                .stranger_notices
                .push(stranger_notice(message.from.as_ref(), message.chat.id, &text));
        }
    }
    routed
}

fn stranger_notice(from: Option<&TgUser>, chat_id: i64, text: &str) -> String {
    let who = match from {
        Some(user) => {
            let full_name = match &user.last_name {
                Some(last) => format!("{} {}", user.first_name, last),
                None => user.first_name.clone(),
            };
            match &user.username {
                Some(username) => format!("@{} ({}, id {})", username, full_name, user.id),
                None => format!("{} (id {})", full_name, user.id),
            }
        }
        None => format!("chat {}", chat_id),
    };
    format!("Неизвестный пользователь {} написал: \n{}", who, text)
}

/// Wrap text in a MarkdownV2 `pre` block. Inside it only `` ` `` and `\` need escaping.
pub fn preformatted(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('`', "\\`");
    format!("```\n{}```", escaped)
}
