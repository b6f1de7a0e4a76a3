//! Text rendering of Green-API message journal entries.

use serde_json::Value;

const MEDIA_TYPES: [&str; 5] = [
    "imageMessage",
    "videoMessage",
    "documentMessage",
    "audioMessage",
    "stickerMessage",
];

/// The value at a JSON pointer as display text. Numbers and booleans are
/// rendered as JSON; `null` counts as absent.
pub(crate) fn text_at(value: &Value, pointer: &str) -> Option<String> {
    match value.pointer(pointer)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn text_or(value: &Value, pointer: &str, default: &str) -> String {
    text_at(value, pointer).unwrap_or_else(|| default.to_string())
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn media_kind(message_type: &str) -> Option<&str> {
    MEDIA_TYPES
        .contains(&message_type)
        .then(|| message_type.trim_end_matches("Message"))
}

fn media(msg: &Value) -> String {
    format!(
        "{} (URL: {})",
        text_or(msg, "/caption", ""),
        text_or(msg, "/downloadUrl", "No URL")
    )
}

/// One entry of a chat history (`getChatHistory`).
pub fn chat_entry(msg: &Value) -> String {
    let timestamp = text_or(msg, "/timestamp", "Unknown");
    let message_type = text_or(msg, "/typeMessage", "Unknown");
    let outgoing = msg.get("type").and_then(Value::as_str) == Some("outgoing");
    let sender = text_at(msg, "/senderName")
        .unwrap_or_else(|| if outgoing { "You" } else { "Unknown" }.to_string());
    let status = if outgoing {
        format!(" [{}]", text_or(msg, "/statusMessage", "unknown"))
    } else {
        String::new()
    };
    let who = format!("[{timestamp}] {sender}{status}");

    let mut line = match message_type.as_str() {
        "textMessage" => format!("{who}: {}", text_or(msg, "/textMessage", "No text")),
        "locationMessage" => format!(
            "{who} shared location: {} ({}, {})",
            text_or(msg, "/location/nameLocation", "Unknown location"),
            text_or(msg, "/location/latitude", "?"),
            text_or(msg, "/location/longitude", "?")
        ),
        "contactMessage" => format!(
            "{who} shared contact: {}",
            text_or(msg, "/contact/displayName", "Unknown contact")
        ),
        "pollMessage" => {
            let options = msg
                .pointer("/pollMessageData/options")
                .and_then(Value::as_array)
                .map(|opts| {
                    opts.iter()
                        .map(|o| text_or(o, "/optionName", ""))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            format!(
                "{who} created poll: {} [Options: {options}]",
                text_or(msg, "/pollMessageData/name", "Unknown poll")
            )
        }
        "pollUpdateMessage" => {
            let votes = msg
                .pointer("/pollMessageData/votes")
                .and_then(Value::as_array)
                .map(|votes| {
                    votes
                        .iter()
                        .map(|v| {
                            let voters = v
                                .get("optionVoters")
                                .and_then(Value::as_array)
                                .map_or(0, Vec::len);
                            format!("{}: {voters}", text_or(v, "/optionName", ""))
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            format!(
                "[{timestamp}] Poll update for '{}' - Votes: {votes}",
                text_or(msg, "/pollMessageData/name", "Unknown poll")
            )
        }
        "quotedMessage" => format!(
            "{who} replied to {}: {}",
            text_or(msg, "/quotedMessage/typeMessage", "unknown"),
            text_or(msg, "/extendedTextMessage/text", "No text")
        ),
        other => match media_kind(other) {
            Some(kind) => format!("{who} sent {kind}: {}", media(msg)),
            None => format!("{who} sent {other}"),
        },
    };

    if flag(msg, "isDeleted") {
        line.push_str(" (deleted)");
    } else if flag(msg, "isEdited") {
        line.push_str(" (edited)");
    }
    line
}

/// One entry of `lastIncomingMessages`.
pub fn incoming_entry(msg: &Value) -> String {
    let timestamp = text_or(msg, "/timestamp", "Unknown");
    let sender = text_at(msg, "/senderName")
        .or_else(|| text_at(msg, "/senderContactName"))
        .unwrap_or_else(|| "Unknown".to_string());
    let chat_id = text_or(msg, "/chatId", "Unknown Chat");
    let message_type = text_or(msg, "/typeMessage", "Unknown");
    let who = format!("[{timestamp}] {sender} ({chat_id})");

    let mut line = match message_type.as_str() {
        "textMessage" => format!("{who}: {}", text_or(msg, "/textMessage", "No text")),
        "locationMessage" => format!(
            "{who} shared location: {}",
            text_or(msg, "/location/nameLocation", "Unknown location")
        ),
        "contactMessage" => format!(
            "{who} shared contact: {}",
            text_or(msg, "/contact/displayName", "Unknown contact")
        ),
        other => match media_kind(other) {
            Some(kind) => format!("{who} sent {kind}: {}", media(msg)),
            None => format!("{who} sent {other}"),
        },
    };

    if flag(msg, "isForwarded") {
        line.push_str(&format!(" (forwarded {}x)", text_or(msg, "/forwardingScore", "1")));
    }
    if flag(msg, "isDeleted") {
        line.push_str(" (deleted)");
    }
    if flag(msg, "isEdited") {
        line.push_str(" (edited)");
    }
    line
}

/// One entry of `lastOutgoingMessages`.
pub fn outgoing_entry(msg: &Value) -> String {
    let timestamp = text_or(msg, "/timestamp", "Unknown");
    let id = text_or(msg, "/idMessage", "Unknown");
    let chat_id = text_or(msg, "/chatId", "Unknown Chat");
    let status = text_or(msg, "/statusMessage", "unknown");
    let message_type = text_or(msg, "/typeMessage", "Unknown");
    let head = format!("[{timestamp}] ID: {id} To {chat_id} [{status}]");

    let mut line = match message_type.as_str() {
        "extendedTextMessage" => {
            let extended = msg.get("extendedTextMessage").unwrap_or(&Value::Null);
            let text = text_at(extended, "/text")
                .or_else(|| text_at(msg, "/textMessage"))
                .unwrap_or_else(|| "No text".to_string());
            let mut line = format!("{head}: {text}");
            let title = text_or(extended, "/title", "");
            let description = text_or(extended, "/description", "");
            if !title.is_empty() || !description.is_empty() {
                line.push_str(&format!("\nTitle: {title}\nDescription: {description}"));
            }
            if flag(extended, "isForwarded") {
                line.push_str(&format!(
                    " (forwarded {}x)",
                    text_or(extended, "/forwardingScore", "1")
                ));
            }
            line
        }
        "textMessage" => format!("{head}: {}", text_or(msg, "/textMessage", "No text")),
        other => match media_kind(other) {
            Some(kind) => format!("{head} sent {kind}: {}", media(msg)),
            None => format!("{head} sent {other}"),
        },
    };

    if flag(msg, "sendByApi") {
        line.push_str(" (sent via API)");
    }
    if flag(msg, "isDeleted") {
        line.push_str(" (deleted)");
    }
    if flag(msg, "isEdited") {
        line.push_str(" (edited)");
    }
    line
}
