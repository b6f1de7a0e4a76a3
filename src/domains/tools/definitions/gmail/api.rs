//! Gmail v1 message resources.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::domains::tools::HandlerError;
use crate::domains::tools::definitions::google::{GoogleClient, path_segment};

/// Headers fetched for listings.
const SUMMARY_HEADERS: [&str; 3] = ["From", "Subject", "Date"];

/// The parts of a message shown in listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageSummary {
    pub id: String,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
    pub snippet: Option<String>,
}

impl MessageSummary {
    pub fn subject(&self) -> &str {
        self.subject.as_deref().unwrap_or("(No Subject)")
    }

    pub fn sender(&self) -> &str {
        self.from.as_deref().unwrap_or("(Unknown Sender)")
    }

    pub fn date(&self) -> &str {
        self.date.as_deref().unwrap_or("(No Date)")
    }

    pub fn snippet(&self) -> &str {
        self.snippet.as_deref().unwrap_or("(No Body)")
    }
}

/// Mailbox operations used by the adapter. `query` uses Gmail search
/// syntax (`from:a@b.c is:unread`).
#[async_trait]
pub trait MailApi: Send + Sync {
    /// IDs of matching messages, newest first.
    async fn search(&self, query: Option<&str>, max_results: Option<i64>) -> Result<Vec<String>, HandlerError>;
    async fn summary(&self, id: &str) -> Result<MessageSummary, HandlerError>;
    /// Send a base64url-encoded RFC 5322 message; returns the new message ID.
    async fn send_raw(&self, raw: String) -> Result<String, HandlerError>;
    async fn modify_labels(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<(), HandlerError>;
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Deserialize, Default)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    payload: Payload,
}

impl Message {
    fn header(&self, name: &str) -> Option<String> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.clone())
    }
}

/// The Gmail REST API for the authenticated user.
pub struct GoogleMail {
    client: GoogleClient,
}

impl GoogleMail {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

fn decode<T: serde::de::DeserializeOwned>(call: &str, value: serde_json::Value) -> Result<T, HandlerError> {
    serde_json::from_value(value).map_err(|e| HandlerError::external(call, format!("unexpected response: {e}")))
}

#[async_trait]
impl MailApi for GoogleMail {
    async fn search(&self, query: Option<&str>, max_results: Option<i64>) -> Result<Vec<String>, HandlerError> {
        let call = "gmail messages.list";
        let mut params = Vec::new();
        if let Some(q) = query {
            params.push(("q", q.to_string()));
        }
        if let Some(n) = max_results {
            params.push(("maxResults", n.to_string()));
        }
        let list: MessageList = decode(call, self.client.get(call, "users/me/messages", &params).await?)?;
        Ok(list.messages.into_iter().map(|m| m.id).collect())
    }

    async fn summary(&self, id: &str) -> Result<MessageSummary, HandlerError> {
        let call = "gmail messages.get";
        let mut params = vec![("format", "metadata".to_string())];
        params.extend(SUMMARY_HEADERS.iter().map(|h| ("metadataHeaders", h.to_string())));
        let path = format!("users/me/messages/{}", path_segment(id));
        let message: Message = decode(call, self.client.get(call, &path, &params).await?)?;
        Ok(MessageSummary {
            from: message.header("From"),
            subject: message.header("Subject"),
            date: message.header("Date"),
            snippet: message.snippet.clone(),
            id: message.id,
        })
    }

    async fn send_raw(&self, raw: String) -> Result<String, HandlerError> {
        let call = "gmail messages.send";
        let sent: MessageRef = decode(
            call,
            self.client
                .post(call, "users/me/messages/send", &json!({ "raw": raw }))
                .await?,
        )?;
        Ok(sent.id)
    }

    async fn modify_labels(&self, id: &str, add: &[&str], remove: &[&str]) -> Result<(), HandlerError> {
        let call = "gmail messages.modify";
        let path = format!("users/me/messages/{}/modify", path_segment(id));
        self.client
            .post(
                call,
                &path,
                &json!({ "addLabelIds": add, "removeLabelIds": remove }),
            )
            .await?;
        Ok(())
    }
}
