//! Gmail adapter.
//!
//! Listings fetch message metadata concurrently; outgoing mail is built
//! locally (see [`mime`]) and sent as a raw RFC 5322 message.

pub mod api;
pub mod mime;

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::config::SecurityConfig;
use crate::core::security::validate_path;
use crate::domains::tools::{
    Arguments, HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError,
    with_state,
};

pub use api::{GoogleMail, MailApi, MessageSummary};
pub use mime::{Attachment, OutgoingMail};

const STARRED: &str = "STARRED";

/// Quote a value for Gmail search unless it is a single token.
fn search_term(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{}\"", value.replace('"', ""))
    } else {
        value.to_string()
    }
}

/// `From/Subject/Date/Preview` blocks separated by `---` lines.
fn detailed(from: &str, messages: &[MessageSummary]) -> String {
    messages
        .iter()
        .map(|m| {
            format!(
                "From: {from}\nSubject: {}\nDate: {}\nPreview: {}",
                m.subject(),
                m.date(),
                m.snippet()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

fn brief(messages: &[MessageSummary]) -> String {
    messages
        .iter()
        .map(|m| format!("Subject: {}\nBody: {}", m.subject(), m.snippet()))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

pub struct GmailAdapter {
    api: Arc<dyn MailApi>,
    security: SecurityConfig,
}

impl GmailAdapter {
    /// `security` guards the attachment paths of `send_email`.
    pub fn new(api: Arc<dyn MailApi>, security: SecurityConfig) -> Self {
        Self { api, security }
    }

    fn check_max(max_results: i64) -> Result<i64, HandlerError> {
        if max_results < 1 {
            return Err(HandlerError::failed("max_results must be at least 1"));
        }
        Ok(max_results)
    }

    async fn find(&self, query: Option<&str>, max_results: Option<i64>) -> Result<Vec<MessageSummary>, HandlerError> {
        debug!("Gmail search: {:?}", query);
        let ids = self.api.search(query, max_results).await?;
        try_join_all(ids.iter().map(|id| self.api.summary(id))).await
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<String, HandlerError> {
        let id = self.api.send_raw(mail.to_raw()).await?;
        info!("Sent message {} to {}", id, mail.to);
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn list_emails(&self, max_results: i64) -> Result<String, HandlerError> {
        let messages = self.find(None, Some(Self::check_max(max_results)?)).await?;
        if messages.is_empty() {
            return Ok("No messages found.".to_string());
        }
        Ok(messages
            .iter()
            .map(|m| format!("From: {}\nSubject: {}\nBody: {}\n", m.sender(), m.subject(), m.snippet()))
            .collect::<Vec<_>>()
            .join("\n---\n"))
    }

    #[instrument(skip(self, body))]
    pub async fn send_email(&self, to: &str, subject: &str, body: &str, attachment_path: &str) -> Result<String, HandlerError> {
        let mut mail = OutgoingMail::new(to, subject, body);
        if !attachment_path.trim().is_empty() {
            let path = validate_path(attachment_path, &self.security)?;
            if !path.is_file() {
                return Err(HandlerError::not_found(format!(
                    "Attachment '{attachment_path}' does not exist or is not a file."
                )));
            }
            let data = tokio::fs::read(&path).await?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment".to_string());
            mail = mail.attach(Attachment::new(filename, data));
        }
        let id = self.send(&mail).await?;
        Ok(format!("Email sent to {to} with ID: {id}"))
    }

    #[instrument(skip(self, body))]
    pub async fn send_email_to(&self, email_address: &str, subject: &str, body: &str) -> Result<String, HandlerError> {
        self.send(&OutgoingMail::new(email_address, subject, body)).await?;
        Ok(format!("Email sent successfully to {email_address}"))
    }

    #[instrument(skip(self))]
    pub async fn search_by_sender(&self, sender_email: &str, max_results: i64) -> Result<String, HandlerError> {
        let query = format!("from:{}", search_term(sender_email));
        let messages = self.find(Some(&query), Some(Self::check_max(max_results)?)).await?;
        if messages.is_empty() {
            return Ok(format!("No emails found from {sender_email}."));
        }
        Ok(format!("Emails received from {sender_email}:\n{}", brief(&messages)))
    }

    #[instrument(skip(self))]
    pub async fn search_sent_to(&self, recipient_email: &str, max_results: i64) -> Result<String, HandlerError> {
        let query = format!("to:{}", search_term(recipient_email));
        let messages = self.find(Some(&query), Some(Self::check_max(max_results)?)).await?;
        if messages.is_empty() {
            return Ok(format!("No emails found sent to {recipient_email}."));
        }
        Ok(format!("Emails sent to {recipient_email}:\n{}", brief(&messages)))
    }

    /// `from:<address> <filter>` rendered as detail blocks, or `empty`.
    async fn search_from(
        &self,
        email_address: &str,
        filter: &str,
        max_results: Option<i64>,
        empty: String,
    ) -> Result<String, HandlerError> {
        let query = format!("from:{} {filter}", search_term(email_address));
        let messages = self.find(Some(query.trim_end()), max_results).await?;
        if messages.is_empty() {
            return Ok(empty);
        }
        Ok(detailed(email_address, &messages))
    }

    #[instrument(skip(self))]
    pub async fn search_emails_from(&self, sender_email: &str, max_results: i64) -> Result<String, HandlerError> {
        self.search_from(
            sender_email,
            "",
            Some(Self::check_max(max_results)?),
            format!("No emails found from {sender_email}"),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_important(&self, email_address: &str, max_results: i64) -> Result<String, HandlerError> {
        self.search_from(
            email_address,
            "is:important",
            Some(Self::check_max(max_results)?),
            format!("No important emails found from {email_address}"),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_unread_from(&self, email_address: &str, max_results: i64) -> Result<String, HandlerError> {
        self.search_from(
            email_address,
            "is:unread",
            Some(Self::check_max(max_results)?),
            format!("No unread emails found from {email_address}"),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_starred_from(&self, email_address: &str, max_results: i64) -> Result<String, HandlerError> {
        self.search_from(
            email_address,
            "is:starred",
            Some(Self::check_max(max_results)?),
            format!("No starred emails found from {email_address}"),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_by_date_from(&self, email_address: &str, days_ago: i64) -> Result<String, HandlerError> {
        if days_ago < 1 {
            return Err(HandlerError::failed("days_ago must be at least 1"));
        }
        self.search_from(
            email_address,
            &format!("newer_than:{days_ago}d"),
            None,
            format!("No emails found from {email_address} in the last {days_ago} days"),
        )
        .await
    }

    #[instrument(skip(self))]
    pub async fn search_with_attachments(&self, email_address: &str, max_results: i64) -> Result<String, HandlerError> {
        let query = format!("from:{} has:attachment", search_term(email_address));
        let messages = self.find(Some(&query), Some(Self::check_max(max_results)?)).await?;
        if messages.is_empty() {
            return Ok(format!("No emails with attachments found from {email_address}"));
        }
        Ok(messages
            .iter()
            .map(|m| {
                format!(
                    "From: {email_address}\nSubject: {}\nDate: {}\nStatus: Contains attachment(s)",
                    m.subject(),
                    m.date()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"))
    }

    #[instrument(skip(self))]
    pub async fn search_starred_emails(&self, max_results: i64) -> Result<String, HandlerError> {
        let messages = self
            .find(Some("is:starred"), Some(Self::check_max(max_results)?))
            .await?;
        if messages.is_empty() {
            return Ok("No starred emails found".to_string());
        }
        Ok(messages
            .iter()
            .map(|m| {
                format!(
                    "From: {}\nSubject: {}\nDate: {}\nPreview: {}",
                    m.sender(),
                    m.subject(),
                    m.date(),
                    m.snippet()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n"))
    }

    /// Forward the most recent messages from `from_email`. A message that
    /// fails to send is logged and skipped.
    #[instrument(skip(self))]
    pub async fn forward_email_to(&self, from_email: &str, to_email: &str, max_recent: i64) -> Result<String, HandlerError> {
        let query = format!("from:{}", search_term(from_email));
        let messages = self.find(Some(&query), Some(Self::check_max(max_recent)?)).await?;
        if messages.is_empty() {
            return Ok(format!("No emails found from {from_email} to forward"));
        }

        let mut forwarded = 0;
        for message in &messages {
            let body = format!(
                "---------- Forwarded message ----------\nFrom: {from_email}\nSubject: {}\n\n{}",
                message.subject(),
                message.snippet()
            );
            let mail = OutgoingMail::new(to_email, format!("Fwd: {}", message.subject()), body);
            match self.send(&mail).await {
                Ok(_) => forwarded += 1,
                Err(e) => warn!("Failed to forward message {}: {}", message.id, e),
            }
        }
        Ok(format!(
            "Successfully forwarded {forwarded} email(s) from {from_email} to {to_email}"
        ))
    }

    #[instrument(skip(self))]
    pub async fn star_email(&self, email_address: &str, subject: &str) -> Result<String, HandlerError> {
        let query = format!(
            "from:{} subject:{}",
            search_term(email_address),
            search_term(subject)
        );
        let Some(id) = self.api.search(Some(&query), Some(1)).await?.into_iter().next() else {
            return Ok(format!(
                "No email found with subject '{subject}' from {email_address}"
            ));
        };
        self.api.modify_labels(&id, &[STARRED], &[]).await?;
        Ok(format!(
            "Successfully starred email from {email_address} with subject '{subject}'"
        ))
    }

    #[instrument(skip(self))]
    pub async fn unstar_email(&self, email_address: &str, subject: &str) -> Result<String, HandlerError> {
        let query = format!(
            "from:{} subject:{} is:starred",
            search_term(email_address),
            search_term(subject)
        );
        let Some(id) = self.api.search(Some(&query), Some(1)).await?.into_iter().next() else {
            return Ok(format!(
                "No starred email found with subject '{subject}' from {email_address}"
            ));
        };
        self.api.modify_labels(&id, &[], &[STARRED]).await?;
        Ok(format!(
            "Successfully unstarred email from {email_address} with subject '{subject}'"
        ))
    }

    /// Register every Gmail operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        let s = || self.clone();
        let text = |name: &str| ParamSpec::required(name, ParamKind::String);
        let max = |default: i64| ParamSpec::optional("max_results", ParamKind::Integer, default);

        registry.register(
            OperationSpec::new("list_emails", "List recent emails from the inbox").param(max(5)),
            with_state(s(), |g, a| async move { g.list_emails(a.i64("max_results")?).await }),
        )?;
        registry.register(
            OperationSpec::new("send_email", "Send an email with an optional attachment")
                .param(text("to"))
                .param(text("subject"))
                .param(text("body"))
                .param(ParamSpec::optional("attachment_path", ParamKind::String, "")),
            with_state(s(), |g, a| async move {
                g.send_email(
                    &a.string("to")?,
                    &a.string("subject")?,
                    &a.string("body")?,
                    &a.string("attachment_path")?,
                )
                .await
            }),
        )?;
        registry.register(
            OperationSpec::new("send_email_to", "Send an email to a specific email address")
                .param(text("email_address"))
                .param(text("subject"))
                .param(text("body")),
            with_state(s(), |g, a| async move {
                g.send_email_to(&a.string("email_address")?, &a.string("subject")?, &a.string("body")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new(
                "search_emails_by_sender_using_sender_email_address",
                "Retrieve emails received from a specific sender",
            )
            .param(text("sender_email"))
            .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_by_sender(&a.string("sender_email")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("search_emails_sent_by_me", "Retrieve emails sent to a specific recipient")
                .param(text("recipient_email"))
                .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_sent_to(&a.string("recipient_email")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("search_emails_from", "Search for emails from a specific email address")
                .param(text("sender_email"))
                .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_emails_from(&a.string("sender_email")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("forward_email_to", "Forward the most recent emails from one address to another")
                .param(text("from_email"))
                .param(text("to_email"))
                .param(ParamSpec::optional("max_recent", ParamKind::Integer, 1)),
            with_state(s(), |g, a| async move {
                g.forward_email_to(&a.string("from_email")?, &a.string("to_email")?, a.i64("max_recent")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new(
                "search_emails_with_attachments",
                "Search for emails with attachments from a specific email address",
            )
            .param(text("email_address"))
            .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_with_attachments(&a.string("email_address")?, a.i64("max_results")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new(
                "search_emails_by_date_from",
                "Search for emails from a specific address within the last N days",
            )
            .param(text("email_address"))
            .param(ParamSpec::optional("days_ago", ParamKind::Integer, 7)),
            with_state(s(), |g, a| async move {
                g.search_by_date_from(&a.string("email_address")?, a.i64("days_ago")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("search_important_emails", "Search for important emails from a specific email address")
                .param(text("email_address"))
                .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_important(&a.string("email_address")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("search_unread_from", "Search for unread emails from a specific email address")
                .param(text("email_address"))
                .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_unread_from(&a.string("email_address")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("search_starred_emails", "Search for starred emails in your inbox").param(max(5)),
            with_state(s(), |g, a| async move { g.search_starred_emails(a.i64("max_results")?).await }),
        )?;
        registry.register(
            OperationSpec::new("search_starred_from", "Search for starred emails from a specific email address")
                .param(text("email_address"))
                .param(max(5)),
            with_state(s(), |g, a| async move {
                g.search_starred_from(&a.string("email_address")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("star_email", "Star the newest email matching a sender and subject")
                .param(text("email_address"))
                .param(text("subject")),
            with_state(s(), |g, a| async move {
                g.star_email(&a.string("email_address")?, &a.string("subject")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("unstar_email", "Unstar the newest starred email matching a sender and subject")
                .param(text("email_address"))
                .param(text("subject")),
            with_state(s(), |g, a| async move {
                g.unstar_email(&a.string("email_address")?, &a.string("subject")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("hello_gmail", "Simple test tool for Gmail")
                .param(ParamSpec::optional("name", ParamKind::String, "World")),
            |a: Arguments| async move {
                Ok::<_, HandlerError>(Value::String(format!(
                    "Hello {}, welcome to Gmail MCP!",
                    a.string("name")?
                )))
            },
        )?;

        debug!("Gmail adapter registered");
        Ok(())
    }
}
