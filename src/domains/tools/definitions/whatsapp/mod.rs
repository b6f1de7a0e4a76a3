//! WhatsApp adapter backed by Green-API.

pub mod api;
pub mod format;

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument};

use crate::domains::tools::{
    HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError, with_state,
};

pub use api::{GreenApi, WhatsAppApi};
use format::{chat_entry, incoming_entry, outgoing_entry, text_or};

/// `view_messages` returns at most this many messages.
const MAX_HISTORY: i64 = 100;

#[derive(Debug, Deserialize)]
struct Contact {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl Contact {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }
}

fn decode<T: serde::de::DeserializeOwned>(method: &str, value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value)
        .map_err(|e| HandlerError::external(format!("green-api {method}"), format!("unexpected response: {e}")))
}

/// Message arrays come back oldest first; listings show the newest first.
fn newest_first(method: &str, value: Value) -> Result<Vec<Value>, HandlerError> {
    let mut messages: Vec<Value> = decode(method, value)?;
    messages.reverse();
    Ok(messages)
}

fn is_phone_number(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

pub struct WhatsAppAdapter {
    api: Arc<dyn WhatsAppApi>,
}

impl WhatsAppAdapter {
    pub fn new(api: Arc<dyn WhatsAppApi>) -> Self {
        Self { api }
    }

    async fn contacts(&self) -> Result<Vec<Contact>, HandlerError> {
        decode("getContacts", self.api.get("getContacts", &[]).await?)
    }

    /// Turn a phone number, chat ID or (partial) contact name into a
    /// chat ID.
    pub async fn resolve_chat_id(&self, contact: &str) -> Result<String, HandlerError> {
        let contact = contact.trim();
        if contact.is_empty() {
            return Err(HandlerError::failed("Contact must not be empty."));
        }
        if is_phone_number(contact) {
            return Ok(format!("{contact}@c.us"));
        }
        if contact.contains("@c.us") || contact.contains("@g.us") {
            return Ok(contact.to_string());
        }

        let needle = contact.to_lowercase();
        self.contacts()
            .await?
            .into_iter()
            .find(|c| c.name().to_lowercase().contains(&needle))
            .map(|c| c.id)
            .ok_or_else(|| HandlerError::not_found(format!("Contact '{contact}' not found.")))
    }

    #[instrument(skip(self))]
    pub async fn open_session(&self) -> Result<String, HandlerError> {
        let state = self.api.get("getStateInstance", &[]).await?;
        let state = text_or(&state, "/stateInstance", "unknown");
        if state == "authorized" {
            Ok("WhatsApp session is active.".to_string())
        } else {
            Ok(format!("WhatsApp session is not active (state: {state})."))
        }
    }

    #[instrument(skip(self, message))]
    pub async fn send_message(&self, contact: &str, message: &str) -> Result<String, HandlerError> {
        let chat_id = self.resolve_chat_id(contact).await?;
        let sent = self
            .api
            .post("sendMessage", &json!({ "chatId": chat_id, "message": message }))
            .await?;
        info!("Sent message {} to {}", text_or(&sent, "/idMessage", "?"), chat_id);
        Ok(format!("Message sent to {contact}."))
    }

    #[instrument(skip(self))]
    pub async fn get_chats(&self) -> Result<String, HandlerError> {
        let contacts = self.contacts().await?;
        if contacts.is_empty() {
            return Ok("No chats found.".to_string());
        }
        Ok(contacts
            .iter()
            .map(|c| format!("{} ({})", c.name(), c.id))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    #[instrument(skip(self))]
    pub async fn create_group(&self, group_name: &str, participants: &[String]) -> Result<String, HandlerError> {
        if participants.is_empty() {
            return Err(HandlerError::failed("A group needs at least one participant."));
        }
        let mut chat_ids = Vec::with_capacity(participants.len());
        for participant in participants {
            chat_ids.push(self.resolve_chat_id(participant).await?);
        }
        let created = self
            .api
            .post("createGroup", &json!({ "groupName": group_name, "chatIds": chat_ids }))
            .await?;
        if created.get("created").and_then(Value::as_bool) == Some(false) {
            return Err(HandlerError::external("green-api createGroup", "group was not created"));
        }
        Ok(format!("Group '{group_name}' created."))
    }

    #[instrument(skip(self))]
    pub async fn get_group_participants(&self, group_id: &str) -> Result<String, HandlerError> {
        let data = self.api.post("getGroupData", &json!({ "groupId": group_id })).await?;
        let participants: Vec<String> = data
            .get("participants")
            .and_then(Value::as_array)
            .map(|ps| ps.iter().map(|p| text_or(p, "/id", "?")).collect())
            .unwrap_or_default();
        if participants.is_empty() {
            return Ok(format!("No participants found in {group_id}."));
        }
        Ok(participants.join("\n"))
    }

    #[instrument(skip(self))]
    pub async fn view_messages(&self, contact: &str, limit: i64) -> Result<String, HandlerError> {
        let chat_id = self.resolve_chat_id(contact).await?;
        let count = limit.clamp(1, MAX_HISTORY);
        let history = self
            .api
            .post("getChatHistory", &json!({ "chatId": chat_id, "count": count }))
            .await?;
        let messages = newest_first("getChatHistory", history)?;
        if messages.is_empty() {
            return Ok("No messages found".to_string());
        }
        Ok(messages.iter().map(chat_entry).collect::<Vec<_>>().join("\n\n"))
    }

    #[instrument(skip(self))]
    pub async fn get_message(&self, contact: &str, message_id: &str) -> Result<String, HandlerError> {
        let chat_id = self.resolve_chat_id(contact).await?;
        let message = self
            .api
            .post("getMessage", &json!({ "chatId": chat_id, "idMessage": message_id }))
            .await?;
        let text = format::text_at(&message, "/textMessage")
            .or_else(|| format::text_at(&message, "/extendedTextMessage/text"))
            .or_else(|| format::text_at(&message, "/textMessageData/textMessage"))
            .or_else(|| format::text_at(&message, "/caption"))
            .unwrap_or_else(|| "No text".to_string());
        Ok(format!("Message: {text}"))
    }

    #[instrument(skip(self))]
    pub async fn get_last_incoming_messages(&self, minutes: i64) -> Result<String, HandlerError> {
        let minutes = minutes.max(1);
        let journal = self
            .api
            .get("lastIncomingMessages", &[("minutes", minutes.to_string())])
            .await?;
        let messages = newest_first("lastIncomingMessages", journal)?;
        if messages.is_empty() {
            return Ok("No messages found".to_string());
        }
        Ok(messages.iter().map(incoming_entry).collect::<Vec<_>>().join("\n\n"))
    }

    #[instrument(skip(self))]
    pub async fn get_last_outgoing_messages(&self, minutes: i64) -> Result<String, HandlerError> {
        let minutes = minutes.max(1);
        let journal = self
            .api
            .get("lastOutgoingMessages", &[("minutes", minutes.to_string())])
            .await?;
        let messages = newest_first("lastOutgoingMessages", journal)?;
        if messages.is_empty() {
            return Ok("No outgoing messages found".to_string());
        }
        Ok(messages.iter().map(outgoing_entry).collect::<Vec<_>>().join("\n\n"))
    }

    #[instrument(skip(self))]
    pub async fn mark_chat_read(&self, contact: &str) -> Result<String, HandlerError> {
        let chat_id = self.resolve_chat_id(contact).await?;
        self.api.post("readChat", &json!({ "chatId": chat_id })).await?;
        Ok(format!("Chat with {contact} marked as read."))
    }

    #[instrument(skip(self))]
    pub async fn check_whatsapp_number(&self, phone: &str) -> Result<String, HandlerError> {
        let digits: String = phone.chars().filter(|c| !matches!(c, '+' | ' ' | '-')).collect();
        let number: u64 = digits
            .parse()
            .map_err(|_| HandlerError::failed(format!("'{phone}' is not a phone number.")))?;
        let result = self
            .api
            .post("checkWhatsapp", &json!({ "phoneNumber": number }))
            .await?;
        if result.get("existsWhatsapp").and_then(Value::as_bool) == Some(true) {
            Ok("Phone number has WhatsApp".to_string())
        } else {
            Ok("Phone number doesn't have WhatsApp".to_string())
        }
    }

    #[instrument(skip(self))]
    pub async fn get_contact_info(&self, contact: &str) -> Result<String, HandlerError> {
        let chat_id = self.resolve_chat_id(contact).await?;
        let info = self.api.post("getContactInfo", &json!({ "chatId": chat_id })).await?;
        Ok(format!(
            "Contact Info:\nName: {}\nPhone: {}\nStatus: {}\nAvatar: {}",
            text_or(&info, "/name", "Unknown"),
            text_or(&info, "/phone", "Unknown"),
            text_or(&info, "/status", "Unknown"),
            text_or(&info, "/avatar", "No avatar")
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_my_details(&self) -> Result<String, HandlerError> {
        let state = self.api.get("getStateInstance", &[]).await?;
        let status = self.api.get("getStatusInstance", &[]).await?;
        let wa = self.api.get("getWaSettings", &[]).await?;
        let settings = self.api.get("getSettings", &[]).await?;
        let s = |key: &str| text_or(&settings, &format!("/{key}"), "no");

        Ok(format!(
            "WhatsApp Account Status:\n\
             Phone Number: {}\n\
             State: {}\n\
             Connection: {}\n\
             Avatar URL: {}\n\
             Device ID: {}\n\n\
             Account Settings:\n\
             Webhook URL: {}\n\
             Message Delay: {}ms\n\
             Mark Messages Read: {}\n\
             Keep Online: {}\n\
             Notifications:\n\
             - Incoming: {}\n\
             - Outgoing: {}\n\
             - Calls: {}\n\
             - Polls: {}\n\
             - Edits: {}\n\
             - Deletions: {}",
            text_or(&wa, "/phone", "Unknown"),
            text_or(&state, "/stateInstance", "Unknown"),
            text_or(&status, "/statusInstance", "Unknown"),
            text_or(&wa, "/avatar", "No avatar"),
            text_or(&wa, "/deviceId", "Unknown"),
            text_at_or_unset(&settings, "/webhookUrl"),
            text_or(&settings, "/delaySendMessagesMilliseconds", "0"),
            s("markIncomingMessagesReaded"),
            s("keepOnlineStatus"),
            s("incomingWebhook"),
            s("outgoingWebhook"),
            s("incomingCallWebhook"),
            s("pollMessageWebhook"),
            s("editedMessageWebhook"),
            s("deletedMessageWebhook"),
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_account_status(&self) -> Result<String, HandlerError> {
        let state = self.api.get("getStateInstance", &[]).await?;
        let status = self.api.get("getStatusInstance", &[]).await?;
        Ok(format!(
            "Account Status:\nState: {}\nStatus: {}\nSubstatus: {}",
            text_or(&state, "/stateInstance", "Unknown"),
            text_or(&status, "/statusInstance", "Unknown"),
            text_or(&status, "/subStatusInstance", "Unknown")
        ))
    }

    /// Register every WhatsApp operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        let s = || self.clone();
        let text = |name: &str| ParamSpec::required(name, ParamKind::String);

        registry.register(
            OperationSpec::new("open_session", "Check if the WhatsApp session is active"),
            with_state(s(), |w, _| async move { w.open_session().await }),
        )?;
        registry.register(
            OperationSpec::new("send_message", "Send a message to a contact")
                .param(text("contact").describe("Contact name, phone number or chat ID"))
                .param(text("message")),
            with_state(s(), |w, a| async move {
                w.send_message(&a.string("contact")?, &a.string("message")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_chats", "Retrieve the list of chats"),
            with_state(s(), |w, _| async move { w.get_chats().await }),
        )?;
        registry.register(
            OperationSpec::new("create_group", "Create a group chat")
                .param(text("group_name"))
                .param(ParamSpec::required("participants", ParamKind::StringList)),
            with_state(s(), |w, a| async move {
                w.create_group(&a.string("group_name")?, &a.string_list("participants")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_group_participants", "Get participants of a group chat")
                .param(text("group_id")),
            with_state(s(), |w, a| async move {
                w.get_group_participants(&a.string("group_id")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("view_messages", "View recent messages from a contact")
                .param(text("contact"))
                .param(ParamSpec::optional("limit", ParamKind::Integer, 5).describe("Clamped to 1..=100")),
            with_state(s(), |w, a| async move {
                w.view_messages(&a.string("contact")?, a.i64("limit")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_message", "Retrieve a specific message by its ID")
                .param(text("contact"))
                .param(text("message_id")),
            with_state(s(), |w, a| async move {
                w.get_message(&a.string("contact")?, &a.string("message_id")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_last_incoming_messages", "View recent incoming messages across all chats")
                .param(ParamSpec::optional("minutes", ParamKind::Integer, 1440)),
            with_state(s(), |w, a| async move {
                w.get_last_incoming_messages(a.i64("minutes")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_last_outgoing_messages", "View recent outgoing messages across all chats")
                .param(ParamSpec::optional("minutes", ParamKind::Integer, 1440)),
            with_state(s(), |w, a| async move {
                w.get_last_outgoing_messages(a.i64("minutes")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("mark_chat_read", "Mark all messages in a chat as read").param(text("contact")),
            with_state(s(), |w, a| async move { w.mark_chat_read(&a.string("contact")?).await }),
        )?;
        registry.register(
            OperationSpec::new("check_whatsapp_number", "Check if a phone number has a WhatsApp account")
                .param(text("phone")),
            with_state(s(), |w, a| async move { w.check_whatsapp_number(&a.string("phone")?).await }),
        )?;
        registry.register(
            OperationSpec::new("get_contact_info", "Get detailed information about a contact")
                .param(text("contact")),
            with_state(s(), |w, a| async move { w.get_contact_info(&a.string("contact")?).await }),
        )?;
        registry.register(
            OperationSpec::new("get_my_details", "Get detailed information about your WhatsApp account"),
            with_state(s(), |w, _| async move { w.get_my_details().await }),
        )?;
        registry.register(
            OperationSpec::new("get_account_status", "Get the current status of the WhatsApp connection"),
            with_state(s(), |w, _| async move { w.get_account_status().await }),
        )?;

        debug!("WhatsApp adapter registered");
        Ok(())
    }
}

fn text_at_or_unset(value: &Value, pointer: &str) -> String {
    format::text_at(value, pointer)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Not set".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGreen {
        responses: HashMap<String, Value>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeGreen {
        fn respond(mut self, method: &str, value: Value) -> Self {
            self.responses.insert(method.to_string(), value);
            self
        }

        fn with_contacts(self) -> Self {
            self.respond(
                "getContacts",
                json!([
                    { "id": "15550001111@c.us", "name": "Alice Smith", "type": "user" },
                    { "id": "15550002222@c.us", "name": "Bob", "type": "user" },
                    { "id": "120363@g.us", "type": "group" }
                ]),
            )
        }

        fn answer(&self, method: &str, args: Value) -> Value {
            self.calls.lock().unwrap().push((method.to_string(), args));
            self.responses.get(method).cloned().unwrap_or(Value::Null)
        }

        fn last_call(&self, method: &str) -> Value {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(m, _)| m == method)
                .map(|(_, args)| args.clone())
                .unwrap()
        }
    }

    #[async_trait]
    impl WhatsAppApi for FakeGreen {
        async fn get(&self, method: &str, query: &[(&str, String)]) -> Result<Value, HandlerError> {
            let args: serde_json::Map<String, Value> = query
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.clone())))
                .collect();
            Ok(self.answer(method, Value::Object(args)))
        }

        async fn post(&self, method: &str, body: &Value) -> Result<Value, HandlerError> {
            Ok(self.answer(method, body.clone()))
        }
    }

    fn adapter(fake: FakeGreen) -> (Arc<FakeGreen>, WhatsAppAdapter) {
        let fake = Arc::new(fake);
        (fake.clone(), WhatsAppAdapter::new(fake))
    }

    #[tokio::test]
    async fn test_resolve_chat_id() {
        let (_, wa) = adapter(FakeGreen::default().with_contacts());
        assert_eq!(wa.resolve_chat_id("15551234567").await.unwrap(), "15551234567@c.us");
        assert_eq!(wa.resolve_chat_id("120363@g.us").await.unwrap(), "120363@g.us");
        assert_eq!(wa.resolve_chat_id("alice").await.unwrap(), "15550001111@c.us");
        assert_eq!(wa.resolve_chat_id("BOB").await.unwrap(), "15550002222@c.us");

        let err = wa.resolve_chat_id("Carol").await.unwrap_err();
        assert!(matches!(err, HandlerError::NotFound(_)));
        assert_eq!(err.to_string(), "Contact 'Carol' not found.");
    }

    #[tokio::test]
    async fn test_send_message_by_name() {
        let (fake, wa) = adapter(
            FakeGreen::default()
                .with_contacts()
                .respond("sendMessage", json!({ "idMessage": "3EB0" })),
        );
        let msg = wa.send_message("Alice", "Hi there").await.unwrap();
        assert_eq!(msg, "Message sent to Alice.");
        assert_eq!(
            fake.last_call("sendMessage"),
            json!({ "chatId": "15550001111@c.us", "message": "Hi there" })
        );
    }

    #[tokio::test]
    async fn test_open_session_reports_state() {
        let (_, wa) = adapter(
            FakeGreen::default().respond("getStateInstance", json!({ "stateInstance": "authorized" })),
        );
        assert_eq!(wa.open_session().await.unwrap(), "WhatsApp session is active.");

        let (_, wa) = adapter(
            FakeGreen::default().respond("getStateInstance", json!({ "stateInstance": "notAuthorized" })),
        );
        assert_eq!(
            wa.open_session().await.unwrap(),
            "WhatsApp session is not active (state: notAuthorized)."
        );
    }

    #[tokio::test]
    async fn test_get_chats() {
        let (_, wa) = adapter(FakeGreen::default().with_contacts());
        let text = wa.get_chats().await.unwrap();
        assert_eq!(
            text,
            "Alice Smith (15550001111@c.us)\nBob (15550002222@c.us)\n (120363@g.us)"
        );
    }

    #[tokio::test]
    async fn test_view_messages_clamps_limit() {
        let (fake, wa) = adapter(FakeGreen::default().respond(
            "getChatHistory",
            json!([
                { "type": "incoming", "timestamp": 1, "typeMessage": "textMessage", "senderName": "Ana", "textMessage": "first" },
                { "type": "incoming", "timestamp": 2, "typeMessage": "textMessage", "senderName": "Ana", "textMessage": "second" }
            ]),
        ));
        let text = wa.view_messages("15551234567", 500).await.unwrap();
        assert_eq!(text, "[2] Ana: second\n\n[1] Ana: first");
        assert_eq!(fake.last_call("getChatHistory")["count"], 100);

        wa.view_messages("15551234567", 0).await.unwrap();
        assert_eq!(fake.last_call("getChatHistory")["count"], 1);
    }

    #[tokio::test]
    async fn test_empty_journals() {
        let (fake, wa) = adapter(
            FakeGreen::default()
                .respond("lastIncomingMessages", json!([]))
                .respond("lastOutgoingMessages", json!([])),
        );
        assert_eq!(wa.get_last_incoming_messages(0).await.unwrap(), "No messages found");
        assert_eq!(fake.last_call("lastIncomingMessages")["minutes"], "1");
        assert_eq!(
            wa.get_last_outgoing_messages(60).await.unwrap(),
            "No outgoing messages found"
        );
    }

    #[tokio::test]
    async fn test_create_group_resolves_participants() {
        let (fake, wa) = adapter(
            FakeGreen::default()
                .with_contacts()
                .respond("createGroup", json!({ "created": true, "chatId": "9@g.us" })),
        );
        let msg = wa
            .create_group("Team", &["Bob".to_string(), "15559990000".to_string()])
            .await
            .unwrap();
        assert_eq!(msg, "Group 'Team' created.");
        assert_eq!(
            fake.last_call("createGroup")["chatIds"],
            json!(["15550002222@c.us", "15559990000@c.us"])
        );

        assert!(wa.create_group("Empty", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_group_participants() {
        let (_, wa) = adapter(FakeGreen::default().respond(
            "getGroupData",
            json!({ "participants": [{ "id": "1@c.us", "isAdmin": true }, { "id": "2@c.us" }] }),
        ));
        assert_eq!(wa.get_group_participants("9@g.us").await.unwrap(), "1@c.us\n2@c.us");
    }

    #[tokio::test]
    async fn test_get_message_text() {
        let (fake, wa) = adapter(FakeGreen::default().respond(
            "getMessage",
            json!({ "idMessage": "ABC", "typeMessage": "textMessage", "textMessage": "hello" }),
        ));
        assert_eq!(wa.get_message("15551234567", "ABC").await.unwrap(), "Message: hello");
        assert_eq!(
            fake.last_call("getMessage"),
            json!({ "chatId": "15551234567@c.us", "idMessage": "ABC" })
        );
    }

    #[tokio::test]
    async fn test_check_number() {
        let (fake, wa) = adapter(
            FakeGreen::default().respond("checkWhatsapp", json!({ "existsWhatsapp": true })),
        );
        assert_eq!(
            wa.check_whatsapp_number("+1 555-123-4567").await.unwrap(),
            "Phone number has WhatsApp"
        );
        assert_eq!(fake.last_call("checkWhatsapp"), json!({ "phoneNumber": 15551234567u64 }));
        assert!(wa.check_whatsapp_number("not a number").await.is_err());
    }

    #[tokio::test]
    async fn test_account_status() {
        let (_, wa) = adapter(
            FakeGreen::default()
                .respond("getStateInstance", json!({ "stateInstance": "authorized" }))
                .respond("getStatusInstance", json!({ "statusInstance": "online" })),
        );
        assert_eq!(
            wa.get_account_status().await.unwrap(),
            "Account Status:\nState: authorized\nStatus: online\nSubstatus: Unknown"
        );
    }

    #[tokio::test]
    async fn test_my_details() {
        let (_, wa) = adapter(
            FakeGreen::default()
                .respond("getStateInstance", json!({ "stateInstance": "authorized" }))
                .respond("getStatusInstance", json!({ "statusInstance": "online" }))
                .respond("getWaSettings", json!({ "phone": "15550001111", "deviceId": "d1" }))
                .respond(
                    "getSettings",
                    json!({ "webhookUrl": "", "delaySendMessagesMilliseconds": 500, "incomingWebhook": "yes" }),
                ),
        );
        let text = wa.get_my_details().await.unwrap();
        assert!(text.starts_with("WhatsApp Account Status:\nPhone Number: 15550001111\n"));
        assert!(text.contains("Webhook URL: Not set\n"));
        assert!(text.contains("Message Delay: 500ms\n"));
        assert!(text.contains("- Incoming: yes\n"));
        assert!(text.ends_with("- Deletions: no"));
    }

    #[tokio::test]
    async fn test_registers_all_operations() {
        let (_, wa) = adapter(FakeGreen::default());
        let mut registry = OperationRegistry::new();
        Arc::new(wa).register(&mut registry).unwrap();
        assert_eq!(registry.len(), 14);
    }
}
