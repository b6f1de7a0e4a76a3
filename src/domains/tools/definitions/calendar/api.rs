//! Google Calendar v3 event resources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domains::tools::HandlerError;
use crate::domains::tools::definitions::google::{GoogleClient, path_segment};

/// Start or end of an event: `dateTime` for timed events, `date` for
/// all-day ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

impl EventTime {
    pub fn utc(date_time: impl Into<String>) -> Self {
        Self {
            date_time: Some(date_time.into()),
            date: None,
            time_zone: Some("UTC".to_string()),
        }
    }

    /// `dateTime`, else `date`, else empty.
    pub fn display(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or_default()
    }
}

/// An event resource. Fields this server does not use are carried in
/// `extra` so updates write them back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn title(&self) -> &str {
        self.summary.as_deref().unwrap_or("(No Title)")
    }

    pub fn start_display(&self) -> &str {
        self.start.as_ref().map(EventTime::display).unwrap_or_default()
    }

    pub fn end_display(&self) -> &str {
        self.end.as_ref().map(EventTime::display).unwrap_or_default()
    }
}

/// Filter for `events.list`. Recurring events are always expanded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventQuery {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: Option<i64>,
    pub order_by_start: bool,
}

impl EventQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("singleEvents", "true".to_string())];
        if let Some(min) = &self.time_min {
            params.push(("timeMin", min.clone()));
        }
        if let Some(max) = &self.time_max {
            params.push(("timeMax", max.clone()));
        }
        if let Some(n) = self.max_results {
            params.push(("maxResults", n.to_string()));
        }
        if self.order_by_start {
            params.push(("orderBy", "startTime".to_string()));
        }
        params
    }
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

/// Calendar operations used by the adapter.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    async fn list_events(&self, calendar_id: &str, query: &EventQuery) -> Result<Vec<Event>, HandlerError>;
    async fn insert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, HandlerError>;
    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<Event, HandlerError>;
    async fn update_event(&self, calendar_id: &str, event: &Event) -> Result<Event, HandlerError>;
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), HandlerError>;
}

/// The Google Calendar REST API.
pub struct GoogleCalendar {
    client: GoogleClient,
}

impl GoogleCalendar {
    pub fn new(client: GoogleClient) -> Self {
        Self { client }
    }
}

fn decode<T: serde::de::DeserializeOwned>(call: &str, value: Value) -> Result<T, HandlerError> {
    serde_json::from_value(value).map_err(|e| HandlerError::external(call, format!("unexpected response: {e}")))
}

fn encode(call: &str, event: &Event) -> Result<Value, HandlerError> {
    serde_json::to_value(event).map_err(|e| HandlerError::external(call, e))
}

fn events_path(calendar_id: &str) -> String {
    format!("calendars/{}/events", path_segment(calendar_id))
}

#[async_trait]
impl CalendarApi for GoogleCalendar {
    async fn list_events(&self, calendar_id: &str, query: &EventQuery) -> Result<Vec<Event>, HandlerError> {
        let call = "calendar events.list";
        let value = self
            .client
            .get(call, &events_path(calendar_id), &query.to_params())
            .await?;
        Ok(decode::<EventList>(call, value)?.items)
    }

    async fn insert_event(&self, calendar_id: &str, event: &Event) -> Result<Event, HandlerError> {
        let call = "calendar events.insert";
        let value = self
            .client
            .post(call, &events_path(calendar_id), &encode(call, event)?)
            .await?;
        decode(call, value)
    }

    async fn get_event(&self, calendar_id: &str, event_id: &str) -> Result<Event, HandlerError> {
        let call = "calendar events.get";
        let path = format!("{}/{}", events_path(calendar_id), path_segment(event_id));
        decode(call, self.client.get(call, &path, &[]).await?)
    }

    async fn update_event(&self, calendar_id: &str, event: &Event) -> Result<Event, HandlerError> {
        let call = "calendar events.update";
        let event_id = event
            .id
            .as_deref()
            .ok_or_else(|| HandlerError::failed("Event has no id"))?;
        let path = format!("{}/{}", events_path(calendar_id), path_segment(event_id));
        decode(call, self.client.put(call, &path, &encode(call, event)?).await?)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), HandlerError> {
        let path = format!("{}/{}", events_path(calendar_id), path_segment(event_id));
        self.client.delete("calendar events.delete", &path).await
    }
}
