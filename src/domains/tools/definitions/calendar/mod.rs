//! Google Calendar adapter.
//!
//! Day windows are whole UTC days (`T00:00:00Z` to `T23:59:59Z`).

pub mod api;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::domains::tools::{
    Arguments, HandlerError, OperationRegistry, OperationSpec, ParamKind, ParamSpec, RegistryError,
    with_state,
};

pub use api::{CalendarApi, Event, EventQuery, EventTime, GoogleCalendar};

const PRIMARY: &str = "primary";

/// Upcoming events scanned by `search_events_by_keyword`.
const KEYWORD_SCAN_LIMIT: i64 = 100;

/// Public holiday calendars; unknown countries fall back to the first.
const HOLIDAY_CALENDARS: &[(&str, &str)] = &[
    ("India", "en.indian#holiday@group.v.calendar.google.com"),
    ("US", "en.usa#holiday@group.v.calendar.google.com"),
    ("UK", "en.uk#holiday@group.v.calendar.google.com"),
];

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, HandlerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerError::failed(format!("Invalid date '{value}': expected YYYY-MM-DD.")))
}

fn day_start(date: NaiveDate) -> String {
    format!("{date}T00:00:00Z")
}

fn day_end(date: NaiveDate) -> String {
    format!("{date}T23:59:59Z")
}

fn holiday_calendar(country: &str) -> &'static str {
    HOLIDAY_CALENDARS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(country.trim()))
        .map(|(_, id)| *id)
        .unwrap_or_else(|| {
            warn!("No holiday calendar for '{}', using {}", country, HOLIDAY_CALENDARS[0].0);
            HOLIDAY_CALENDARS[0].1
        })
}

fn event_lines(events: &[Event]) -> String {
    events
        .iter()
        .map(|e| format!("{} at {}", e.title(), e.start_display()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct CalendarAdapter {
    api: Arc<dyn CalendarApi>,
    clock: fn() -> DateTime<Utc>,
}

impl CalendarAdapter {
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self { api, clock: Utc::now }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> String {
        (self.clock)().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn check_max(max_results: i64) -> Result<i64, HandlerError> {
        if max_results < 1 {
            return Err(HandlerError::failed("max_results must be at least 1"));
        }
        Ok(max_results)
    }

    async fn events_on(&self, date: NaiveDate, max_results: Option<i64>, ordered: bool) -> Result<Vec<Event>, HandlerError> {
        let query = EventQuery {
            time_min: Some(day_start(date)),
            time_max: Some(day_end(date)),
            max_results,
            order_by_start: ordered,
        };
        self.api.list_events(PRIMARY, &query).await
    }

    #[instrument(skip(self))]
    pub async fn list_events(&self, max_results: i64) -> Result<String, HandlerError> {
        let query = EventQuery {
            time_min: Some(self.now()),
            max_results: Some(Self::check_max(max_results)?),
            order_by_start: true,
            ..Default::default()
        };
        let events = self.api.list_events(PRIMARY, &query).await?;
        if events.is_empty() {
            return Ok("No upcoming events found.".to_string());
        }
        Ok(event_lines(&events))
    }

    /// `start` and `end` are RFC 3339 timestamps (e.g. `2025-06-01T10:00:00Z`).
    #[instrument(skip(self))]
    pub async fn create_event(&self, summary: &str, start: &str, end: &str) -> Result<String, HandlerError> {
        let starts = DateTime::parse_from_rfc3339(start)
            .map_err(|_| HandlerError::failed(format!("Invalid start '{start}': expected RFC 3339.")))?;
        let ends = DateTime::parse_from_rfc3339(end)
            .map_err(|_| HandlerError::failed(format!("Invalid end '{end}': expected RFC 3339.")))?;
        if ends < starts {
            return Err(HandlerError::failed("Event end is before its start."));
        }

        let event = Event {
            summary: Some(summary.to_string()),
            start: Some(EventTime::utc(start)),
            end: Some(EventTime::utc(end)),
            ..Default::default()
        };
        let created = self.api.insert_event(PRIMARY, &event).await?;
        info!("Created calendar event {:?}", created.id);
        Ok(format!(
            "Event created: {}",
            created.html_link.as_deref().unwrap_or_default()
        ))
    }

    #[instrument(skip(self))]
    pub async fn delete_event(&self, event_id: &str) -> Result<String, HandlerError> {
        self.api.delete_event(PRIMARY, event_id).await?;
        Ok(format!("Deleted event {event_id}"))
    }

    #[instrument(skip(self))]
    pub async fn update_event(&self, event_id: &str, summary: &str) -> Result<String, HandlerError> {
        let mut event = self.api.get_event(PRIMARY, event_id).await?;
        event.id.get_or_insert_with(|| event_id.to_string());
        event.summary = Some(summary.to_string());
        let updated = self.api.update_event(PRIMARY, &event).await?;
        Ok(format!(
            "Updated event: {}",
            updated.html_link.as_deref().unwrap_or_default()
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_event_details(&self, event_id: &str) -> Result<String, HandlerError> {
        let event = self.api.get_event(PRIMARY, event_id).await?;
        Ok(format!(
            "Summary: {}\nStart: {}\nEnd: {}",
            event.title(),
            event.start_display(),
            event.end_display()
        ))
    }

    #[instrument(skip(self))]
    pub async fn search_events_by_date(&self, date_str: &str) -> Result<String, HandlerError> {
        let date = parse_date(date_str)?;
        let events = self.events_on(date, None, true).await?;
        if events.is_empty() {
            return Ok(format!("No events found on {date}."));
        }
        Ok(event_lines(&events))
    }

    #[instrument(skip(self))]
    pub async fn is_event_on_date(&self, date_str: &str) -> Result<String, HandlerError> {
        let date = parse_date(date_str)?;
        let events = self.events_on(date, Some(1), false).await?;
        if events.is_empty() {
            Ok(format!("No events on {date}"))
        } else {
            Ok(format!("Event exists on {date}"))
        }
    }

    /// Case-insensitive title match over the next upcoming events.
    #[instrument(skip(self))]
    pub async fn search_events_by_keyword(&self, keyword: &str, max_results: i64) -> Result<String, HandlerError> {
        let max_results = Self::check_max(max_results)?;
        let query = EventQuery {
            time_min: Some(self.now()),
            max_results: Some(KEYWORD_SCAN_LIMIT),
            order_by_start: true,
            ..Default::default()
        };
        let needle = keyword.to_lowercase();
        let matched: Vec<Event> = self
            .api
            .list_events(PRIMARY, &query)
            .await?
            .into_iter()
            .filter(|e| {
                e.summary
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase()
                    .contains(&needle)
            })
            .take(max_results as usize)
            .collect();

        if matched.is_empty() {
            return Ok(format!("No events found with keyword '{keyword}'."));
        }
        Ok(event_lines(&matched))
    }

    #[instrument(skip(self))]
    pub async fn count_events_in_range(&self, start_date: &str, end_date: &str) -> Result<String, HandlerError> {
        let start = parse_date(start_date)?;
        let end = parse_date(end_date)?;
        if end < start {
            return Err(HandlerError::failed(format!(
                "end_date {end} is before start_date {start}."
            )));
        }
        let query = EventQuery {
            time_min: Some(day_start(start)),
            time_max: Some(day_end(end)),
            ..Default::default()
        };
        let events = self.api.list_events(PRIMARY, &query).await?;
        Ok(format!(
            "Total events from {start} to {end}: {}",
            events.len()
        ))
    }

    #[instrument(skip(self))]
    pub async fn get_today_agenda(&self) -> Result<String, HandlerError> {
        let today = (self.clock)().date_naive();
        self.search_events_by_date(&today.to_string()).await
    }

    #[instrument(skip(self))]
    pub async fn list_holidays(&self, country: &str, max_results: i64) -> Result<String, HandlerError> {
        let query = EventQuery {
            time_min: Some(self.now()),
            max_results: Some(Self::check_max(max_results)?),
            order_by_start: true,
            ..Default::default()
        };
        let holidays = self
            .api
            .list_events(holiday_calendar(country), &query)
            .await?;
        if holidays.is_empty() {
            return Ok(format!("No upcoming holidays found for {country}."));
        }
        Ok(holidays
            .iter()
            .map(|h| format!("{} on {}", h.title(), h.start_display()))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Register every calendar operation.
    pub fn register(self: Arc<Self>, registry: &mut OperationRegistry) -> Result<(), RegistryError> {
        let s = || self.clone();
        let date = |name: &str| ParamSpec::required(name, ParamKind::String).describe("YYYY-MM-DD");

        registry.register(
            OperationSpec::new("list_events", "List upcoming events from Google Calendar")
                .param(ParamSpec::optional("max_results", ParamKind::Integer, 5)),
            with_state(s(), |c, a| async move { c.list_events(a.i64("max_results")?).await }),
        )?;
        registry.register(
            OperationSpec::new("create_event", "Create an event (RFC 3339 times, e.g. 2025-06-01T10:00:00Z)")
                .param(ParamSpec::required("summary", ParamKind::String))
                .param(ParamSpec::required("start", ParamKind::String))
                .param(ParamSpec::required("end", ParamKind::String)),
            with_state(s(), |c, a| async move {
                c.create_event(&a.string("summary")?, &a.string("start")?, &a.string("end")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new("delete_event", "Delete an event by its ID")
                .param(ParamSpec::required("event_id", ParamKind::String)),
            with_state(s(), |c, a| async move { c.delete_event(&a.string("event_id")?).await }),
        )?;
        registry.register(
            OperationSpec::new("update_event", "Update the summary of an event")
                .param(ParamSpec::required("event_id", ParamKind::String))
                .param(ParamSpec::required("summary", ParamKind::String)),
            with_state(s(), |c, a| async move {
                c.update_event(&a.string("event_id")?, &a.string("summary")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_event_details", "Retrieve details of a specific event")
                .param(ParamSpec::required("event_id", ParamKind::String)),
            with_state(s(), |c, a| async move { c.get_event_details(&a.string("event_id")?).await }),
        )?;
        registry.register(
            OperationSpec::new("search_events_by_date", "List all events on a specific date")
                .param(date("date_str")),
            with_state(s(), |c, a| async move { c.search_events_by_date(&a.string("date_str")?).await }),
        )?;
        registry.register(
            OperationSpec::new("is_event_on_date", "Check if any event is scheduled on a given date")
                .param(date("date_str")),
            with_state(s(), |c, a| async move { c.is_event_on_date(&a.string("date_str")?).await }),
        )?;
        registry.register(
            OperationSpec::new("search_events_by_keyword", "Search upcoming events by title keyword")
                .param(ParamSpec::required("keyword", ParamKind::String))
                .param(ParamSpec::optional("max_results", ParamKind::Integer, 10)),
            with_state(s(), |c, a| async move {
                c.search_events_by_keyword(&a.string("keyword")?, a.i64("max_results")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new("count_events_in_range", "Count events between two dates (inclusive)")
                .param(date("start_date"))
                .param(date("end_date")),
            with_state(s(), |c, a| async move {
                c.count_events_in_range(&a.string("start_date")?, &a.string("end_date")?)
                    .await
            }),
        )?;
        registry.register(
            OperationSpec::new("get_today_agenda", "Show events scheduled for today"),
            with_state(s(), |c, _| async move { c.get_today_agenda().await }),
        )?;
        registry.register(
            OperationSpec::new("list_holidays", "List upcoming public holidays (India, US or UK)")
                .param(ParamSpec::optional("country", ParamKind::String, "India"))
                .param(ParamSpec::optional("max_results", ParamKind::Integer, 10)),
            with_state(s(), |c, a| async move {
                c.list_holidays(&a.string("country")?, a.i64("max_results")?).await
            }),
        )?;
        registry.register(
            OperationSpec::new("hello_calendar", "Simple test tool for Google Calendar")
                .param(ParamSpec::optional("name", ParamKind::String, "Friend")),
            |a: Arguments| async move {
                Ok::<_, HandlerError>(Value::String(format!(
                    "Hello {}, welcome to your Google Calendar MCP!",
                    a.string("name")?
                )))
            },
        )?;

        debug!("Calendar adapter registered");
        Ok(())
    }
}
