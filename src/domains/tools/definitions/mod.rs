//! Operation adapters.
//!
//! Each adapter owns its external client and registers its operations
//! into an [`OperationRegistry`](super::OperationRegistry).

pub mod calendar;
pub mod fs;
pub mod git;
pub mod gmail;
pub mod google;
pub mod greet;
pub mod postgres;
pub mod whatsapp;

pub use calendar::{CalendarAdapter, GoogleCalendar};
pub use fs::FilesystemAdapter;
pub use git::{GitAdapter, SystemGit};
pub use gmail::{GmailAdapter, GoogleMail};
pub use google::{GoogleAuth, GoogleClient};
pub use greet::GreetTool;
pub use postgres::{PgDatabase, PostgresAdapter};
pub use whatsapp::{GreenApi, WhatsAppAdapter};
