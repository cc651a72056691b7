//! Program Dashboard
//! Live status and log panes for the programs of a process supervisor,
//! driven by the supervisor's REST and server-sent-events API.

pub mod alerts;
pub mod api;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod locale;
pub mod sse;
pub mod status;

pub use api::{Backend, HttpBackend, ProgramId};
pub use client::{ClientSettings, DashboardClient, TeardownReport};
pub use config::{DashboardConfig, DeliveryMode};
pub use document::{Document, Page};
pub use error::{ApiError, ConfigError};
pub use locale::Locale;
