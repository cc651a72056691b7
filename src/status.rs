//! Program status as reported by the backend, and the status card it drives.

use chrono::NaiveDateTime;

use crate::api::ProgramSnapshot;
use crate::locale::Locale;

/// Status of a managed program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramStatus {
    Running,
    Stopped,
    Error,
    Other(String),
}

impl ProgramStatus {
    /// Map a raw status string. The Russian-localised backend reports
    /// `запущен` / `остановлен` / `ошибка`.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "running" | "запущен" => ProgramStatus::Running,
            "stopped" | "остановлен" => ProgramStatus::Stopped,
            "error" | "ошибка" => ProgramStatus::Error,
            other => ProgramStatus::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProgramStatus::Running)
    }
}

impl std::fmt::Display for ProgramStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramStatus::Running => write!(f, "running"),
            ProgramStatus::Stopped => write!(f, "stopped"),
            ProgramStatus::Error => write!(f, "error"),
            ProgramStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// The indicator, label, pid and start/stop controls of one program.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusCard {
    pub status: Option<ProgramStatus>,
    /// Raw status string, used to key the indicator style.
    pub raw_status: String,
    pub label: String,
    pub pid_text: String,
    pub name: Option<String>,
    pub last_update: Option<String>,
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl StatusCard {
    pub fn new(locale: Locale) -> Self {
        Self {
            status: None,
            raw_status: "unknown".to_string(),
            label: locale.unknown_status().to_string(),
            pid_text: locale.pid_placeholder().to_string(),
            name: None,
            last_update: None,
            start_enabled: true,
            stop_enabled: false,
        }
    }

    pub fn indicator_class(&self) -> String {
        format!("status-indicator status-{}", self.raw_status)
    }

    /// Overwrite the card from a fresh snapshot.
    pub fn apply(&mut self, snapshot: &ProgramSnapshot, locale: Locale) {
        let status = ProgramStatus::parse(&snapshot.status);
        let running = status.is_running();

        self.raw_status = snapshot.status.clone();
        self.label = capitalize(&snapshot.status);
        self.pid_text = match snapshot.pid {
            Some(pid) if pid != 0 => pid.to_string(),
            _ => locale.pid_placeholder().to_string(),
        };
        if snapshot.name.is_some() {
            self.name = snapshot.name.clone();
        }
        self.last_update = snapshot.last_update.as_deref().map(format_last_update);
        self.start_enabled = !running;
        self.stop_enabled = running;
        self.status = Some(status);
    }
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ISO timestamps become HH:MM:SS; anything else is shown as sent.
fn format_last_update(raw: &str) -> String {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|ts| ts.format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| raw.to_string())
}
