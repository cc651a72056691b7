//! User-visible strings.

use serde::{Deserialize, Serialize};

use crate::api::{Action, ProgramId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ru,
}

impl Locale {
    pub fn loading(self) -> &'static str {
        match self {
            Locale::En => "Loading logs...",
            Locale::Ru => "Загрузка логов...",
        }
    }

    pub fn no_logs(self) -> &'static str {
        match self {
            Locale::En => "No logs available",
            Locale::Ru => "Логи отсутствуют",
        }
    }

    pub fn load_error(self) -> &'static str {
        match self {
            Locale::En => "Error loading logs",
            Locale::Ru => "Ошибка загрузки логов",
        }
    }

    pub fn cleared(self) -> &'static str {
        match self {
            Locale::En => "Logs cleared",
            Locale::Ru => "Логи очищены",
        }
    }

    pub fn pid_placeholder(self) -> &'static str {
        match self {
            Locale::En => "N/A",
            Locale::Ru => "Н/Д",
        }
    }

    pub fn unknown_status(self) -> &'static str {
        match self {
            Locale::En => "Unknown",
            Locale::Ru => "Неизвестно",
        }
    }

    /// Informational notice shown while an action is in flight.
    pub fn in_progress(self, action: Action, program: ProgramId) -> String {
        match (self, action) {
            (Locale::En, Action::Start) => format!("Starting program {program}..."),
            (Locale::En, Action::Stop) => format!("Stopping program {program}..."),
            (Locale::En, Action::ClearLogs) => format!("Clearing logs for program {program}..."),
            (Locale::Ru, Action::Start) => format!("Запуск программы {program}..."),
            (Locale::Ru, Action::Stop) => format!("Остановка программы {program}..."),
            (Locale::Ru, Action::ClearLogs) => format!("Очистка логов программы {program}..."),
        }
    }

    /// Shown when an action could not reach the backend or got garbage back.
    pub fn action_failed(self, action: Action, program: ProgramId) -> String {
        match (self, action) {
            (Locale::En, Action::Start) => format!("Error starting program {program}"),
            (Locale::En, Action::Stop) => format!("Error stopping program {program}"),
            (Locale::En, Action::ClearLogs) => format!("Error clearing logs for program {program}"),
            (Locale::Ru, Action::Start) => format!("Ошибка запуска программы {program}"),
            (Locale::Ru, Action::Stop) => format!("Ошибка остановки программы {program}"),
            (Locale::Ru, Action::ClearLogs) => format!("Ошибка очистки логов программы {program}"),
        }
    }

    pub fn confirm_clear(self, program: ProgramId) -> String {
        match self {
            Locale::En => format!("Are you sure you want to clear logs for program {program}?"),
            Locale::Ru => format!("Вы уверены, что хотите очистить логи программы {program}?"),
        }
    }

    pub fn refreshing(self) -> &'static str {
        match self {
            Locale::En => "Refreshing all programs...",
            Locale::Ru => "Обновление всех программ...",
        }
    }

    pub fn refreshed(self) -> &'static str {
        match self {
            Locale::En => "All programs refreshed",
            Locale::Ru => "Все программы обновлены",
        }
    }

    pub fn refresh_failed(self) -> &'static str {
        match self {
            Locale::En => "Error refreshing programs",
            Locale::Ru => "Ошибка обновления программ",
        }
    }

    pub fn program_label(self, program: ProgramId) -> String {
        match self {
            Locale::En => format!("Program {program}"),
            Locale::Ru => format!("Программа {program}"),
        }
    }
}
