// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Page state: connection and module indicators, the result line and the
//! append-only log, shared between the backend and the window.

use chrono::{DateTime, Local};
use log::debug;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Connectivity as reported by the platform signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Online,
    Offline,
}

impl ConnectionState {
    pub fn from_flag(online: bool) -> Self {
        if online {
            Self::Online
        } else {
            Self::Offline
        }
    }

    /// Indicator text
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    pub fn class(self) -> StatusClass {
        match self {
            Self::Online => StatusClass::Online,
            Self::Offline => StatusClass::Offline,
        }
    }

    /// Log line written each time this state is reported
    pub fn log_message(self) -> &'static str {
        match self {
            Self::Online => "Internet connection detected",
            Self::Offline => "No internet connection detected",
        }
    }
}

/// Lifecycle of the one-shot module load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleLoadState {
    Idle,
    Loading,
    Loaded,
    Failed,
}

impl ModuleLoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }
}

impl fmt::Display for ModuleLoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Style class applied to a display region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Neutral,
    Online,
    Offline,
    Loading,
}

impl StatusClass {
    pub fn css_name(self) -> &'static str {
        match self {
            Self::Neutral => "status",
            Self::Online => "status online",
            Self::Offline => "status offline",
            Self::Loading => "status loading",
        }
    }
}

/// Addressable display regions. The log container is append-only and has
/// its own entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    ConnectionStatus,
    ModuleStatus,
    Result,
}

/// Text plus style class of one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub text: String,
    pub class: StatusClass,
}

impl Indicator {
    fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            class: StatusClass::Neutral,
        }
    }
}

/// One line of the page log
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Everything the page shows: three regions and the log.
#[derive(Debug, Clone, Serialize)]
pub struct PageSurface {
    pub connection: Indicator,
    pub module: Indicator,
    pub result: Indicator,
    pub log: Vec<LogEntry>,

    /// Print each new log entry to stdout (headless mode)
    #[serde(skip)]
    echo: bool,
}

impl Default for PageSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSurface {
    pub fn new() -> Self {
        Self {
            connection: Indicator::new("checking..."),
            module: Indicator::new("Not loaded"),
            result: Indicator::new(""),
            log: Vec::new(),
            echo: false,
        }
    }

    pub fn with_echo(echo: bool) -> Self {
        Self {
            echo,
            ..Self::new()
        }
    }

    pub fn indicator(&self, region: Region) -> &Indicator {
        match region {
            Region::ConnectionStatus => &self.connection,
            Region::ModuleStatus => &self.module,
            Region::Result => &self.result,
        }
    }

    fn indicator_mut(&mut self, region: Region) -> &mut Indicator {
        match region {
            Region::ConnectionStatus => &mut self.connection,
            Region::ModuleStatus => &mut self.module,
            Region::Result => &mut self.result,
        }
    }

    pub fn set_text(&mut self, region: Region, text: String) {
        self.indicator_mut(region).text = text;
    }

    pub fn set_class(&mut self, region: Region, class: StatusClass) {
        self.indicator_mut(region).class = class;
    }

    /// Append a timestamped entry. Entries are never removed.
    pub fn append_log(&mut self, message: String) {
        let entry = LogEntry {
            timestamp: Local::now(),
            message,
        };

        debug!(target: "page", "{}", entry.message);
        if self.echo {
            println!("{entry}");
        }

        self.log.push(entry);
    }

    pub fn log_entries(&self) -> &[LogEntry] {
        &self.log
    }
}

/// Thread-safe wrapper for PageSurface
pub type SharedSurface = Arc<Mutex<PageSurface>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_presentation() {
        let online = ConnectionState::from_flag(true);
        assert_eq!(online.as_str(), "online");
        assert_eq!(online.class().css_name(), "status online");
        assert_eq!(online.log_message(), "Internet connection detected");

        let offline = ConnectionState::from_flag(false);
        assert_eq!(offline.as_str(), "offline");
        assert_eq!(offline.class().css_name(), "status offline");
        assert_eq!(offline.log_message(), "No internet connection detected");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!ModuleLoadState::Idle.is_terminal());
        assert!(!ModuleLoadState::Loading.is_terminal());
        assert!(ModuleLoadState::Loaded.is_terminal());
        assert!(ModuleLoadState::Failed.is_terminal());
    }

    #[test]
    fn test_regions_are_independent() {
        let mut surface = PageSurface::new();
        surface.set_text(Region::ModuleStatus, "Loading...".to_string());
        surface.set_class(Region::ModuleStatus, StatusClass::Loading);

        assert_eq!(surface.indicator(Region::ModuleStatus).text, "Loading...");
        assert_eq!(surface.indicator(Region::ModuleStatus).class, StatusClass::Loading);
        assert_eq!(surface.indicator(Region::ConnectionStatus).text, "checking...");
        assert_eq!(surface.indicator(Region::Result).class, StatusClass::Neutral);
    }

    #[test]
    fn test_log_is_append_only_and_ordered() {
        let mut surface = PageSurface::new();
        surface.append_log("first".to_string());
        surface.append_log("second".to_string());
        surface.append_log("first".to_string());

        let messages: Vec<&str> = surface.log_entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "first"]);
    }

    #[test]
    fn test_log_entry_format() {
        let mut surface = PageSurface::new();
        surface.append_log("Starting module loading...".to_string());

        let line = surface.log_entries()[0].to_string();
        // "[HH:MM:SS] message"
        assert_eq!(line.len(), "[00:00:00] ".len() + "Starting module loading...".len());
        assert!(line.starts_with('['));
        assert!(line.ends_with("] Starting module loading..."));
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let mut surface = PageSurface::new();
        surface.set_text(Region::ConnectionStatus, "online".to_string());
        surface.set_class(Region::ConnectionStatus, StatusClass::Online);
        surface.append_log("Internet connection detected".to_string());

        let value = serde_json::to_value(&surface).unwrap();
        assert_eq!(value["connection"]["text"], "online");
        assert_eq!(value["connection"]["class"], "online");
        assert_eq!(value["log"][0]["message"], "Internet connection detected");
        assert!(value.get("echo").is_none());
    }
}
