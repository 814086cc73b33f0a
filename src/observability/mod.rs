//! Observability subsystem for aerokv
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle and transaction events
//!
//! Observability is read-only: nothing here influences engine behavior and a
//! failed log write is ignored.
//!
//! # Usage
//!
//! ```ignore
//! use aerokv::observability::{log_event_with_fields, Event};
//!
//! log_event_with_fields(Event::TxnCommit, &[("commit_ts", "42")]);
//! ```

mod events;
mod logger;

pub use events::Event;
pub use logger::{Logger, Severity};

/// Log a lifecycle event at its default severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields at its default severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

/// Renders a key for log fields: UTF-8 keys verbatim, anything else as hex.
pub fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(s) if !s.chars().any(char::is_control) => s.to_string(),
        _ => {
            let mut out = String::with_capacity(2 + key.len() * 2);
            out.push_str("0x");
            for byte in key {
                out.push_str(&format!("{:02x}", byte));
            }
            out
        }
    }
}
