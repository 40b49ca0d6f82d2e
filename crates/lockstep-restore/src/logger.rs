//! Collecting restore diagnostics
//!
//! Every message raised during a restore passes through
//! [`RestoreCollectorLogger`]. It applies the project's warning policy,
//! forwards the result to `tracing`, and keeps it for the lock artifact and
//! the no-op cache.

use lockstep_package::{LogCode, LogLevel, RestoreLogMessage, WarningProperties};
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct RestoreCollectorLogger {
    warnings: WarningProperties,
    messages: Mutex<Vec<RestoreLogMessage>>,
}

impl RestoreCollectorLogger {
    pub fn new(warnings: WarningProperties) -> Self {
        Self {
            warnings,
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Record one message. Returns `false` when the warning policy
    /// suppressed it.
    pub fn log(&self, message: RestoreLogMessage) -> bool {
        let Some(message) = self.apply_warning_policy(message) else {
            return false;
        };
        forward(&message);
        self.lock().push(message);
        true
    }

    pub fn log_all(&self, messages: impl IntoIterator<Item = RestoreLogMessage>) {
        for message in messages {
            self.log(message);
        }
    }

    /// Replay messages recorded by an earlier restore without re-applying
    /// the warning policy
    pub fn replay(&self, messages: &[RestoreLogMessage]) {
        for message in messages {
            forward(message);
            self.lock().push(message.clone());
        }
    }

    pub fn messages(&self) -> Vec<RestoreLogMessage> {
        self.lock().clone()
    }

    pub fn errors(&self) -> Vec<RestoreLogMessage> {
        self.lock().iter().filter(|m| m.is_error()).cloned().collect()
    }

    pub fn has_errors(&self) -> bool {
        self.lock().iter().any(RestoreLogMessage::is_error)
    }

    /// Recorded errors and warnings, lower levels dropped
    pub fn errors_and_warnings(&self) -> Vec<RestoreLogMessage> {
        self.lock()
            .iter()
            .filter(|m| m.level >= LogLevel::Warning)
            .cloned()
            .collect()
    }

    fn apply_warning_policy(&self, mut message: RestoreLogMessage) -> Option<RestoreLogMessage> {
        if message.level != LogLevel::Warning {
            return Some(message);
        }
        let code = message.code.as_str();
        if listed(&self.warnings.no_warn, code) {
            debug!(code, "Warning suppressed by no-warn");
            return None;
        }
        if self.warnings.treat_warnings_as_errors || listed(&self.warnings.warnings_as_errors, code)
        {
            message.level = LogLevel::Error;
        }
        Some(message)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RestoreLogMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn listed(codes: &[String], code: &str) -> bool {
    code != LogCode::Undefined.as_str() && codes.iter().any(|c| c.trim().eq_ignore_ascii_case(code))
}

fn forward(message: &RestoreLogMessage) {
    let graphs = message.target_graphs.join(", ");
    match message.level {
        LogLevel::Error => error!(code = %message.code, graphs, "{}", message.message),
        LogLevel::Warning => warn!(code = %message.code, graphs, "{}", message.message),
        LogLevel::Information | LogLevel::Minimal => info!(code = %message.code, "{}", message.message),
        LogLevel::Debug | LogLevel::Verbose => debug!(code = %message.code, "{}", message.message),
    }
}

/// Merge messages that differ only in their target graph into one message
/// listing every graph. First occurrence order is kept.
pub fn merge_on_target_graph(messages: Vec<RestoreLogMessage>) -> Vec<RestoreLogMessage> {
    let mut merged: Vec<RestoreLogMessage> = Vec::with_capacity(messages.len());
    for message in messages {
        let existing = merged.iter_mut().find(|m| {
            m.level == message.level
                && m.code == message.code
                && m.message == message.message
                && m.library_id == message.library_id
        });
        match existing {
            Some(existing) => {
                for graph in message.target_graphs {
                    if !existing.target_graphs.contains(&graph) {
                        existing.target_graphs.push(graph);
                    }
                }
            }
            None => merged.push(message),
        }
    }
    merged
}
