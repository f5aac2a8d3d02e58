//! Diagnostics go to the systemd journal (and optionally a file), never to
//! the terminal, which belongs to the log view.

use std::fmt::{self, Write as _};
use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use libsystemd::logging::{Priority, journal_print};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;

/// Forwards events to the journal with the matching syslog priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct JournalLayer;

pub fn priority(level: &Level) -> Priority {
    match *level {
        Level::ERROR => Priority::Error,
        Level::WARN => Priority::Warning,
        Level::INFO => Priority::Info,
        Level::DEBUG | Level::TRACE => Priority::Debug,
    }
}

/// Renders an event as `message key=value ...`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl MessageVisitor {
    fn finish(mut self) -> String {
        self.message.push_str(&self.fields);
        self.message
    }
}

pub fn format_event(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);
    visitor.finish()
}

impl<S: Subscriber> Layer<S> for JournalLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let message = format_event(event);
        let _ = journal_print(priority(event.metadata().level()), &message);
    }
}

pub fn init(config: &Config) -> Result<()> {
    let journal = config.journal_log.then_some(JournalLayer);

    let file = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(config.log_level)
        .with(journal)
        .with(file)
        .try_init()
        .context("installing tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Capture(Arc<Mutex<Vec<String>>>);

    impl<S: Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0.lock().unwrap().push(format_event(event));
        }
    }

    #[test]
    fn formats_message_then_fields() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&lines)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(host = "web1", attempt = 3, "connect failed");
        });

        assert_eq!(
            lines.lock().unwrap().as_slice(),
            ["connect failed host=web1 attempt=3"]
        );
    }

    #[test]
    fn maps_levels_to_priorities() {
        assert!(matches!(priority(&Level::ERROR), Priority::Error));
        assert!(matches!(priority(&Level::WARN), Priority::Warning));
        assert!(matches!(priority(&Level::TRACE), Priority::Debug));
    }
}
