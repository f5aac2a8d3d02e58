use chrono::{DateTime, Local};
use unicode_width::UnicodeWidthChar;

use crate::journal::JournalEntry;

/// Shown when an entry has no usable timestamp.
pub const UNKNOWN_TIME: &str = "--:--:--";

/// Local wall-clock `HH:MM:SS` for a `__REALTIME_TIMESTAMP` value.
pub fn display_time(micros: Option<u64>) -> String {
    micros
        .and_then(|us| i64::try_from(us).ok())
        .and_then(DateTime::from_timestamp_micros)
        .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

/// Keeps a message on a single row.
pub fn escape_message(message: &str) -> String {
    message.replace('\n', "\\n").replace('\r', "\\r")
}

/// Appends the leading characters of `text` that fit in `budget` terminal
/// columns. Returns `false` if `text` was cut.
fn push_fitting(line: &mut String, text: &str, budget: &mut usize) -> bool {
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width > *budget {
            return false;
        }
        *budget -= width;
        line.push(ch);
    }
    true
}

/// Composes `time hostname process: message`, cutting the message so the
/// whole line fits in `width` terminal columns.
pub fn compose_line(entry: &JournalEntry, width: u16) -> String {
    let prefix = format!(
        "{} {} {}: ",
        display_time(entry.timestamp_micros()),
        entry.hostname(),
        entry.process()
    );

    let mut budget = width as usize;
    let mut line = String::with_capacity(prefix.len() + entry.message().len());
    if push_fitting(&mut line, &prefix, &mut budget) {
        push_fitting(&mut line, &escape_message(entry.message()), &mut budget);
    }
    line
}
