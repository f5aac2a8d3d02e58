use std::collections::BTreeMap;

pub const REALTIME_TIMESTAMP: &str = "__REALTIME_TIMESTAMP";
pub const CURSOR: &str = "__CURSOR";
pub const PRIORITY: &str = "PRIORITY";
pub const HOSTNAME: &str = "_HOSTNAME";
pub const COMM: &str = "_COMM";
pub const MESSAGE: &str = "MESSAGE";

/// Syslog severity carried in `PRIORITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Emerg,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Level {
    pub fn from_priority(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Level::Emerg),
            "1" => Some(Level::Alert),
            "2" => Some(Level::Crit),
            "3" => Some(Level::Err),
            "4" => Some(Level::Warning),
            "5" => Some(Level::Notice),
            "6" => Some(Level::Info),
            "7" => Some(Level::Debug),
            _ => None,
        }
    }

    /// Lines at these levels are held on screen for the visibility window.
    ///
    /// `alert` is coloured like an error but is not pinned.
    pub fn is_pinnable(self) -> bool {
        matches!(self, Level::Emerg | Level::Crit | Level::Err)
    }
}

/// One journal record: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JournalEntry {
    fields: BTreeMap<String, String>,
}

impl JournalEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Microseconds since the epoch, if the entry carries a parseable
    /// `__REALTIME_TIMESTAMP`.
    pub fn timestamp_micros(&self) -> Option<u64> {
        self.get(REALTIME_TIMESTAMP)?.trim().parse().ok()
    }

    pub fn level(&self) -> Level {
        self.get(PRIORITY)
            .and_then(Level::from_priority)
            .unwrap_or(Level::Notice)
    }

    pub fn hostname(&self) -> &str {
        self.get(HOSTNAME).unwrap_or("<none>")
    }

    pub fn process(&self) -> &str {
        self.get(COMM).unwrap_or("kernel")
    }

    pub fn message(&self) -> &str {
        self.get(MESSAGE).unwrap_or("<none>")
    }

    pub fn cursor(&self) -> Option<&str> {
        self.get(CURSOR)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for JournalEntry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_for_missing_fields() {
        let entry = JournalEntry::new();
        assert_eq!(entry.hostname(), "<none>");
        assert_eq!(entry.process(), "kernel");
        assert_eq!(entry.message(), "<none>");
        assert_eq!(entry.level(), Level::Notice);
        assert_eq!(entry.timestamp_micros(), None);
        assert_eq!(entry.cursor(), None);
    }

    #[test]
    fn unparseable_priority_is_notice() {
        for raw in ["", "8", "-1", "err", "03"] {
            let entry: JournalEntry = [(PRIORITY, raw)].into_iter().collect();
            assert_eq!(entry.level(), Level::Notice, "priority {raw:?}");
        }
    }

    #[test]
    fn priorities_map_to_levels() {
        let levels: Vec<_> = (0..8)
            .map(|p| Level::from_priority(&p.to_string()).unwrap())
            .collect();
        assert_eq!(
            levels,
            vec![
                Level::Emerg,
                Level::Alert,
                Level::Crit,
                Level::Err,
                Level::Warning,
                Level::Notice,
                Level::Info,
                Level::Debug,
            ]
        );
        assert!(Level::Emerg.is_pinnable());
        assert!(Level::Crit.is_pinnable());
        assert!(Level::Err.is_pinnable());
        assert!(!Level::Alert.is_pinnable());
        assert!(!Level::Warning.is_pinnable());
    }

    #[test]
    fn reads_timestamp() {
        let entry: JournalEntry = [(REALTIME_TIMESTAMP, "1700000000123456")]
            .into_iter()
            .collect();
        assert_eq!(entry.timestamp_micros(), Some(1_700_000_000_123_456));
    }
}
