use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use logwatch_types::{LogEntry, LogLevel};

/// Timestamp shapes, most specific first. The first pattern that matches
/// anywhere in the line wins.
static TIMESTAMP_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // ISO-8601: 2024-01-15T10:30:00.123+09:00
        Regex::new(r"\d{4}-\d{2}-\d{2}[Tt]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:[Zz]|[+-]\d{2}:?\d{2})?")
            .unwrap(),
        // 2024-01-15 10:30:00
        Regex::new(r"\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?").unwrap(),
        // 01-15 10:30:00
        Regex::new(r"\d{2}-\d{2} \d{2}:\d{2}:\d{2}").unwrap(),
        // 10:30:00
        Regex::new(r"\d{2}:\d{2}:\d{2}(?:\.\d+)?").unwrap(),
    ]
});

/// Classifier turning one raw line into a [`LogEntry`].
///
/// Classification never fails: a line that matches nothing becomes an
/// `Unknown` entry with an empty timestamp and the trimmed line as message.
pub struct LineClassifier;

impl LineClassifier {
    /// Classify a raw log line
    pub fn classify(line: &str) -> LogEntry {
        let level = Self::detect_level(line);
        let timestamp = Self::find_timestamp(line);
        let message = Self::extract_message(line, timestamp.clone(), level);

        let timestamp = timestamp.map(|r| &line[r]).unwrap_or("");
        LogEntry::new(timestamp, level, message, line)
    }

    /// Detect the level by case-insensitive token search.
    ///
    /// Tokens are tried in priority order (error, warn, info, debug), so a
    /// line mentioning both ERROR and INFO is an error.
    pub fn detect_level(line: &str) -> LogLevel {
        let lower = line.to_ascii_lowercase();
        LogLevel::BY_PRIORITY
            .into_iter()
            .find(|level| level.token().is_some_and(|token| lower.contains(token)))
            .unwrap_or(LogLevel::Unknown)
    }

    /// Extract the first timestamp-looking substring (empty if none)
    pub fn extract_timestamp(line: &str) -> &str {
        Self::find_timestamp(line).map(|r| &line[r]).unwrap_or("")
    }

    fn find_timestamp(line: &str) -> Option<Range<usize>> {
        TIMESTAMP_PATTERNS
            .iter()
            .find_map(|pattern| pattern.find(line))
            .map(|m| m.range())
    }

    /// Remove the timestamp and level token, then strip separators
    fn extract_message(line: &str, timestamp: Option<Range<usize>>, level: LogLevel) -> String {
        let mut rest = match timestamp {
            Some(range) => {
                let mut s = String::with_capacity(line.len());
                s.push_str(&line[..range.start]);
                s.push_str(&line[range.end..]);
                s
            }
            None => line.to_string(),
        };

        if let Some(token) = level.token() {
            // ASCII lowercasing keeps byte offsets identical
            let lower = rest.to_ascii_lowercase();
            if let Some(start) = lower.find(token) {
                let mut end = start + token.len();
                if level == LogLevel::Warn && lower[end..].starts_with("ing") {
                    end += "ing".len();
                }
                rest.replace_range(start..end, "");
            }
        }

        rest.trim_matches(is_separator).to_string()
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '[' | ']' | ':' | '|' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_standard_line() {
        let entry = LineClassifier::classify("2024-01-01 10:00:05 ERROR: db down");
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.timestamp, "2024-01-01 10:00:05");
        assert_eq!(entry.message, "db down");
        assert_eq!(entry.raw_line, "2024-01-01 10:00:05 ERROR: db down");
    }

    #[test]
    fn test_classify_plain_text() {
        let entry = LineClassifier::classify("just some text");
        assert_eq!(entry.level, LogLevel::Unknown);
        assert_eq!(entry.timestamp, "");
        assert_eq!(entry.message, "just some text");
    }

    #[test]
    fn test_level_is_case_insensitive() {
        assert_eq!(LineClassifier::detect_level("error: lower case"), LogLevel::Error);
        assert_eq!(LineClassifier::detect_level("Debug value=3"), LogLevel::Debug);
    }

    #[test]
    fn test_warn_and_warning() {
        let warn = LineClassifier::classify("10:00:00 WARN disk 91%");
        let warning = LineClassifier::classify("10:00:00 [WARNING] disk 91%");
        assert_eq!(warn.level, LogLevel::Warn);
        assert_eq!(warning.level, LogLevel::Warn);
        assert_eq!(warn.message, "disk 91%");
        assert_eq!(warning.message, "disk 91%");
    }

    #[test]
    fn test_error_wins_over_info() {
        let entry = LineClassifier::classify("INFO retrying after ERROR");
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[test]
    fn test_timestamp_patterns_in_order() {
        assert_eq!(
            LineClassifier::extract_timestamp("2024-01-01T12:00:00.250+09:00 INFO ok"),
            "2024-01-01T12:00:00.250+09:00"
        );
        assert_eq!(
            LineClassifier::extract_timestamp("2024-01-01T10:00:00Z INFO ok"),
            "2024-01-01T10:00:00Z"
        );
        assert_eq!(
            LineClassifier::extract_timestamp("[2024-01-01 10:00:00.5] INFO ok"),
            "2024-01-01 10:00:00.5"
        );
        assert_eq!(
            LineClassifier::extract_timestamp("01-31 23:59:59 DEBUG tick"),
            "01-31 23:59:59"
        );
        assert_eq!(LineClassifier::extract_timestamp("at 10:00:00 INFO"), "10:00:00");
        assert_eq!(LineClassifier::extract_timestamp("INFO no time here"), "");
    }

    #[test]
    fn test_bracketed_separators_are_stripped() {
        let entry = LineClassifier::classify("[2024-01-01 10:00:00] [INFO] | server started");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "server started");
    }

    #[test]
    fn test_level_only_line_has_empty_message() {
        let entry = LineClassifier::classify("ERROR");
        assert_eq!(entry.level, LogLevel::Error);
        assert_eq!(entry.message, "");
    }

    #[test]
    fn test_multibyte_utf8_no_panic() {
        let entry = LineClassifier::classify("2024-01-15 10:30:00 INFO ╭──── 데이터베이스 ────╮");
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "╭──── 데이터베이스 ────╮");
    }
}
