use regex::Regex;

/// Keyword matcher applied to raw log lines
#[derive(Clone)]
pub struct KeywordFilter {
    /// Original keyword
    keyword: String,

    /// Escaped case-insensitive pattern (only when ignoring case)
    regex: Option<Regex>,
}

impl KeywordFilter {
    /// Create a case-sensitive literal substring filter
    pub fn new(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            regex: None,
        }
    }

    /// Create a filter that ignores case
    pub fn new_case_insensitive(keyword: &str) -> Result<Self, regex::Error> {
        let regex = if keyword.is_empty() {
            None
        } else {
            // Escape first: the keyword is a literal, not a pattern
            Some(Regex::new(&format!("(?i){}", regex::escape(keyword)))?)
        };

        Ok(Self {
            keyword: keyword.to_string(),
            regex,
        })
    }

    /// Check if a raw line contains the keyword. An empty keyword matches nothing.
    pub fn matches(&self, raw_line: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }
        match &self.regex {
            Some(re) => re.is_match(raw_line),
            None => raw_line.contains(&self.keyword),
        }
    }

    /// Find all match positions in a string (for highlighting)
    pub fn find_matches(&self, text: &str) -> Vec<(usize, usize)> {
        if self.keyword.is_empty() {
            return Vec::new();
        }
        match &self.regex {
            Some(re) => re.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => text
                .match_indices(&self.keyword)
                .map(|(start, m)| (start, start + m.len()))
                .collect(),
        }
    }

    /// Get the original keyword
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Check if filter is empty (matches nothing)
    pub fn is_empty(&self) -> bool {
        self.keyword.is_empty()
    }

    /// Check if filter is case insensitive
    pub fn is_case_insensitive(&self) -> bool {
        self.regex.is_some()
    }
}

impl std::fmt::Debug for KeywordFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordFilter")
            .field("keyword", &self.keyword)
            .field("case_insensitive", &self.is_case_insensitive())
            .finish()
    }
}
