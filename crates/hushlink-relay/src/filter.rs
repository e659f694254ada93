/// Case-insensitive substring filter over outbound relay text.
///
/// Deliberately simple: the keyword list comes from configuration and a
/// hit refuses the relay and arms the sender's automatic block window.
pub struct ContentFilter {
    keywords: Vec<String>,
}

impl ContentFilter {
    pub fn new(keywords: impl IntoIterator<Item = String>) -> Self {
        Self {
            keywords: keywords
                .into_iter()
                .map(|keyword| keyword.to_lowercase())
                .filter(|keyword| !keyword.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let text = text.to_lowercase();
        self.keywords.iter().any(|keyword| text.contains(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ContentFilter {
        ContentFilter::new(["spam".to_string(), "scam".to_string()])
    }

    #[test]
    fn matches_are_case_insensitive_substrings() {
        let filter = filter();
        assert!(filter.matches("this is SPAM indeed"));
        assert!(filter.matches("unscammable"));
        assert!(!filter.matches("a perfectly fine message"));
    }

    #[test]
    fn empty_keyword_list_never_matches() {
        let filter = ContentFilter::new(Vec::new());
        assert!(!filter.matches("spam"));
    }

    #[test]
    fn blank_keywords_are_dropped() {
        let filter = ContentFilter::new(["".to_string(), "spam".to_string()]);
        assert!(!filter.matches("hello"));
        assert!(filter.matches("spam"));
    }
}
