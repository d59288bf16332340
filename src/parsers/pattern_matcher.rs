use regex::RegexSet;

use crate::error::Result;

/// Maps lines to handlers through a set of registered regexes.
///
/// When several patterns match the same line, the pattern with the longest
/// literal prefix wins; patterns with equally long literal prefixes fall back
/// to registration order, earliest first. The literal prefix is the run of
/// plain characters at the start of the pattern (after an optional `^`) up to
/// the first metacharacter, escape class or quantified character. A pattern
/// containing `|` has no literal prefix.
///
/// So `^------ MEMORY INFO .*` beats the catch-all `^------ .* ------$` on
/// `------ MEMORY INFO (/proc/meminfo) ------`, whichever was registered first.
#[derive(Debug, Clone)]
pub struct PatternMatcher<H> {
    patterns: Vec<String>,
    entries: Vec<(usize, H)>,
    set: RegexSet,
}

impl<H> Default for PatternMatcher<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> PatternMatcher<H> {
    pub fn new() -> Self {
        PatternMatcher {
            patterns: Vec::new(),
            entries: Vec::new(),
            set: RegexSet::empty(),
        }
    }

    /// Associates `pattern` with `handler`. Several patterns may share a handler.
    pub fn register(&mut self, handler: H, pattern: &str) -> Result<()> {
        let mut patterns = self.patterns.clone();
        patterns.push(pattern.to_string());
        self.set = RegexSet::new(&patterns)?;
        self.patterns = patterns;
        self.entries.push((literal_prefix_len(pattern), handler));
        Ok(())
    }

    /// The handler of the best matching pattern, or `None`.
    pub fn match_line(&self, line: &str) -> Option<&H> {
        self.set
            .matches(line)
            .into_iter()
            .map(|index| (index, &self.entries[index]))
            .max_by(|(a_index, (a_prefix, _)), (b_index, (b_prefix, _))| {
                a_prefix.cmp(b_prefix).then(b_index.cmp(a_index))
            })
            .map(|(_, (_, handler))| handler)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn literal_prefix_len(pattern: &str) -> usize {
    if pattern.contains('|') {
        return 0;
    }

    let mut chars = pattern.strip_prefix('^').unwrap_or(pattern).chars().peekable();
    let mut len = 0;
    while let Some(c) = chars.next() {
        let literal = match c {
            '\\' => matches!(chars.next(), Some(escaped) if !escaped.is_alphanumeric()),
            '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' => false,
            _ => true,
        };
        // `ab*` only guarantees `a`
        if !literal || matches!(chars.peek(), Some('*' | '?' | '{')) {
            break;
        }
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match() {
        let mut matcher = PatternMatcher::new();
        matcher.register(1, r"^------ MEMORY INFO .*").unwrap();
        assert_eq!(matcher.match_line("MemTotal: 1 kB"), None);
        assert_eq!(PatternMatcher::<u8>::new().match_line("anything"), None);
    }

    #[test]
    fn test_longest_literal_prefix_wins() {
        let mut matcher = PatternMatcher::new();
        matcher.register("other", r"^------ .* ------$").unwrap();
        matcher.register("meminfo", r"^------ MEMORY INFO .*").unwrap();

        assert_eq!(
            matcher.match_line("------ MEMORY INFO (/proc/meminfo) ------"),
            Some(&"meminfo")
        );
        assert_eq!(
            matcher.match_line("------ 0.01s was the duration of 'MEMORY INFO' ------"),
            Some(&"other")
        );
    }

    #[test]
    fn test_registration_order_breaks_ties() {
        let mut matcher = PatternMatcher::new();
        matcher.register("first", r"^abc.*").unwrap();
        matcher.register("second", r"^abc\d+").unwrap();
        assert_eq!(matcher.match_line("abc123"), Some(&"first"));

        let mut matcher = PatternMatcher::new();
        matcher.register("second", r"^abc\d+").unwrap();
        matcher.register("first", r"^abc.*").unwrap();
        assert_eq!(matcher.match_line("abc123"), Some(&"second"));
    }

    #[test]
    fn test_match_is_deterministic() {
        let mut matcher = PatternMatcher::new();
        matcher.register(1, r"^DUMP OF SERVICE .*:$").unwrap();
        matcher.register(2, r"^DUMP OF SERVICE batterystats:$").unwrap();
        for _ in 0..3 {
            assert_eq!(matcher.match_line("DUMP OF SERVICE batterystats:"), Some(&2));
            assert_eq!(matcher.match_line("DUMP OF SERVICE wifi:"), Some(&1));
        }
    }

    #[test]
    fn test_literal_prefix_len() {
        assert_eq!(literal_prefix_len(r"^------ MEMORY INFO .*"), 19);
        assert_eq!(literal_prefix_len(r"^------ .* ------$"), 7);
        assert_eq!(literal_prefix_len(r"^\*\*\* FATAL"), 9);
        assert_eq!(literal_prefix_len(r"^ab*c"), 1);
        assert_eq!(literal_prefix_len(r"^\d+ abc"), 0);
        assert_eq!(literal_prefix_len(r"^abc|^abd"), 0);
        assert_eq!(literal_prefix_len(""), 0);
    }

    #[test]
    fn test_invalid_pattern() {
        let mut matcher = PatternMatcher::new();
        assert!(matcher.register(1, r"^(unclosed").is_err());
        assert!(matcher.is_empty());
    }
}
