//! Glob pattern translation for key scans.
//!
//! Remote stores understand glob syntax natively; the local tier needs the same
//! semantics, so globs are translated into anchored regular expressions.

use regex::Regex;

/// Translate a glob (`*` any run, `?` any single char) into an anchored regex.
///
/// Every other character is matched literally.
pub fn glob_to_regex(glob: &str) -> Result<Regex, regex::Error> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    let mut literal = String::new();
    for ch in glob.chars() {
        match ch {
            '*' | '?' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                pattern.push_str(if ch == '*' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    pattern.push_str(&regex::escape(&literal));
    pattern.push('$');

    Regex::new(&pattern)
}

/// Check a single key against a glob; invalid patterns match nothing
pub fn glob_matches(glob: &str, key: &str) -> bool {
    glob_to_regex(glob)
        .map(|re| re.is_match(key))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_prefix() {
        let re = glob_to_regex("user:*").unwrap();
        assert!(re.is_match("user:1"));
        assert!(re.is_match("user:"));
        assert!(!re.is_match("match:1"));
        assert!(!re.is_match("xuser:1"));
    }

    #[test]
    fn test_question_mark_matches_single_char() {
        assert!(glob_matches("team:?", "team:a"));
        assert!(!glob_matches("team:?", "team:ab"));
        assert!(!glob_matches("team:?", "team:"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        assert!(glob_matches("match.(live)+*", "match.(live)+42"));
        assert!(!glob_matches("match.live", "matchXlive"));
        assert!(glob_matches("a[1]", "a[1]"));
    }

    #[test]
    fn test_pattern_is_anchored() {
        assert!(!glob_matches("user", "user:1"));
        assert!(glob_matches("*:1", "user:1"));
    }
}
