use regex::Regex;

/// Check whether a string matches a LIKE pattern.
///
/// `_` matches exactly one character and `%` matches any run of characters
/// (including the empty one); everything else matches itself.
pub fn is_like(value: &str, pattern: &str) -> bool {
    let mut translated = String::from("^(?s)");
    for c in pattern.chars() {
        match c {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    Regex::new(&translated)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}
