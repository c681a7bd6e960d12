//! Search value escaping helpers (FHIR "Encoding Note").
//!
//! Search values may escape separator characters using `\`:
//! - `\,` (comma in values)
//! - `\|` (token system/code separator)
//! - `\$` (composite tuple separator)
//! - `\\` (literal backslash)

pub(crate) fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let bytes = input.as_bytes();
    while i < bytes.len() {
        match bytes[i] as char {
            '\\' => {
                i += 1;
                if i < bytes.len() {
                    i += 1;
                }
            }
            c if c == sep => {
                out.push(&input[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&input[start..]);
    out
}

pub(crate) fn unescape_search_value(input: &str) -> Result<String, ()> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            return Err(());
        };
        match next {
            '\\' | ',' | '$' | '|' => out.push(next),
            _ => return Err(()),
        }
    }
    Ok(out)
}

/// Unescape, keeping the raw text when it carries an unknown escape.
pub(crate) fn unescape_or_raw(input: &str) -> String {
    unescape_search_value(input).unwrap_or_else(|_| input.to_string())
}

/// Escape SQL LIKE meta-characters so user input is matched literally.
pub(crate) fn escape_like_pattern(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_escaped_separators() {
        assert_eq!(split_unescaped("a,b\\,c,d", ','), vec!["a", "b\\,c", "d"]);
        assert_eq!(split_unescaped("sys|code", '|'), vec!["sys", "code"]);
        assert_eq!(split_unescaped("", ','), vec![""]);
    }

    #[test]
    fn unescape_handles_known_sequences() {
        assert_eq!(unescape_search_value("b\\,c").unwrap(), "b,c");
        assert_eq!(unescape_search_value("a\\\\b").unwrap(), "a\\b");
        assert!(unescape_search_value("a\\nb").is_err());
        assert!(unescape_search_value("trailing\\").is_err());
        assert_eq!(unescape_or_raw("a\\nb"), "a\\nb");
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like_pattern("50%_off\\"), "50\\%\\_off\\\\");
    }
}
