//! POSIX-style quoted word splitting for `exec` specs given as a single
//! shell-like string (§4.5).
//!
//! Supports single quotes (fully literal), double quotes (backslash escapes
//! `"`, `\`, and whitespace-insensitive otherwise), and a bare backslash
//! escaping the following character outside of quotes. Whitespace is the
//! word delimiter.

/// Split `input` into words using POSIX-ish quoting rules.
///
/// Empty or whitespace-only input yields an empty vector (§8 round-trip
/// law).
#[must_use]
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            '\'' => {
                in_word = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_word = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            if let Some(&next) = chars.peek() {
                                if next == '"' || next == '\\' {
                                    current.push(next);
                                    chars.next();
                                } else {
                                    current.push('\\');
                                }
                            } else {
                                current.push('\\');
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                in_word = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_simple_words() {
        assert_eq!(split_words("foo bar baz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn handles_single_and_double_quotes_and_escapes() {
        assert_eq!(
            split_words(r#"foo 'a b' "c\"d""#),
            vec!["foo", "a b", "c\"d"]
        );
    }

    #[test]
    fn empty_and_whitespace_only_yield_empty() {
        assert_eq!(split_words(""), Vec::<String>::new());
        assert_eq!(split_words("   \t  "), Vec::<String>::new());
    }

    #[test]
    fn backslash_escapes_outside_quotes() {
        assert_eq!(split_words(r"foo\ bar baz"), vec!["foo bar", "baz"]);
    }

    #[test]
    fn collapses_repeated_whitespace() {
        assert_eq!(split_words("  foo   bar  "), vec!["foo", "bar"]);
    }
}
