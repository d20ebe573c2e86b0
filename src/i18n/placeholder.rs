//! Positional placeholders (`{0}` .. `{9}`) and argument substitution.
//!
//! Substitution follows composite-format rules: `{{` and `}}` are literal
//! braces, `{index}`, `{index,width}` and `{index:format}` are tokens. The
//! format part is accepted but not interpreted; arguments are already text.

use thiserror::Error;

/// Number of positional slots checked by validation (`{0}` .. `{9}`).
pub const SLOT_COUNT: usize = 10;

/// Alignment widths at or above this are rejected.
pub const WIDTH_LIMIT: i64 = 1_000_000;

/// Why an argument substitution failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("unbalanced '{brace}' at position {position}")]
    UnbalancedBrace { brace: char, position: usize },

    #[error("invalid placeholder at position {position}")]
    InvalidToken { position: usize },

    #[error("alignment width at position {position} is too large")]
    WidthTooLarge { position: usize },

    #[error("placeholder {{{index}}} has no argument ({count} given)")]
    MissingArgument { index: usize, count: usize },
}

/// Whether the literal token `{index}` appears in the text.
pub fn contains_slot(text: &str, index: usize) -> bool {
    text.contains(&format!("{{{}}}", index))
}

/// Placeholder arity of a text: highest slot index present plus one, or 0.
pub fn arity(text: &str) -> usize {
    (0..SLOT_COUNT)
        .rev()
        .find(|&index| contains_slot(text, index))
        .map(|index| index + 1)
        .unwrap_or(0)
}

/// Turn the two-character sequence `\n` into a line break.
pub fn unescape_newlines(text: &str) -> String {
    text.replace("\\n", "\n")
}

/// Substitute positional arguments into a template.
pub fn substitute(template: &str, arguments: &[String]) -> Result<String, FormatError> {
    let chars: Vec<char> = template.chars().collect();
    let mut result = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                result.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                result.push('}');
                i += 2;
            }
            '}' => {
                return Err(FormatError::UnbalancedBrace {
                    brace: '}',
                    position: i,
                })
            }
            '{' => {
                let (token, next) = parse_token(&chars, i)?;
                let argument =
                    arguments
                        .get(token.index)
                        .ok_or(FormatError::MissingArgument {
                            index: token.index,
                            count: arguments.len(),
                        })?;
                push_aligned(&mut result, argument, token.width);
                i = next;
            }
            c => {
                result.push(c);
                i += 1;
            }
        }
    }

    Ok(result)
}

struct Token {
    index: usize,
    /// Positive pads on the left, negative pads on the right
    width: i64,
}

/// Parse the token opening at `start`. Returns the token and the position
/// just past its closing brace.
fn parse_token(chars: &[char], start: usize) -> Result<(Token, usize), FormatError> {
    let invalid = FormatError::InvalidToken { position: start };
    let mut i = start + 1;

    let index_start = i;
    while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
        i += 1;
    }
    if i == index_start {
        return Err(match chars.get(i) {
            None => FormatError::UnbalancedBrace {
                brace: '{',
                position: start,
            },
            Some(_) => invalid,
        });
    }
    let index: usize = chars[index_start..i]
        .iter()
        .collect::<String>()
        .parse()
        .map_err(|_| invalid.clone())?;

    skip_spaces(chars, &mut i);

    let mut width = 0i64;
    if chars.get(i) == Some(&',') {
        i += 1;
        skip_spaces(chars, &mut i);
        let negative = chars.get(i) == Some(&'-');
        if negative {
            i += 1;
        }
        let width_start = i;
        while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
            i += 1;
        }
        if i == width_start {
            return Err(invalid);
        }
        width = chars[width_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| invalid.clone())?;
        if width >= WIDTH_LIMIT {
            return Err(FormatError::WidthTooLarge { position: start });
        }
        if negative {
            width = -width;
        }
        skip_spaces(chars, &mut i);
    }

    if chars.get(i) == Some(&':') {
        i += 1;
        while let Some(&c) = chars.get(i) {
            match c {
                '}' => break,
                '{' => return Err(invalid),
                _ => i += 1,
            }
        }
    }

    match chars.get(i) {
        Some('}') => Ok((Token { index, width }, i + 1)),
        None => Err(FormatError::UnbalancedBrace {
            brace: '{',
            position: start,
        }),
        Some(_) => Err(invalid),
    }
}

fn skip_spaces(chars: &[char], i: &mut usize) {
    while chars.get(*i) == Some(&' ') {
        *i += 1;
    }
}

fn push_aligned(result: &mut String, argument: &str, width: i64) {
    let len = argument.chars().count();
    let pad = (width.unsigned_abs() as usize).saturating_sub(len);

    if width > 0 {
        result.extend(std::iter::repeat(' ').take(pad));
        result.push_str(argument);
    } else {
        result.push_str(argument);
        result.extend(std::iter::repeat(' ').take(pad));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    // ==================== Slot Scanning Tests ====================

    #[test]
    fn test_arity_none() {
        assert_eq!(arity("No placeholders here"), 0);
    }

    #[test]
    fn test_arity_uses_highest_index() {
        assert_eq!(arity("{0} and {1}"), 2);
        assert_eq!(arity("only {2}"), 3);
        assert_eq!(arity("{9}"), 10);
    }

    #[test]
    fn test_arity_ignores_slots_past_nine() {
        assert_eq!(arity("{10}"), 0);
        assert_eq!(arity("{0}{10}"), 1);
    }

    #[test]
    fn test_contains_slot_is_literal() {
        assert!(contains_slot("Hi {0}", 0));
        assert!(!contains_slot("Hi {0,5}", 0));
        assert!(!contains_slot("Hi 0", 0));
    }

    #[test]
    fn test_unescape_newlines() {
        assert_eq!(unescape_newlines("line1\\nline2"), "line1\nline2");
        assert_eq!(unescape_newlines("no escapes"), "no escapes");
    }

    // ==================== Substitution Tests ====================

    #[test]
    fn test_substitute_positional() {
        let result = substitute("{0} sent {1} to {0}", &args(&["Ann", "a file"])).unwrap();
        assert_eq!(result, "Ann sent a file to Ann");
    }

    #[test]
    fn test_substitute_out_of_order() {
        let result = substitute("{1}, {0}", &args(&["world", "Hello"])).unwrap();
        assert_eq!(result, "Hello, world");
    }

    #[test]
    fn test_substitute_escaped_braces() {
        let result = substitute("{{literal}} {0}", &args(&["x"])).unwrap();
        assert_eq!(result, "{literal} x");
    }

    #[test]
    fn test_substitute_extra_arguments_are_ignored() {
        let result = substitute("Hi {0}", &args(&["Ann", "unused"])).unwrap();
        assert_eq!(result, "Hi Ann");
    }

    #[test]
    fn test_substitute_missing_argument() {
        let err = substitute("{0} and {1}", &args(&["only one"])).unwrap_err();
        assert_eq!(err, FormatError::MissingArgument { index: 1, count: 1 });
    }

    #[test]
    fn test_substitute_alignment() {
        assert_eq!(substitute("[{0,5}]", &args(&["ab"])).unwrap(), "[   ab]");
        assert_eq!(substitute("[{0,-5}]", &args(&["ab"])).unwrap(), "[ab   ]");
        assert_eq!(substitute("[{0,1}]", &args(&["abc"])).unwrap(), "[abc]");
    }

    #[test]
    fn test_substitute_rejects_huge_width() {
        let err = substitute("Hi {0,999999999999999}", &args(&["Ann"])).unwrap_err();
        assert_eq!(err, FormatError::WidthTooLarge { position: 3 });

        let err = substitute("Hi {0,-1000000}", &args(&["Ann"])).unwrap_err();
        assert!(matches!(err, FormatError::WidthTooLarge { .. }));

        let padded = substitute("{0,999999}", &args(&["x"])).unwrap();
        assert_eq!(padded.len(), 999_999);
    }

    #[test]
    fn test_substitute_format_spec_is_ignored() {
        assert_eq!(substitute("{0:N2}", &args(&["12"])).unwrap(), "12");
    }

    #[test]
    fn test_substitute_unbalanced_close() {
        let err = substitute("oops }", &[]).unwrap_err();
        assert!(matches!(err, FormatError::UnbalancedBrace { brace: '}', .. }));
    }

    #[test]
    fn test_substitute_unbalanced_open() {
        let err = substitute("oops {0", &args(&["x"])).unwrap_err();
        assert!(matches!(err, FormatError::UnbalancedBrace { brace: '{', .. }));
    }

    #[test]
    fn test_substitute_non_numeric_token() {
        let err = substitute("Hello {name}", &args(&["x"])).unwrap_err();
        assert!(matches!(err, FormatError::InvalidToken { position: 6 }));
    }

    #[test]
    fn test_substitute_multibyte_text() {
        let result = substitute("¡Hola, {0}! 👋", &args(&["Niño"])).unwrap();
        assert_eq!(result, "¡Hola, Niño! 👋");
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_text_without_braces_is_unchanged(text in "[^{}]*") {
            prop_assert_eq!(substitute(&text, &[]).unwrap(), text);
        }

        #[test]
        fn prop_arity_matches_highest_slot(slots in proptest::collection::btree_set(0usize..10, 0..5)) {
            let text: String = slots.iter().map(|i| format!("x{{{}}}", i)).collect();
            let expected = slots.iter().max().map(|m| m + 1).unwrap_or(0);
            prop_assert_eq!(arity(&text), expected);
        }

        #[test]
        fn prop_enough_arguments_always_substitute(slots in proptest::collection::vec(0usize..10, 0..6)) {
            let text: String = slots.iter().map(|i| format!("<{{{}}}>", i)).collect();
            let arguments: Vec<String> = (0..10).map(|i| format!("a{}", i)).collect();
            let result = substitute(&text, &arguments).unwrap();
            prop_assert!(!result.contains('{'), "result still contains '{{': {}", result);
        }
    }
}
