//! Command-shaped message helpers.
//!
//! A message is "command shaped" when it starts with the command prefix
//! (`!` unless configured otherwise) directly followed by a word, e.g.
//! `!echo hi`. The router uses this to decide whether an unmatched message
//! deserves a "not understood" reply.

/// The default command prefix.
pub const DEFAULT_PREFIX: &str = "!";

/// Whether `body` looks like a command invocation.
///
/// ```rust,ignore
/// assert!(looks_like_command("!echo hi", "!"));
/// assert!(!looks_like_command("! echo", "!"));
/// assert!(!looks_like_command("hello", "!"));
/// ```
pub fn looks_like_command(body: &str, prefix: &str) -> bool {
    command_name(body, prefix).is_some()
}

/// The command word without its prefix, e.g. `echo` for `!echo hi`.
pub fn command_name<'a>(body: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let rest = body.trim_start().strip_prefix(prefix)?;
    let word = rest.split_whitespace().next()?;
    // "!echo" is a command, "! echo" and "!!!" are not.
    if rest.starts_with(word) && word.chars().next().is_some_and(char::is_alphanumeric) {
        Some(word)
    } else {
        None
    }
}

/// Simple shell-like argument splitting.
///
/// Handles:
/// - Whitespace-separated arguments
/// - Quoted strings (single and double quotes)
/// - Backslash escapes within double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;
    let mut quoted = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
                quoted = true;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
                quoted = true;
            }
            c if c.is_whitespace() && !in_single_quote && !in_double_quote => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }

    args
}
