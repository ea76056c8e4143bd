//! Command prefix parsing.
//!
//! Splits a shell command on `&&`, `||`, `;`, `|`, `&` and newlines (outside
//! quotes) and reduces each part to its prefix: `git status`, `npm install`,
//! or a bare `ls` for single-word commands.

use regex::Regex;
use std::sync::LazyLock;

use super::safe_commands::{NESTED_SUBCOMMAND_TOOLS, READ_ONLY_COMMANDS, SINGLE_WORD_COMMANDS};

/// Single-letter flags like -c, -C, -v whose next word is usually a value.
static SINGLE_LETTER_FLAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-[a-zA-Z]$").unwrap());

/// Leading `NAME=value` assignments.
static ENV_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*=").unwrap());

/// Constructs that can write or run arbitrary code regardless of the prefix.
static SIDE_EFFECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\(|`|>|<\(|\bexec\b|-exec\b|--output\b|-delete\b").unwrap());

/// Parse a shell command into its command prefixes.
///
/// `git status && npm test` gives `["git status", "npm test"]`.
pub fn parse_command_prefixes(command: &str) -> Vec<String> {
    split_on_separators(command)
        .into_iter()
        .filter_map(extract_prefix)
        .collect()
}

/// Whether every part of `command` only reads state.
///
/// Empty commands, redirections and command substitution are never
/// read-only.
pub fn is_read_only(command: &str) -> bool {
    if SIDE_EFFECT.is_match(command) {
        return false;
    }
    let prefixes = parse_command_prefixes(command);
    !prefixes.is_empty() && prefixes.iter().all(|p| READ_ONLY_COMMANDS.contains(p.as_str()))
}

/// Split on unquoted separators.
fn split_on_separators(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == b'\\' && q == b'"' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'\\' => i += 1,
                b'\'' | b'"' => quote = Some(c),
                b'&' | b'|' | b';' | b'\n' => {
                    parts.push(&command[start..i]);
                    // && and || are two bytes wide.
                    if (c == b'&' || c == b'|') && bytes.get(i + 1) == Some(&c) {
                        i += 1;
                    }
                    start = i + 1;
                }
                _ => {}
            },
        }
        i += 1;
    }
    if start < command.len() {
        parts.push(&command[start..]);
    }
    parts
}

fn extract_prefix(part: &str) -> Option<String> {
    let words: Vec<&str> = part
        .split_whitespace()
        .skip_while(|w| ENV_ASSIGNMENT.is_match(w))
        .collect();
    let (&first, rest) = words.split_first()?;
    // Strip a path so /usr/bin/git and git compare equal.
    let first = first.rsplit('/').next().unwrap_or(first);

    if SINGLE_WORD_COMMANDS.contains(first) {
        return Some(first.to_string());
    }

    let mut positional = positional_words(rest);
    let Some(sub) = positional.next() else {
        return Some(first.to_string());
    };
    if NESTED_SUBCOMMAND_TOOLS.contains(first) {
        if let Some(action) = positional.next() {
            return Some(format!("{first} {sub} {action}"));
        }
    }
    Some(format!("{first} {sub}"))
}

/// Non-flag words, skipping the value after a single-letter flag.
fn positional_words<'a>(words: &'a [&'a str]) -> impl Iterator<Item = &'a str> + 'a {
    let mut i = 0;
    std::iter::from_fn(move || {
        while i < words.len() {
            let word = words[i];
            i += 1;
            if !word.starts_with('-') {
                return Some(word);
            }
            if SINGLE_LETTER_FLAG.is_match(word)
                && words.get(i).is_some_and(|next| !next.starts_with('-'))
            {
                i += 1;
            }
        }
        None
    })
}
