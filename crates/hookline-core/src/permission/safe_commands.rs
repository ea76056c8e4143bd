//! Command vocabularies used by the policy's read-only matcher.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Subcommands that only read, per multi-word tool.
const READ_ONLY_SUBCOMMANDS: &[(&str, &[&str])] = &[
    (
        "git",
        &[
            "status", "diff", "log", "show", "branch", "remote", "rev-parse", "symbolic-ref",
            "ls-files", "ls-tree", "cat-file", "describe", "shortlog", "blame", "reflog", "grep",
        ],
    ),
    ("gh pr", &["list", "view", "status", "checks", "diff"]),
    ("gh issue", &["list", "view"]),
    ("gh repo", &["view"]),
    ("cargo", &["tree", "metadata"]),
    ("npm", &["ls", "view"]),
];

/// Single-word commands that only inspect files, text or the system.
const READ_ONLY_TOOLS: &[&str] = &[
    "ls", "cat", "head", "tail", "less", "pwd", "echo", "printf", "stat", "file", "tree", "du",
    "df", "wc", "grep", "egrep", "fgrep", "rg", "ag", "cut", "sort", "uniq", "diff", "comm",
    "basename", "dirname", "realpath", "readlink", "which", "whoami", "uname", "date", "true",
    "false",
];

/// Command prefixes that only read state.
///
/// A shell command is read-only when every chained part's prefix (as
/// produced by [`parse_command_prefixes`](super::parse_command_prefixes))
/// is in this set.
pub static READ_ONLY_COMMANDS: LazyLock<HashSet<String>> = LazyLock::new(|| {
    let multi_word = READ_ONLY_SUBCOMMANDS.iter().flat_map(|(tool, subcommands)| {
        subcommands.iter().map(move |sub| format!("{tool} {sub}"))
    });
    READ_ONLY_TOOLS
        .iter()
        .map(|cmd| cmd.to_string())
        .chain(multi_word)
        .collect()
});

/// Tools whose prefix takes two subcommand words (`gh pr view`).
pub static NESTED_SUBCOMMAND_TOOLS: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| ["gh"].into_iter().collect());

/// Commands whose prefix is the first word alone.
///
/// Everything else is treated as `command subcommand` (`git push`,
/// `npm install`) so subcommands can be told apart.
pub static SINGLE_WORD_COMMANDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Shell builtins
        "cd", "echo", "printf", "true", "false", "test", "exit", "export", "unset", "set",
        "alias", "type", "which", "command", "source", "eval", "pwd", "pushd", "popd",
        // Shell invocation
        "sh", "bash", "zsh", "fish",
        // Files
        "ls", "cat", "head", "tail", "less", "more", "tree", "du", "df", "mkdir", "rmdir",
        "rm", "cp", "mv", "ln", "touch", "chmod", "chown", "stat", "file", "find", "xargs",
        "basename", "dirname", "realpath", "readlink", "tar", "zip", "unzip", "dd",
        // Text
        "grep", "egrep", "fgrep", "rg", "ag", "ack", "sed", "awk", "cut", "paste", "sort",
        "uniq", "comm", "diff", "patch", "tr", "wc", "tee", "jq", "yq",
        // Processes and system
        "ps", "kill", "pkill", "sleep", "date", "uname", "whoami", "env", "sudo", "time",
        "timeout", "nohup",
        // Network
        "curl", "wget", "ssh", "scp", "rsync",
        // Interpreters and compilers
        "python", "python3", "node", "deno", "bun", "ruby", "perl", "php", "rustc", "make",
        "cmake", "gcc", "clang", "java",
    ]
    .into_iter()
    .collect()
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subcommands_are_joined_with_their_tool() {
        assert!(READ_ONLY_COMMANDS.contains("git status"));
        assert!(READ_ONLY_COMMANDS.contains("gh pr view"));
        assert!(READ_ONLY_COMMANDS.contains("cargo tree"));
        assert!(!READ_ONLY_COMMANDS.contains("git push"));
        assert!(!READ_ONLY_COMMANDS.contains("gh pr merge"));
    }

    #[test]
    fn destructive_single_words_are_not_read_only() {
        for cmd in ["rm", "mv", "dd", "sudo", "chmod"] {
            assert!(SINGLE_WORD_COMMANDS.contains(cmd));
            assert!(!READ_ONLY_COMMANDS.contains(cmd), "{cmd}");
        }
    }
}
