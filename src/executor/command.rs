//! Command normalization
//!
//! A command arrives either as a pre-split argument list or as a single
//! command line. Command lines are split with POSIX shell-word rules
//! (single quotes, double quotes and backslash escapes are honored). A `#`
//! is an ordinary character, never the start of a comment.

use std::borrow::Cow;
use std::fmt;

use crate::error::ProcError;

/// A command to launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// Already split into program and arguments
    Args(Vec<String>),
    /// A command line to be split into words
    Line(String),
}

impl CommandSpec {
    /// Produce the argument vector for process launch.
    ///
    /// Pre-split commands are returned unchanged.
    ///
    /// # Errors
    /// * `ProcError::Tokenize` - If a command line has unbalanced quoting
    pub fn normalize(&self) -> Result<Vec<String>, ProcError> {
        match self {
            CommandSpec::Args(args) => Ok(args.clone()),
            CommandSpec::Line(line) => split_line(line).ok_or_else(|| ProcError::Tokenize {
                command: line.clone(),
            }),
        }
    }

    /// Render the command for logs and error messages
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Line(line) => line.clone(),
            CommandSpec::Args(args) => join_args(args),
        }
    }
}

/// Split a command line into words; None on unbalanced quoting
pub(crate) fn split_line(line: &str) -> Option<Vec<String>> {
    shlex::split(&escape_word_hashes(line))
}

/// Backslash-escape each `#` that starts an unquoted word.
///
/// `shlex` drops such a word and the rest of the line as a comment.
fn escape_word_hashes(line: &str) -> Cow<'_, str> {
    if !line.contains('#') {
        return Cow::Borrowed(line);
    }

    let mut out = String::with_capacity(line.len() + 4);
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut word_start = true;

    for ch in line.chars() {
        if escaped {
            escaped = false;
        } else {
            match (quote, ch) {
                (Some('\''), '\'') => quote = None,
                (Some('\''), _) => {}
                (Some(_), '\\') => escaped = true,
                (Some(_), '"') => quote = None,
                (Some(_), _) => {}
                (None, '\\') => escaped = true,
                (None, '\'' | '"') => quote = Some(ch),
                (None, '#') if word_start => out.push('\\'),
                (None, _) => {}
            }
        }

        out.push(ch);
        word_start = quote.is_none() && !escaped && matches!(ch, ' ' | '\t' | '\n');
    }

    Cow::Owned(out)
}

/// Quote each argument as needed and join with spaces
pub fn join_args<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            shlex::try_quote(arg)
                .map(|q| q.into_owned())
                .unwrap_or_else(|_| arg.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        CommandSpec::Line(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        CommandSpec::Line(line)
    }
}

impl From<Vec<String>> for CommandSpec {
    fn from(args: Vec<String>) -> Self {
        CommandSpec::Args(args)
    }
}

impl From<Vec<&str>> for CommandSpec {
    fn from(args: Vec<&str>) -> Self {
        CommandSpec::Args(args.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for CommandSpec {
    fn from(args: &[&str]) -> Self {
        CommandSpec::Args(args.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandSpec {
    fn from(args: [&str; N]) -> Self {
        CommandSpec::Args(args.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_simple_line() {
        let cmd = CommandSpec::from("git status --short");
        assert_eq!(cmd.normalize().unwrap(), vec!["git", "status", "--short"]);
    }

    #[test]
    fn test_normalize_keeps_quoted_argument() {
        let cmd = CommandSpec::from(r#"git commit -m "fix the build" --author 'A B'"#);
        assert_eq!(
            cmd.normalize().unwrap(),
            vec!["git", "commit", "-m", "fix the build", "--author", "A B"]
        );
    }

    #[test]
    fn test_normalize_backslash_escape() {
        let cmd = CommandSpec::from(r"ls my\ dir");
        assert_eq!(cmd.normalize().unwrap(), vec!["ls", "my dir"]);
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        let cmd = CommandSpec::from("  echo   a\tb  ");
        assert_eq!(cmd.normalize().unwrap(), vec!["echo", "a", "b"]);
    }

    #[test]
    fn test_normalize_hash_is_literal() {
        let cmd = CommandSpec::from("echo #foo bar");
        assert_eq!(cmd.normalize().unwrap(), vec!["echo", "#foo", "bar"]);
    }

    #[test]
    fn test_normalize_hash_in_words_and_quotes() {
        let cmd = CommandSpec::from(r##"echo a#b '#c d' "#e" \#f #"##);
        assert_eq!(
            cmd.normalize().unwrap(),
            vec!["echo", "a#b", "#c d", "#e", "#f", "#"]
        );
    }

    #[test]
    fn test_normalize_hash_after_quoted_whitespace() {
        let cmd = CommandSpec::from(r"printf '%s\n' 'x #y' #z");
        assert_eq!(
            cmd.normalize().unwrap(),
            vec!["printf", "%s\\n", "x #y", "#z"]
        );
    }

    #[test]
    fn test_escape_word_hashes_untouched_without_hash() {
        assert!(matches!(escape_word_hashes("echo hi"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_normalize_args_is_identity() {
        let args = vec![
            "echo".to_string(),
            "it's \"quoted\"".to_string(),
            "  spaced  ".to_string(),
            String::new(),
        ];
        let cmd = CommandSpec::from(args.clone());
        assert_eq!(cmd.normalize().unwrap(), args);
    }

    #[test]
    fn test_normalize_unterminated_quote() {
        let cmd = CommandSpec::from("echo 'unterminated");
        match cmd.normalize() {
            Err(ProcError::Tokenize { command }) => {
                assert_eq!(command, "echo 'unterminated");
            }
            other => panic!("Expected Tokenize error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_empty_line() {
        let cmd = CommandSpec::from("");
        assert!(cmd.normalize().unwrap().is_empty());
    }

    #[test]
    fn test_display_quotes_args() {
        let cmd = CommandSpec::from(["echo", "hello world"]);
        let rendered = cmd.to_string();
        assert!(rendered.starts_with("echo "));
        assert_eq!(
            CommandSpec::from(rendered).normalize().unwrap(),
            vec!["echo", "hello world"]
        );
    }

    #[test]
    fn test_display_line_verbatim() {
        let cmd = CommandSpec::from("echo   'a b'");
        assert_eq!(cmd.to_string(), "echo   'a b'");
    }
}
