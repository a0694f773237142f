//! Workspace `.env` parsing.
//!
//! Plugin subprocesses inherit the workspace `.env` merged under the
//! manager's own environment (inherited process env wins for overlapping
//! keys). The parser is deliberately forgiving: unreadable files and
//! malformed lines yield nothing rather than errors.

use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

/// Parse `.env` content into key/value pairs.
///
/// Accepted lines: optional `export ` prefix, `KEY=VALUE` with `KEY`
/// matching `[A-Za-z_][A-Za-z0-9_]*`. Values quoted with `"` or `'` are
/// unquoted verbatim; unquoted values lose a trailing ` #comment`. Empty
/// lines and lines starting with `#` are skipped, as is anything that
/// does not parse.
pub fn parse_env_file(content: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").unwrap_or(line).trim_start();
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if !is_valid_key(key) {
            continue;
        }

        let value = value.trim();
        let value = if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value[1..value.len() - 1].to_string()
        } else {
            match value.find(" #") {
                Some(idx) => value[..idx].trim_end().to_string(),
                None => value.to_string(),
            }
        };

        vars.insert(key.to_string(), value);
    }

    vars
}

/// Read and parse a `.env` file. Read errors (including an absent file)
/// are tolerated and yield an empty map.
pub fn load_env_file(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_env_file(&content),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no .env file loaded");
            HashMap::new()
        }
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_pairs() {
        let vars = parse_env_file("FOO=bar\nBAZ=qux");
        assert_eq!(vars["FOO"], "bar");
        assert_eq!(vars["BAZ"], "qux");
    }

    #[test]
    fn export_prefix_is_stripped() {
        let vars = parse_env_file("export TOKEN=abc123");
        assert_eq!(vars["TOKEN"], "abc123");
    }

    #[test]
    fn quoted_values_are_unquoted_verbatim() {
        let vars = parse_env_file("A=\"hello # not a comment\"\nB='single # quoted'");
        assert_eq!(vars["A"], "hello # not a comment");
        assert_eq!(vars["B"], "single # quoted");
    }

    #[test]
    fn unquoted_trailing_comment_is_stripped() {
        let vars = parse_env_file("KEY=value # a comment");
        assert_eq!(vars["KEY"], "value");
    }

    #[test]
    fn comments_and_blanks_are_skipped() {
        let vars = parse_env_file("# header\n\n  \nKEY=v\n# trailer");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["KEY"], "v");
    }

    #[test]
    fn invalid_keys_are_skipped() {
        let vars = parse_env_file("1BAD=x\nBAD KEY=y\nGOOD_1=z\n-=w\nnoequals");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars["GOOD_1"], "z");
    }

    #[test]
    fn empty_value_is_kept() {
        let vars = parse_env_file("EMPTY=");
        assert_eq!(vars["EMPTY"], "");
    }

    #[test]
    fn value_with_equals_is_preserved() {
        let vars = parse_env_file("URL=http://x?a=1&b=2");
        assert_eq!(vars["URL"], "http://x?a=1&b=2");
    }

    #[test]
    fn missing_file_yields_empty_map() {
        let vars = load_env_file(Path::new("/no/such/dir/.env"));
        assert!(vars.is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "export A=1\nB=\"two\"\n").unwrap();
        let vars = load_env_file(&path);
        assert_eq!(vars["A"], "1");
        assert_eq!(vars["B"], "two");
    }
}
