//! Secret extraction from task text.
//!
//! A task may carry credentials as `{SECRET_NAME: "value"}`. The values are
//! pulled out before the task leaves the machine and handed to the program as
//! variables instead.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

pub const REDACTED: &str = "******";

static SECRET_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\{\s*(?P<var>[A-Za-z_]+)\s*:\s*(?P<value>"(?:[^"\\]|\\.)*")\s*\}"#).ok()
});

/// Return the redacted task and the secrets found in it.
pub fn extract_secrets(task: &str) -> (String, BTreeMap<String, String>) {
    let mut secrets = BTreeMap::new();
    let Some(pattern) = SECRET_PATTERN.as_ref() else {
        return (task.to_string(), secrets);
    };
    let redacted = pattern.replace_all(task, |caps: &Captures| {
        let var = &caps["var"];
        if !var.starts_with("SECRET") {
            return caps[0].to_string();
        }
        let quoted = &caps["value"];
        secrets.insert(var.to_string(), unescape(&quoted[1..quoted.len() - 1]));
        format!("{{{}: \"{}\"}}", var, REDACTED)
    });
    (redacted.into_owned(), secrets)
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
