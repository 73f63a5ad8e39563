//! Access rules over dotted field paths.
//!
//! # Grammar
//! A rule is a list of entries separated by commas and/or whitespace. Each
//! entry is a dotted glob, optionally prefixed with `+` (allow, the default)
//! or `-` (deny). Entries are tried in order and the first one that covers the
//! path decides; a path no entry covers is denied.
//!
//! Within a glob, a `*` segment matches exactly one path segment and a `**`
//! segment matches any number of remaining segments. A glob covers a path when
//! it matches the path itself or any ancestor object of it, so `wifi.*` covers
//! every field below `wifi.ap`. The rule consisting of `*` alone is
//! unrestricted; the empty rule denies everything.
//!
//! File rules ([`is_file_allowed`]) share the entry grammar and also accept
//! `|` as a separator. Their globs match a whole file name: `*` spans any run
//! of characters, dots included, and `?` matches one character.

/// Rule string that permits every field, including system-only ones.
pub const UNRESTRICTED: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Allow,
    Deny,
}

/// Whether `rule` permits writing the field at `path`.
#[must_use]
pub fn is_allowed(rule: &str, path: &str) -> bool {
    if is_unrestricted(rule) {
        return true;
    }
    for entry in entries(rule) {
        let (verdict, glob) = split_verdict(entry);
        if glob.is_empty() {
            continue;
        }
        if covers(glob, path) {
            return verdict == Verdict::Allow;
        }
    }
    false
}

/// Whether `rule` permits the file called `name`.
#[must_use]
pub fn is_file_allowed(rule: &str, name: &str) -> bool {
    if is_unrestricted(rule) {
        return true;
    }
    let name: Vec<char> = name.chars().collect();
    for entry in rule.split(|c: char| c == ',' || c == '|' || c.is_whitespace()) {
        let (verdict, glob) = split_verdict(entry);
        if glob.is_empty() {
            continue;
        }
        let pattern: Vec<char> = glob.chars().collect();
        if file_glob_matches(&pattern, &name) {
            return verdict == Verdict::Allow;
        }
    }
    false
}

/// Whether `rule` is the unrestricted token.
#[must_use]
pub fn is_unrestricted(rule: &str) -> bool {
    rule.trim() == UNRESTRICTED
}

fn entries(rule: &str) -> impl Iterator<Item = &str> {
    rule.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|entry| !entry.is_empty())
}

fn split_verdict(entry: &str) -> (Verdict, &str) {
    if let Some(glob) = entry.strip_prefix('-') {
        (Verdict::Deny, glob)
    } else if let Some(glob) = entry.strip_prefix('+') {
        (Verdict::Allow, glob)
    } else {
        (Verdict::Allow, entry)
    }
}

fn covers(glob: &str, path: &str) -> bool {
    let pattern: Vec<&str> = glob.split('.').collect();
    let segments: Vec<&str> = path.split('.').collect();
    (1..=segments.len()).any(|len| matches_segments(&pattern, &segments[..len]))
}

fn matches_segments(pattern: &[&str], segments: &[&str]) -> bool {
    match pattern.split_first() {
        None => segments.is_empty(),
        Some((&"**", [])) => true,
        Some((&"**", rest)) => {
            (0..=segments.len()).any(|skip| matches_segments(rest, &segments[skip..]))
        }
        Some((head, rest)) => segments.split_first().is_some_and(|(segment, tail)| {
            segment_matches(head, segment) && matches_segments(rest, tail)
        }),
    }
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    pattern == "*" || pattern == segment
}

fn file_glob_matches(pattern: &[char], name: &[char]) -> bool {
    match pattern.split_first() {
        None => name.is_empty(),
        Some(('*', rest)) => {
            let rest_start = rest.iter().take_while(|c| **c == '*').count();
            let rest = &rest[rest_start..];
            (0..=name.len()).any(|skip| file_glob_matches(rest, &name[skip..]))
        }
        Some(('?', rest)) => name
            .split_first()
            .is_some_and(|(_, tail)| file_glob_matches(rest, tail)),
        Some((head, rest)) => name
            .split_first()
            .is_some_and(|(c, tail)| c == head && file_glob_matches(rest, tail)),
    }
}
