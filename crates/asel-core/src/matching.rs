#![forbid(unsafe_code)]

//! Standard completion semantics over a candidate list.
//!
//! These are the semantics every built-in source applies once it has a
//! concrete list: prefix matching against the query text, filtered by the
//! channel's predicate.
//!
//! # Invariants
//!
//! 1. [`all_completions`] preserves candidate order and drops duplicates.
//! 2. [`try_completion`] never returns a prefix shorter than the query when
//!    anything matches.
//! 3. Everything here is pure: same input, same output.

use std::collections::HashSet;

use crate::channel::QueryChannel;
use crate::metadata::Metadata;
use crate::source::{CompletionAction, CompletionResult, TryCompletion};

/// Knobs for matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare characters case-insensitively.
    pub ignore_case: bool,
}

impl MatchOptions {
    /// Case-insensitive matching.
    pub fn ignore_case() -> Self {
        Self { ignore_case: true }
    }
}

/// How a candidate relates to the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    /// Query is not a prefix of the candidate.
    NoMatch,
    /// Candidate starts with the query.
    Prefix,
    /// Candidate equals the query.
    Exact,
}

fn chars_eq(a: char, b: char, options: MatchOptions) -> bool {
    a == b || (options.ignore_case && a.to_lowercase().eq(b.to_lowercase()))
}

/// Classify `candidate` against `text`.
pub fn match_kind(candidate: &str, text: &str, options: MatchOptions) -> MatchKind {
    if !options.ignore_case {
        return if candidate == text {
            MatchKind::Exact
        } else if candidate.starts_with(text) {
            MatchKind::Prefix
        } else {
            MatchKind::NoMatch
        };
    }

    let mut cand = candidate.chars();
    for q in text.chars() {
        match cand.next() {
            Some(c) if chars_eq(c, q, options) => {}
            _ => return MatchKind::NoMatch,
        }
    }
    if cand.next().is_none() {
        MatchKind::Exact
    } else {
        MatchKind::Prefix
    }
}

/// Every candidate that starts with `text` and passes the channel predicate.
pub fn all_completions(
    candidates: &[String],
    text: &str,
    channel: &QueryChannel,
    options: MatchOptions,
) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| match_kind(c, text, options) != MatchKind::NoMatch)
        .filter(|c| channel.accepts(c))
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect()
}

/// Longest prefix shared by all `matches`, taken from the first one.
fn common_prefix<'a>(matches: &[&'a str], options: MatchOptions) -> &'a str {
    let Some((first, rest)) = matches.split_first() else {
        return "";
    };
    let mut end = first.len();
    for other in rest {
        let shared = first
            .char_indices()
            .zip(other.chars())
            .take_while(|&((_, a), b)| chars_eq(a, b, options))
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8());
        end = end.min(shared);
    }
    &first[..end]
}

/// Complete `text` as far as every match agrees.
pub fn try_completion(
    candidates: &[String],
    text: &str,
    channel: &QueryChannel,
    options: MatchOptions,
) -> TryCompletion {
    let matches = all_completions(candidates, text, channel, options);
    match matches.as_slice() {
        [] => TryCompletion::NoMatch,
        [only] if match_kind(only, text, options) == MatchKind::Exact => TryCompletion::Exact,
        _ => {
            let refs: Vec<&str> = matches.iter().map(String::as_str).collect();
            let prefix = common_prefix(&refs, options);
            if prefix.chars().count() < text.chars().count() {
                TryCompletion::Prefix(text.to_string())
            } else {
                TryCompletion::Prefix(prefix.to_string())
            }
        }
    }
}

/// Whether `text` is itself one of the (predicate-passing) candidates.
pub fn test_completion(
    candidates: &[String],
    text: &str,
    channel: &QueryChannel,
    options: MatchOptions,
) -> bool {
    candidates
        .iter()
        .any(|c| match_kind(c, text, options) == MatchKind::Exact && channel.accepts(c))
}

/// Dispatch on `action`. `Metadata` yields empty metadata; sources answer
/// that themselves before reaching here.
pub fn complete_with_action(
    action: CompletionAction,
    candidates: &[String],
    text: &str,
    channel: &QueryChannel,
    options: MatchOptions,
) -> CompletionResult {
    match action {
        CompletionAction::Try => {
            CompletionResult::Try(try_completion(candidates, text, channel, options))
        }
        CompletionAction::All => {
            CompletionResult::All(all_completions(candidates, text, channel, options))
        }
        CompletionAction::Test => {
            CompletionResult::Test(test_completion(candidates, text, channel, options))
        }
        CompletionAction::Metadata => CompletionResult::Metadata(Metadata::default()),
    }
}
