//! Matchers, matcher combinators and closure throttlers
//!
//! Combinators are explicit types rather than overloaded operators:
//! `Intersect` is AND, `Union` is OR and `Inverse` is NOT. All of them
//! short-circuit and propagate the first predicate error.

use crate::error::ExtractorError;
use regex::{Regex, RegexBuilder};
use sieve_domain::traits::{Matcher, Throttler};
use sieve_domain::{MentionRecord, PredicateError, TemporaryContext};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

type MatchFn = dyn Fn(&TemporaryContext) -> Result<bool, PredicateError> + Send + Sync;
type ThrottleFn = dyn Fn(&[&MentionRecord]) -> Result<bool, PredicateError> + Send + Sync;

/// Matcher backed by a closure
pub struct LambdaMatcher {
    name: String,
    f: Box<MatchFn>,
}

impl LambdaMatcher {
    /// Wrap an infallible predicate
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TemporaryContext) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(move |c: &TemporaryContext| -> Result<bool, PredicateError> {
                Ok(f(c))
            }),
        }
    }

    /// Wrap a predicate that may fail
    pub fn fallible<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&TemporaryContext) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl fmt::Debug for LambdaMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaMatcher").field("name", &self.name).finish()
    }
}

impl Matcher for LambdaMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        (self.f)(candidate)
    }
}

/// Matches when a regular expression covers the whole text
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    name: String,
    regex: Regex,
}

impl RegexMatcher {
    /// Case-sensitive full match of `pattern`
    pub fn new(pattern: &str) -> Result<Self, ExtractorError> {
        Self::build(pattern, false)
    }

    /// Case-insensitive full match of `pattern`
    pub fn ignore_case(pattern: &str) -> Result<Self, ExtractorError> {
        Self::build(pattern, true)
    }

    fn build(pattern: &str, ignore_case: bool) -> Result<Self, ExtractorError> {
        let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
            .case_insensitive(ignore_case)
            .build()
            .map_err(|e| ExtractorError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            name: format!("regex({})", pattern),
            regex,
        })
    }

    /// Use `name` in logs and failure reports
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Matcher for RegexMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        Ok(self.regex.is_match(candidate.text()))
    }
}

/// Matches texts found in a phrase set
#[derive(Debug, Clone)]
pub struct DictionaryMatcher {
    name: String,
    phrases: HashSet<String>,
    ignore_case: bool,
}

impl DictionaryMatcher {
    /// Match any of `phrases`, optionally ignoring case
    pub fn new<I, S>(name: impl Into<String>, phrases: I, ignore_case: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| normalize(p.as_ref(), ignore_case))
            .collect();
        Self {
            name: name.into(),
            phrases,
            ignore_case,
        }
    }

    /// Number of distinct phrases
    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }
}

fn normalize(text: &str, ignore_case: bool) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if ignore_case {
        collapsed.to_lowercase()
    } else {
        collapsed
    }
}

impl Matcher for DictionaryMatcher {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        Ok(self
            .phrases
            .contains(&normalize(candidate.text(), self.ignore_case)))
    }
}

/// Matches when every inner matcher matches
pub struct Intersect {
    name: String,
    matchers: Vec<Arc<dyn Matcher>>,
}

impl Intersect {
    /// AND of `matchers`; an empty list matches everything
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        let name = combined_name("intersect", &matchers);
        Self { name, matchers }
    }
}

impl Matcher for Intersect {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        for matcher in &self.matchers {
            if !matcher.matches(candidate)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Matches when any inner matcher matches
pub struct Union {
    name: String,
    matchers: Vec<Arc<dyn Matcher>>,
}

impl Union {
    /// OR of `matchers`; an empty list matches nothing
    pub fn new(matchers: Vec<Arc<dyn Matcher>>) -> Self {
        let name = combined_name("union", &matchers);
        Self { name, matchers }
    }
}

impl Matcher for Union {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        for matcher in &self.matchers {
            if matcher.matches(candidate)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Matches when the inner matcher does not
pub struct Inverse {
    name: String,
    matcher: Arc<dyn Matcher>,
}

impl Inverse {
    /// NOT of `matcher`
    pub fn new(matcher: Arc<dyn Matcher>) -> Self {
        Self {
            name: format!("not({})", matcher.name()),
            matcher,
        }
    }
}

impl Matcher for Inverse {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, candidate: &TemporaryContext) -> Result<bool, PredicateError> {
        Ok(!self.matcher.matches(candidate)?)
    }
}

fn combined_name(op: &str, matchers: &[Arc<dyn Matcher>]) -> String {
    let inner: Vec<&str> = matchers.iter().map(|m| m.name()).collect();
    format!("{}({})", op, inner.join(","))
}

/// Throttler backed by a closure over the mention tuple
pub struct LambdaThrottler {
    name: String,
    arity: Option<usize>,
    f: Box<ThrottleFn>,
}

impl LambdaThrottler {
    /// Wrap an infallible predicate
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[&MentionRecord]) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity: None,
            f: Box::new(move |m: &[&MentionRecord]| -> Result<bool, PredicateError> {
                Ok(f(m))
            }),
        }
    }

    /// Wrap a predicate that may fail
    pub fn fallible<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[&MentionRecord]) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity: None,
            f: Box::new(f),
        }
    }

    /// Declare the tuple length this throttler expects
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = Some(arity);
        self
    }
}

impl fmt::Debug for LambdaThrottler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaThrottler")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Throttler for LambdaThrottler {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept(&self, mentions: &[&MentionRecord]) -> Result<bool, PredicateError> {
        (self.f)(mentions)
    }

    fn arity(&self) -> Option<usize> {
        self.arity
    }
}
