// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cookie rules and their ordering

use log::trace;
use std::fmt::Display;

use crate::matcher::matches;

/// The rule name applying to all cookies not matched by a named rule
pub const WILDCARD: &str = "*";

/// A single cookie rule: either a cookie name or the wildcard [`WILDCARD`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRule {
    name: String,
}

impl CookieRule {
    /// Creates a new rule. The name should not be empty.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The cookie name as configured
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether this is the wildcard rule
    pub fn is_wildcard(&self) -> bool {
        self.name == WILDCARD
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl Display for CookieRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        if self.is_wildcard() {
            write!(f, "wildcard rule")
        } else {
            write!(f, "rule for cookie {}", self.name)
        }
    }
}

/// The error type returned by [`RuleSet::add_rule`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRuleError {
    name: String,
}

impl DuplicateRuleError {
    /// The rejected cookie name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for DuplicateRuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "Cookie {} has already been configured", self.name)
    }
}

impl std::error::Error for DuplicateRuleError {}

/// Moves the wildcard rule behind all named rules.
///
/// Named rules keep their relative order, applying this to an already normalized list changes
/// nothing.
pub fn normalize(rules: Vec<CookieRule>) -> Vec<CookieRule> {
    let (wildcards, mut named): (Vec<_>, Vec<_>) =
        rules.into_iter().partition(CookieRule::is_wildcard);
    named.extend(wildcards);
    named
}

/// Ordered list of cookie rules configured for a scope.
///
/// Names are unique when compared case-insensitively, the wildcard rule can occur once and is
/// always the last entry.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<CookieRule>,
}

impl RuleSet {
    /// Creates an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rule set from a list of names, in the order given.
    pub fn from_names<I>(names: I) -> Result<Self, DuplicateRuleError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut rule_set = Self::new();
        for name in names {
            rule_set.add_rule(name.as_ref())?;
        }
        Ok(rule_set)
    }

    /// Appends a rule for the given cookie name or the wildcard.
    ///
    /// Fails if a rule with the same name (compared case-insensitively) exists already.
    pub fn add_rule(&mut self, name: &str) -> Result<(), DuplicateRuleError> {
        let rule = CookieRule::new(name);
        if self.rules.iter().any(|existing| existing.conflicts_with(&rule)) {
            return Err(DuplicateRuleError {
                name: name.to_owned(),
            });
        }

        let mut rules = std::mem::take(&mut self.rules);
        rules.push(rule);
        self.rules = normalize(rules);
        trace!("Rules after adding {name}: {:?}", self.rules);
        Ok(())
    }

    /// The rules in evaluation order
    pub fn rules(&self) -> &[CookieRule] {
        &self.rules
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Checks whether there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first rule applying to a `Set-Cookie` header value.
    ///
    /// Named rules are tried in order, the wildcard rule is only reached if none of them matched.
    pub fn find_match(&self, value: &[u8]) -> Option<&CookieRule> {
        self.rules.iter().find(|rule| matches(rule, value))
    }
}
