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

//! Resolving the rule set applying to each configuration scope

use filter_utils::pingora::{Error, ErrorType};
use log::debug;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use crate::configuration::{ScopeConf, UnsecureCookieConf};
use crate::rules::RuleSet;

/// Rule set applying to a scope, `None` if the filter is disabled there
pub(crate) type EffectiveRules = Option<Arc<RuleSet>>;

/// Rules declared in a scope replace the inherited ones, otherwise the parent’s rule set is
/// shared.
pub(crate) fn resolve_effective_ruleset(
    declared: EffectiveRules,
    parent: &EffectiveRules,
) -> EffectiveRules {
    declared.or_else(|| parent.clone())
}

fn build_rule_set(names: &[String], scope: &impl Display) -> Result<EffectiveRules, Box<Error>> {
    if names.is_empty() {
        return Ok(None);
    }

    let mut rule_set = RuleSet::new();
    for name in names {
        if name.is_empty() {
            return Err(Error::explain(
                ErrorType::InternalError,
                format!("empty cookie name in unsecure_cookie setting of {scope}"),
            ));
        }
        rule_set.add_rule(name).map_err(|err| {
            Error::because(
                ErrorType::InternalError,
                format!("invalid unsecure_cookie setting of {scope}"),
                err,
            )
        })?;
    }
    Ok(Some(Arc::new(rule_set)))
}

fn log_scope(scope: &impl Display, rules: &EffectiveRules) {
    if let Some(rule_set) = rules {
        let names: Vec<_> = rule_set.rules().iter().map(|rule| rule.name()).collect();
        debug!("unsecure_cookie filter is enabled for {scope}: {names:?}");
    } else {
        debug!("unsecure_cookie filter is disabled for {scope}");
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> + '_ {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Removes the port from a host name like `localhost:8080` or `[::1]:8080`.
fn strip_port(host: &str) -> Option<&str> {
    let (host, port) = host.rsplit_once(':')?;
    if !port.is_empty() && port.bytes().all(|c| c.is_ascii_digit()) {
        Some(host)
    } else {
        None
    }
}

#[derive(Debug)]
struct Location {
    segments: Vec<String>,
    rules: EffectiveRules,
}

impl Location {
    fn contains(&self, path: &str) -> bool {
        let mut path = path_segments(path);
        self.segments
            .iter()
            .all(|segment| path.next() == Some(segment.as_str()))
    }
}

#[derive(Debug)]
struct HostScope {
    rules: EffectiveRules,
    // Sorted by specificity, most specific first
    locations: Vec<Location>,
}

impl HostScope {
    fn lookup(&self, path: &str) -> &EffectiveRules {
        self.locations
            .iter()
            .find(|location| location.contains(path))
            .map_or(&self.rules, |location| &location.rules)
    }
}

struct ScopeName<'a> {
    host: &'a str,
    path: &'a str,
}

impl Display for ScopeName<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        if self.path.is_empty() {
            write!(f, "host {}", self.host)
        } else {
            write!(f, "location {}{}", self.host, self.path)
        }
    }
}

/// Effective rule sets of all configured scopes, resolved once when the configuration is loaded
#[derive(Debug)]
pub(crate) struct ScopeTable {
    top_level: EffectiveRules,
    hosts: HashMap<String, HostScope>,
}

impl ScopeTable {
    pub(crate) fn from_conf(conf: &UnsecureCookieConf) -> Result<Self, Box<Error>> {
        let top_level = build_rule_set(&conf.unsecure_cookie, &"top level")?;
        log_scope(&"top level", &top_level);

        let mut hosts = HashMap::new();
        for (host, host_conf) in &conf.unsecure_cookie_hosts {
            let name = ScopeName { host, path: "" };
            let rules = resolve_effective_ruleset(
                build_rule_set(&host_conf.unsecure_cookie, &name)?,
                &top_level,
            );
            log_scope(&name, &rules);

            let mut locations = Vec::new();
            collect_locations(host, &[], host_conf, &rules, &mut locations)?;
            // Stable sort, more path segments means more specific
            locations.sort_by(|a, b| b.segments.len().cmp(&a.segments.len()));

            let key = host.to_ascii_lowercase();
            if hosts.contains_key(&key) {
                return Err(Error::explain(
                    ErrorType::InternalError,
                    format!("host {host} is configured multiple times in unsecure_cookie_hosts"),
                ));
            }
            hosts.insert(key, HostScope { rules, locations });
        }

        Ok(Self { top_level, hosts })
    }

    /// Determines the rule set for a request to the given host and path.
    pub(crate) fn lookup(&self, host: Option<&str>, path: &str) -> Option<&Arc<RuleSet>> {
        let host_scope = host.and_then(|host| {
            let host = host.to_ascii_lowercase();
            self.hosts
                .get(&host)
                .or_else(|| strip_port(&host).and_then(|host| self.hosts.get(host)))
        });

        if let Some(host_scope) = host_scope {
            host_scope.lookup(path).as_ref()
        } else {
            self.top_level.as_ref()
        }
    }
}

fn collect_locations(
    host: &str,
    parent_segments: &[String],
    parent: &ScopeConf,
    parent_rules: &EffectiveRules,
    result: &mut Vec<Location>,
) -> Result<(), Box<Error>> {
    for (path, conf) in &parent.locations {
        let name = ScopeName { host, path };
        if !path.starts_with('/') {
            return Err(Error::explain(
                ErrorType::InternalError,
                format!("{name}: location path has to start with a slash"),
            ));
        }

        let segments: Vec<String> = path_segments(path).map(|s| s.to_owned()).collect();
        if !segments.starts_with(parent_segments) || segments.len() == parent_segments.len() {
            return Err(Error::explain(
                ErrorType::InternalError,
                format!("{name}: location is not inside its enclosing scope"),
            ));
        }
        if result.iter().any(|location| location.segments == segments) {
            return Err(Error::explain(
                ErrorType::InternalError,
                format!("{name}: location is configured multiple times"),
            ));
        }

        let rules = resolve_effective_ruleset(
            build_rule_set(&conf.unsecure_cookie, &name)?,
            parent_rules,
        );
        log_scope(&name, &rules);

        collect_locations(host, &segments, conf, &rules, result)?;
        result.push(Location { segments, rules });
    }
    Ok(())
}
