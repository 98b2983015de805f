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

//! Applying a rule set to the `Set-Cookie` headers of a response

use http::header::{HeaderMap, HeaderValue, SET_COOKIE};
use log::{debug, trace};
use std::borrow::Cow;

use crate::rules::RuleSet;
use crate::strip::{strip_secure, RewriteError};

/// Rewrites a single `Set-Cookie` header value.
///
/// The first rule matching the value decides, no other rules are considered afterwards. Returns
/// `None` if no rule applies or the value has no `Secure` attribute to remove.
pub fn rewrite_value(
    rule_set: &RuleSet,
    value: &HeaderValue,
) -> Result<Option<HeaderValue>, RewriteError> {
    let rule = if let Some(rule) = rule_set.find_match(value.as_bytes()) {
        rule
    } else {
        trace!("No unsecure_cookie rule applies to {value:?}");
        return Ok(None);
    };

    match strip_secure(value.as_bytes())? {
        Cow::Borrowed(_) => {
            trace!("Matched {rule} but {value:?} has no Secure attribute");
            Ok(None)
        }
        Cow::Owned(bytes) => {
            debug!("Removing Secure attribute, matched {rule}");
            let mut rewritten = HeaderValue::try_from(bytes)
                .map_err(|err| RewriteError::new("rewritten header value is invalid", err))?;
            rewritten.set_sensitive(value.is_sensitive());
            Ok(Some(rewritten))
        }
    }
}

/// Removes the `Secure` attribute from all `Set-Cookie` headers the rule set applies to.
///
/// Without a rule set or with an empty one nothing is changed. Other headers are never touched,
/// header order and count are preserved. Returns the number of rewritten headers.
pub fn rewrite_headers(
    rule_set: Option<&RuleSet>,
    headers: &mut HeaderMap,
) -> Result<usize, RewriteError> {
    let rule_set = match rule_set {
        Some(rule_set) if !rule_set.is_empty() => rule_set,
        _ => return Ok(0),
    };

    let mut count = 0;
    for (name, value) in headers.iter_mut() {
        if *name != SET_COOKIE {
            continue;
        }

        trace!("Set-Cookie before: {value:?}");
        if let Some(rewritten) = rewrite_value(rule_set, value)? {
            *value = rewritten;
            count += 1;
        }
        trace!("Set-Cookie after: {value:?}");
    }
    Ok(count)
}
