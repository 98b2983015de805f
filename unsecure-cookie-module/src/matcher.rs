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

//! Deciding whether a cookie rule applies to a `Set-Cookie` header value

use crate::rules::CookieRule;

/// Finds the first occurrence of `needle` in `haystack`, ignoring ASCII case.
pub fn find_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    haystack
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle))
}

/// Checks whether a rule applies to the given `Set-Cookie` header value.
///
/// A named rule applies if `name=` occurs anywhere in the value, ignoring case. This is not
/// anchored to the start of the cookie: the rule for `id` also applies to `session_id=1` or to
/// an attribute like `Comment=id=1`. Configurations may depend on this, it is kept deliberately.
///
/// The wildcard rule always applies.
pub fn matches(rule: &CookieRule, value: &[u8]) -> bool {
    if rule.is_wildcard() {
        return true;
    }

    let name = rule.name().as_bytes();
    value.windows(name.len() + 1).any(|window| {
        let (candidate, separator) = window.split_at(name.len());
        separator == b"=" && candidate.eq_ignore_ascii_case(name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn find() {
        assert_eq!(find_ignore_ascii_case(b"a=b; SeCuRe", b"; secure"), Some(3));
        assert_eq!(find_ignore_ascii_case(b"a=b; Secure; secure", b"; secure"), Some(3));
        assert_eq!(find_ignore_ascii_case(b"a=b;Secure", b"; secure"), None);
        assert_eq!(find_ignore_ascii_case(b"; sec", b"; secure"), None);
        assert_eq!(find_ignore_ascii_case(b"", b""), Some(0));
    }

    #[test]
    fn named_rule() {
        let rule = CookieRule::new("session");
        assert!(matches(&rule, b"session=xyz; Secure"));
        assert!(matches(&rule, b"SESSION=xyz"));
        assert!(matches(&rule, b"Session="));
        assert!(!matches(&rule, b"other=xyz; Secure"));
        assert!(!matches(&rule, b"session"));
        assert!(!matches(&rule, b"sessionid=xyz"));
        assert!(!matches(&rule, b""));
    }

    #[test]
    fn unanchored_match() {
        let rule = CookieRule::new("id");
        assert!(matches(&rule, b"session_id=1; Secure"));
        assert!(matches(&rule, b"a=1; Comment=id=2"));
    }

    #[test]
    fn wildcard_rule() {
        let rule = CookieRule::new("*");
        assert!(matches(&rule, b"anything=1; Secure"));
        assert!(matches(&rule, b""));
        // Only the exact wildcard is special
        assert!(!matches(&CookieRule::new("*x"), b"a=1"));
    }
}
