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

//! Structures required to deserialize Unsecure Cookie Module configuration from YAML
//! configuration files.

use filter_utils::OneOrMany;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Settings of a host or location scope
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeConf {
    /// Cookie names to remove the `Secure` attribute from, `*` applying to all cookies. If empty,
    /// the rules of the enclosing scope apply.
    pub unsecure_cookie: OneOrMany<String>,

    /// Nested location scopes, mapping absolute paths like `/app` to their settings
    pub locations: BTreeMap<String, ScopeConf>,
}

/// Configuration file settings of the unsecure cookie module
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UnsecureCookieConf {
    /// Cookie names to remove the `Secure` attribute from on all hosts, `*` applying to all
    /// cookies.
    pub unsecure_cookie: OneOrMany<String>,

    /// Host scopes, mapping host names like `example.com` or `localhost:8080` to their settings
    pub unsecure_cookie_hosts: BTreeMap<String, ScopeConf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    use filter_utils::FromYaml;
    use test_log::test;

    #[test]
    fn empty() {
        assert_eq!(
            UnsecureCookieConf::from_yaml("{}").unwrap(),
            UnsecureCookieConf::default()
        );
    }

    #[test]
    fn nested_scopes() {
        let conf = UnsecureCookieConf::from_yaml(
            r#"
                unsecure_cookie: session
                unsecure_cookie_hosts:
                  example.com:
                    unsecure_cookie: [tracking, "*"]
                    locations:
                      /app:
                        unsecure_cookie: app_session
                        locations:
                          /app/static: {}
                  example.net: {}
            "#,
        )
        .unwrap();

        assert_eq!(&*conf.unsecure_cookie, &["session".to_owned()]);
        let host = &conf.unsecure_cookie_hosts["example.com"];
        assert_eq!(&*host.unsecure_cookie, &["tracking".to_owned(), "*".to_owned()]);
        let location = &host.locations["/app"];
        assert_eq!(&*location.unsecure_cookie, &["app_session".to_owned()]);
        assert_eq!(location.locations["/app/static"], ScopeConf::default());
        assert_eq!(conf.unsecure_cookie_hosts["example.net"], ScopeConf::default());
    }

    #[test]
    fn unknown_field() {
        assert!(UnsecureCookieConf::from_yaml("unsecure_cookies: [a]").is_err());
        assert!(UnsecureCookieConf::from_yaml(
            r#"
                unsecure_cookie_hosts:
                  example.com:
                    cookie: a
            "#
        )
        .is_err());
    }

    #[test]
    fn numeric_cookie_names() {
        let conf = UnsecureCookieConf::from_yaml(
            r#"
                unsecure_cookie: 123
                unsecure_cookie_hosts:
                  example.com:
                    unsecure_cookie: [7, session]
            "#,
        )
        .unwrap();

        assert_eq!(&*conf.unsecure_cookie, &["123".to_owned()]);
        let host = &conf.unsecure_cookie_hosts["example.com"];
        assert_eq!(&*host.unsecure_cookie, &["7".to_owned(), "session".to_owned()]);
    }
}
