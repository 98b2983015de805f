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

//! # Unsecure Cookie Module
//!
//! This crate removes the `Secure` attribute from `Set-Cookie` response headers. This is meant
//! for edge deployments where TLS is terminated in front of the server and some cookies have to
//! be sent over plain connections deliberately. Only the cookies named in the configuration are
//! affected:
//!
//! ```yaml
//! unsecure_cookie: [session, tracking]
//! ```
//!
//! With this configuration, the header `Set-Cookie: session=xyz; Secure; HttpOnly` is sent as
//! `Set-Cookie: session=xyz; HttpOnly`. `Set-Cookie: other=xyz; Secure` stays unchanged.
//!
//! The special name `"*"` (it needs to be quoted in YAML) applies to all cookies not matched by
//! any named rule. It is always considered last, no matter where it is listed. Cookie names are
//! compared case-insensitively, listing the same name twice is a configuration error.
//!
//! ## Matching and rewriting
//!
//! A named rule applies to a `Set-Cookie` header if its value contains the cookie name followed
//! by `=` anywhere, ignoring case. This is a substring check rather than a cookie parser, so the
//! rule for `id` also applies to `session_id=1`. Rules are tried in the configured order and the
//! first rule applying to a header decides, no further rules are considered for that header.
//!
//! The rewrite removes the first occurrence of `; secure` (ignoring case) from the header value.
//! All other bytes of the value are preserved. Headers other than `Set-Cookie` are never
//! modified.
//!
//! ## Scopes
//!
//! Rules can be configured for specific hosts and locations within a host:
//!
//! ```yaml
//! unsecure_cookie: session
//! unsecure_cookie_hosts:
//!   example.com:
//!     unsecure_cookie: [tracking, "*"]
//!     locations:
//!       /app:
//!         unsecure_cookie: app_session
//!         locations:
//!           /app/static: {}
//!   example.net: {}
//! ```
//!
//! A scope listing its own cookies replaces the rules of the enclosing scope entirely, rules are
//! never merged. A scope without any cookies uses the rules of the enclosing scope, here
//! `example.net` uses the top-level rules and `/app/static` the rules of `/app`. The filter is
//! disabled in scopes where neither the scope nor any enclosing scope lists cookies.
//!
//! Host names are matched case-insensitively, a host name with port falls back to the entry
//! without port. Requests to unknown hosts use the top-level rules. Location paths are absolute,
//! the most specific location containing the request path applies.
//!
//! ## Code example
//!
//! The handler is a step in the response header filter chain and passes control on to the
//! following steps after rewriting:
//!
//! ```rust
//! use filter_utils::pingora::{make_request_header, make_response_header};
//! use filter_utils::{FilterChain, FromYaml};
//! use http::header::{HeaderValue, SET_COOKIE};
//! use unsecure_cookie_module::{UnsecureCookieConf, UnsecureCookieHandler};
//!
//! let conf = UnsecureCookieConf::from_yaml("unsecure_cookie: session").unwrap();
//! let handler = UnsecureCookieHandler::try_from(conf).unwrap();
//! let chain = FilterChain::builder().push(handler).build();
//!
//! let request = make_request_header("https://example.com/").unwrap();
//! let mut response = make_response_header();
//! response
//!     .headers
//!     .append(SET_COOKIE, HeaderValue::from_static("session=xyz; Secure"));
//! chain.run(&request, &mut response).unwrap();
//! assert_eq!(response.headers[SET_COOKIE], "session=xyz");
//! ```

pub mod configuration;
pub mod engine;
mod handler;
pub mod matcher;
pub mod rules;
mod scope;
pub mod strip;

pub use configuration::UnsecureCookieConf;
pub use handler::UnsecureCookieHandler;
