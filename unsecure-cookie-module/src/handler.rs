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

use filter_utils::pingora::{request_host, Error, ErrorType, RequestHeader, ResponseHeader};
use filter_utils::{HeaderFilter, Next};
use log::{debug, trace};

use crate::configuration::UnsecureCookieConf;
use crate::engine::rewrite_headers;
use crate::rules::RuleSet;
use crate::scope::ScopeTable;
use crate::strip::RewriteError;

/// Response header filter removing the `Secure` attribute from configured cookies
#[derive(Debug)]
pub struct UnsecureCookieHandler {
    scopes: ScopeTable,
}

impl TryFrom<UnsecureCookieConf> for UnsecureCookieHandler {
    type Error = Box<Error>;

    fn try_from(conf: UnsecureCookieConf) -> Result<Self, Self::Error> {
        debug!("Unsecure cookie configuration received: {conf:#?}");
        let scopes = ScopeTable::from_conf(&conf)?;
        trace!("Resolved unsecure cookie scopes: {scopes:#?}");
        Ok(Self { scopes })
    }
}

impl UnsecureCookieHandler {
    /// Determines the rule set applying to the given request, `None` if the filter is disabled
    /// for it.
    pub fn rule_set(&self, request: &RequestHeader) -> Option<&RuleSet> {
        let host = request_host(request);
        self.scopes
            .lookup(host.as_deref(), request.uri.path())
            .map(|rule_set| &**rule_set)
    }
}

impl HeaderFilter for UnsecureCookieHandler {
    fn header_filter(
        &self,
        request: &RequestHeader,
        response: &mut ResponseHeader,
        next: Next<'_>,
    ) -> Result<(), Box<Error>> {
        let result = if let Some(rule_set) = self.rule_set(request) {
            rewrite_headers(Some(rule_set), &mut response.headers)
        } else {
            debug!(
                "unsecure_cookie filter is disabled for {}",
                request.uri.path()
            );
            Ok(0)
        };

        continue_after_rewrite(result, request, response, next)
    }
}

/// Passes the response on to the next step, unless rewriting failed. A failure results in an
/// internal server error, the remaining steps don’t run then.
fn continue_after_rewrite(
    result: Result<usize, RewriteError>,
    request: &RequestHeader,
    response: &mut ResponseHeader,
    next: Next<'_>,
) -> Result<(), Box<Error>> {
    let count = result.map_err(|err| {
        Error::because(
            ErrorType::HTTPStatus(500),
            "failed removing Secure attribute from Set-Cookie header",
            err,
        )
    })?;
    trace!("Rewrote {count} Set-Cookie header(s)");

    next.run(request, response)
}
