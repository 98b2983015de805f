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

//! Exposes the error types of the Pingora stack and the request/response header types passed
//! through the filter chain, so that typical modules don’t need them as direct dependencies.

use http::header;
use std::borrow::Cow;

pub use pingora_error::{Error, ErrorType};

/// Request header of the response being filtered
pub type RequestHeader = http::request::Parts;

/// Response header being filtered
pub type ResponseHeader = http::response::Parts;

/// Attempts to determine the request host if one was specified.
///
/// The `Host` header takes precedence, the authority of the request URI is used as fallback.
/// A port is kept as part of the host name, e.g. `localhost:8080`.
pub fn request_host(request: &RequestHeader) -> Option<Cow<'_, str>> {
    fn host_from_header(request: &RequestHeader) -> Option<Cow<'_, str>> {
        let host = request.headers.get(header::HOST)?;
        host.to_str().ok().map(|h| h.into())
    }

    fn host_from_uri(request: &RequestHeader) -> Option<Cow<'_, str>> {
        let uri = &request.uri;
        let host = uri.host()?;
        if let Some(port) = uri.port() {
            let mut host = host.to_owned();
            host.push(':');
            host.push_str(port.as_str());
            Some(host.into())
        } else {
            Some(host.into())
        }
    }

    host_from_header(request).or_else(|| host_from_uri(request))
}

/// Creates a request header for tests and command line tools
pub fn make_request_header(uri: &str) -> Result<RequestHeader, Box<Error>> {
    let (parts, ()) = http::Request::builder()
        .uri(uri)
        .body(())
        .map_err(|err| Error::because(ErrorType::InvalidHTTPHeader, "invalid request URI", err))?
        .into_parts();
    Ok(parts)
}

/// Creates an empty `200 OK` response header
pub fn make_response_header() -> ResponseHeader {
    let (parts, ()) = http::Response::new(()).into_parts();
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::HeaderValue;
    use test_log::test;

    #[test]
    fn host_from_header() -> Result<(), Box<Error>> {
        let mut request = make_request_header("https://example.com/")?;
        request
            .headers
            .insert(header::HOST, HeaderValue::from_static("localhost:8080"));
        assert_eq!(request_host(&request).as_deref(), Some("localhost:8080"));
        Ok(())
    }

    #[test]
    fn host_from_uri() -> Result<(), Box<Error>> {
        let request = make_request_header("https://example.com/file.txt")?;
        assert_eq!(request_host(&request).as_deref(), Some("example.com"));

        let request = make_request_header("http://[::1]:8080/")?;
        assert_eq!(request_host(&request).as_deref(), Some("[::1]:8080"));

        let request = make_request_header("/file.txt")?;
        assert_eq!(request_host(&request), None);
        Ok(())
    }
}
