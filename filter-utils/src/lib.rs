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

//! # Filter helpers
//!
//! This crate contains the plumbing shared by response header filter modules such as
//! `unsecure-cookie-module`: the [`HeaderFilter`] trait implemented by the modules, the ordered
//! [`FilterChain`] running them, and helpers to load module configuration from YAML files.

pub mod deserialize;
pub mod pingora;

use log::trace;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub use deserialize::OneOrMany;
use pingora::{Error, ErrorType, RequestHeader, ResponseHeader};

/// Trait to be implemented by response header filters.
///
/// A filter receives the header of the response about to be sent along with the header of the
/// request it belongs to. It can modify the response header and is then expected to pass control
/// on to the remaining filters by calling [`Next::run`]. The result of the remaining filters
/// should normally be returned unchanged.
///
/// Returning an error without calling `next` aborts the chain. The host is expected to produce an
/// internal error response then.
pub trait HeaderFilter: Debug + Send + Sync {
    /// Processes the response header and delegates to the next filter in the chain.
    fn header_filter(
        &self,
        request: &RequestHeader,
        response: &mut ResponseHeader,
        next: Next<'_>,
    ) -> Result<(), Box<Error>>;
}

/// The remaining filters of a [`FilterChain`] run
#[derive(Debug, Clone, Copy)]
pub struct Next<'a> {
    filters: &'a [Box<dyn HeaderFilter>],
}

impl Next<'_> {
    /// Runs the remaining filters. This does nothing if the end of the chain has been reached.
    pub fn run(
        self,
        request: &RequestHeader,
        response: &mut ResponseHeader,
    ) -> Result<(), Box<Error>> {
        if let Some((filter, filters)) = self.filters.split_first() {
            filter.header_filter(request, response, Next { filters })
        } else {
            Ok(())
        }
    }
}

/// An ordered list of response header filters.
///
/// The chain is set up once at startup and is read-only afterwards, it can be shared by all
/// requests:
///
/// ```rust
/// use filter_utils::pingora::{make_request_header, make_response_header};
/// use filter_utils::FilterChain;
///
/// let chain = FilterChain::builder().build();
/// let request = make_request_header("https://example.com/").unwrap();
/// let mut response = make_response_header();
/// chain.run(&request, &mut response).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn HeaderFilter>>,
}

impl FilterChain {
    /// Returns a builder instance that can be used to set up a filter chain.
    pub fn builder() -> FilterChainBuilder {
        FilterChainBuilder {
            filters: Vec::new(),
        }
    }

    /// Number of filters in the chain
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Checks whether the chain contains no filters
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs all filters in order on the given response header.
    pub fn run(
        &self,
        request: &RequestHeader,
        response: &mut ResponseHeader,
    ) -> Result<(), Box<Error>> {
        trace!("Running {} response header filter(s)", self.filters.len());
        Next {
            filters: &self.filters,
        }
        .run(request, response)
    }
}

/// The builder used to set up a [`FilterChain`] instance
#[derive(Debug)]
pub struct FilterChainBuilder {
    filters: Vec<Box<dyn HeaderFilter>>,
}

impl FilterChainBuilder {
    /// Appends a filter, it will run after all filters added previously.
    pub fn push(mut self, filter: impl HeaderFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    /// Finalizes the list of filters.
    pub fn build(self) -> FilterChain {
        FilterChain {
            filters: self.filters,
        }
    }
}

/// Trait for configuration structures that can be loaded from YAML files. This trait has a blanket
/// implementation for any structure implementing [`serde::Deserialize`].
pub trait FromYaml {
    /// Loads configuration from a YAML file.
    fn load_from_yaml<P>(path: P) -> Result<Self, Box<Error>>
    where
        P: AsRef<Path>,
        Self: Sized;

    /// Loads configuration from a YAML string.
    fn from_yaml<S>(yaml_conf: S) -> Result<Self, Box<Error>>
    where
        S: AsRef<str>,
        Self: Sized;
}

impl<D> FromYaml for D
where
    D: DeserializeOwned + Debug + ?Sized,
{
    fn load_from_yaml<P>(path: P) -> Result<Self, Box<Error>>
    where
        P: AsRef<Path>,
    {
        let file = File::open(path.as_ref()).map_err(|err| {
            Error::because(
                ErrorType::FileOpenError,
                format!(
                    "failed opening configuration file {}",
                    path.as_ref().display()
                ),
                err,
            )
        })?;
        let reader = BufReader::new(file);

        let conf = serde_yaml::from_reader(reader).map_err(|err| {
            Error::because(
                ErrorType::FileReadError,
                format!(
                    "failed reading configuration file {}",
                    path.as_ref().display()
                ),
                err,
            )
        })?;
        trace!("Loaded configuration file: {conf:#?}");

        Ok(conf)
    }

    fn from_yaml<S>(yaml_conf: S) -> Result<Self, Box<Error>>
    where
        S: AsRef<str>,
    {
        let conf = serde_yaml::from_str(yaml_conf.as_ref()).map_err(|err| {
            Error::because(ErrorType::ReadError, "failed parsing configuration", err)
        })?;
        trace!("Loaded configuration: {conf:#?}");

        Ok(conf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http::{header, HeaderValue};
    use pingora::{make_request_header, make_response_header};
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use test_log::test;

    #[derive(Debug)]
    struct AppendFilter {
        value: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl HeaderFilter for AppendFilter {
        fn header_filter(
            &self,
            request: &RequestHeader,
            response: &mut ResponseHeader,
            next: Next<'_>,
        ) -> Result<(), Box<Error>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            response
                .headers
                .append("X-Order", HeaderValue::from_static(self.value));
            next.run(request, response)
        }
    }

    #[derive(Debug)]
    struct FailingFilter;

    impl HeaderFilter for FailingFilter {
        fn header_filter(
            &self,
            _request: &RequestHeader,
            _response: &mut ResponseHeader,
            _next: Next<'_>,
        ) -> Result<(), Box<Error>> {
            Err(Error::new(ErrorType::HTTPStatus(500)))
        }
    }

    fn order(response: &ResponseHeader) -> Vec<&str> {
        response
            .headers
            .get_all("X-Order")
            .iter()
            .map(|value| value.to_str().unwrap())
            .collect()
    }

    #[test]
    fn empty_chain() -> Result<(), Box<Error>> {
        let chain = FilterChain::builder().build();
        assert!(chain.is_empty());

        let request = make_request_header("/")?;
        let mut response = make_response_header();
        response
            .headers
            .insert(header::SERVER, HeaderValue::from_static("test"));
        chain.run(&request, &mut response)?;
        assert_eq!(response.headers.len(), 1);
        Ok(())
    }

    #[test]
    fn filters_run_in_order() -> Result<(), Box<Error>> {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FilterChain::builder()
            .push(AppendFilter {
                value: "first",
                calls: calls.clone(),
            })
            .push(AppendFilter {
                value: "second",
                calls: calls.clone(),
            })
            .build();
        assert_eq!(chain.len(), 2);

        let request = make_request_header("/")?;
        let mut response = make_response_header();
        chain.run(&request, &mut response)?;
        assert_eq!(order(&response), vec!["first", "second"]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[test]
    fn error_aborts_chain() -> Result<(), Box<Error>> {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = FilterChain::builder()
            .push(AppendFilter {
                value: "first",
                calls: calls.clone(),
            })
            .push(FailingFilter)
            .push(AppendFilter {
                value: "never",
                calls: calls.clone(),
            })
            .build();

        let request = make_request_header("/")?;
        let mut response = make_response_header();
        let err = chain.run(&request, &mut response).unwrap_err();
        assert_eq!(err.etype, ErrorType::HTTPStatus(500));
        assert_eq!(order(&response), vec!["first"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct TestConf {
        names: OneOrMany<String>,
    }

    #[test]
    fn from_yaml() -> Result<(), Box<Error>> {
        let conf = TestConf::from_yaml("names: [a, b]")?;
        assert_eq!(conf.names.len(), 2);

        let err = TestConf::from_yaml("unknown: 1").unwrap_err();
        assert_eq!(err.etype, ErrorType::ReadError);
        Ok(())
    }

    #[test]
    fn missing_file() {
        let err = TestConf::load_from_yaml("/nonexistent/filter.yaml").unwrap_err();
        assert_eq!(err.etype, ErrorType::FileOpenError);
    }
}
