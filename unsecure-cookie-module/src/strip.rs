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

//! Removing the `Secure` attribute from a `Set-Cookie` header value

use std::borrow::Cow;
use std::collections::TryReserveError;
use std::fmt::Display;

use crate::matcher::find_ignore_ascii_case;

/// The attribute separator and name removed from header values, compared ignoring case
pub const SECURE_ATTRIBUTE: &[u8] = b"; secure";

/// The error type returned when a header value cannot be rewritten
#[derive(Debug)]
pub struct RewriteError {
    context: &'static str,
    cause: Box<dyn std::error::Error + Send + Sync>,
}

impl RewriteError {
    pub(crate) fn new(
        context: &'static str,
        cause: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            context,
            cause: cause.into(),
        }
    }
}

impl From<TryReserveError> for RewriteError {
    fn from(err: TryReserveError) -> Self {
        Self::new("failed allocating memory for the rewritten header value", err)
    }
}

impl Display for RewriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "{}: {}", self.context, self.cause)
    }
}

impl std::error::Error for RewriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Removes the first occurrence of [`SECURE_ATTRIBUTE`] from the value.
///
/// All other bytes are kept as they are. The value is returned unchanged (borrowed) if it doesn’t
/// contain the attribute. The eight bytes are removed even if they are only the start of a longer
/// attribute name.
pub fn strip_secure(value: &[u8]) -> Result<Cow<'_, [u8]>, RewriteError> {
    let Some(start) = find_ignore_ascii_case(value, SECURE_ATTRIBUTE) else {
        return Ok(Cow::Borrowed(value));
    };
    let end = start + SECURE_ATTRIBUTE.len();

    let mut result = Vec::new();
    result.try_reserve_exact(value.len() - SECURE_ATTRIBUTE.len())?;
    result.extend_from_slice(&value[..start]);
    result.extend_from_slice(&value[end..]);
    Ok(Cow::Owned(result))
}
