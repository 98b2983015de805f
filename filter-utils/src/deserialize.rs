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

//! Deserialization helpers for configuration files

use serde::de::value::{MapAccessDeserializer, StrDeserializer};
use serde::de::{Deserialize, Deserializer, Error, MapAccess, SeqAccess, Visitor};
use std::fmt::{Debug, Formatter};
use std::marker::PhantomData;
use std::ops::Deref;

/// A list that can be written as a single value in the configuration file.
///
/// Lists are deserialized into the inner `Vec` directly, any other value produces a list with one
/// element. This allows writing `unsecure_cookie: session` as well as
/// `unsecure_cookie: [session, tracking]`. Unquoted numbers and booleans are converted to their
/// string form, so `unsecure_cookie: 123` configures a cookie named `123`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct OneOrMany<T> {
    inner: Vec<T>,
}

impl<T: Debug> Debug for OneOrMany<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.inner.fmt(f)
    }
}

// Deriving `Default` would require `T: Default`
impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        Self { inner: Vec::new() }
    }
}

impl<T> Deref for OneOrMany<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for OneOrMany<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ListVisitor<T> {
            marker: PhantomData<T>,
        }

        impl<'de, T: Deserialize<'de>> Visitor<'de> for ListVisitor<T> {
            type Value = OneOrMany<T>;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a single value or a list")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut inner = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(entry) = seq.next_element()? {
                    inner.push(entry);
                }
                Ok(OneOrMany { inner })
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: Error,
            {
                Ok(OneOrMany {
                    inner: vec![T::deserialize(StrDeserializer::new(v))?],
                })
            }

            // Unquoted scalars like `123` or `true` are taken literally
            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
            where
                E: Error,
            {
                self.visit_str(&v.to_string())
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                self.visit_str(&v.to_string())
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                self.visit_str(&v.to_string())
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: Error,
            {
                self.visit_str(&v.to_string())
            }

            fn visit_map<A>(self, map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                Ok(OneOrMany {
                    inner: vec![T::deserialize(MapAccessDeserializer::new(map))?],
                })
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: Error,
            {
                Ok(OneOrMany::default())
            }
        }

        deserializer.deserialize_any(ListVisitor {
            marker: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn single_value() {
        let list: OneOrMany<String> = serde_yaml::from_str("session").unwrap();
        assert_eq!(&*list, &["session".to_owned()]);
    }

    #[test]
    fn list() {
        let list: OneOrMany<String> = serde_yaml::from_str("[session, \"*\"]").unwrap();
        assert_eq!(&*list, &["session".to_owned(), "*".to_owned()]);
    }

    #[test]
    fn null() {
        let list: OneOrMany<String> = serde_yaml::from_str("~").unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn unquoted_scalars() {
        let list: OneOrMany<String> = serde_yaml::from_str("123").unwrap();
        assert_eq!(&*list, &["123".to_owned()]);

        let list: OneOrMany<String> = serde_yaml::from_str("true").unwrap();
        assert_eq!(&*list, &["true".to_owned()]);

        let list: OneOrMany<String> = serde_yaml::from_str("-5").unwrap();
        assert_eq!(&*list, &["-5".to_owned()]);
    }
}
