//! Wire-level key/value maps as they appear in the invocation events and
//! the merging of their single-value and multi-value flavours.

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::fmt;
use std::marker::PhantomData;

/// A JSON object kept as an ordered list of entries.
/// The events carry headers and query parameters as plain JSON objects and the order
/// of their keys is the only ordering information there is, so it is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap<V>(pub Vec<(String, V)>);

impl<V> Default for FieldMap<V> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<V> FieldMap<V> {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for FieldMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for FieldMapVisitor<V> {
            type Value = FieldMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, V>()? {
                    entries.push((key, value));
                }
                Ok(FieldMap(entries))
            }
        }

        deserializer.deserialize_map(FieldMapVisitor(PhantomData))
    }
}

/// How keys of the two maps are compared when merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    /// Header names
    CaseInsensitive,
    /// Query parameter names
    Exact,
}

impl KeyMatch {
    fn same(self, a: &str, b: &str) -> bool {
        match self {
            KeyMatch::CaseInsensitive => a.eq_ignore_ascii_case(b),
            KeyMatch::Exact => a == b,
        }
    }
}

/// Merges a single-value map with a multi-value map from the same event.
///
/// The multi-value map is authoritative: its entries come first, in order, with all their values.
/// An entry of the single-value map is only added when the multi-value map has no key matching it,
/// so a name repeated in the multi-value map is never collapsed by its single-value twin.
/// Either map may be absent.
pub fn merge_single_and_multi(
    single: Option<&FieldMap<String>>,
    multi: Option<&FieldMap<Vec<String>>>,
    key_match: KeyMatch,
) -> Vec<(String, Vec<String>)> {
    let mut merged: Vec<(String, Vec<String>)> = Vec::new();

    if let Some(multi) = multi {
        for (key, values) in multi.iter() {
            // a key may repeat with a different case in a JSON object
            match merged.iter_mut().find(|(k, _)| key_match.same(k, key)) {
                Some((_, existing)) => existing.extend(values.iter().cloned()),
                None => merged.push((key.to_owned(), values.clone())),
            }
        }
    }

    if let Some(single) = single {
        for (key, value) in single.iter() {
            if multi.is_some_and(|m| m.iter().any(|(k, _)| key_match.same(k, key))) {
                continue;
            }
            match merged.iter_mut().find(|(k, _)| key_match.same(k, key)) {
                Some((_, existing)) => existing.push(value.clone()),
                None => merged.push((key.to_owned(), vec![value.clone()])),
            }
        }
    }

    merged
}
