//! Serde helpers for the declaration-ordered mappings in macro files.
//!
//! `IndexMap` keeps YAML order on its own but lets a repeated key overwrite
//! the earlier one; the helpers here reject repeats instead.
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};

struct UniqueKeys<V>(IndexMap<String, V>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for UniqueKeys<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct UniqueKeysVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for UniqueKeysVisitor<V> {
            type Value = UniqueKeys<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping with string keys")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if map.contains_key(&key) {
                        return Err(de::Error::custom(format!("duplicate key '{key}'")));
                    }
                    map.insert(key, value);
                }
                Ok(UniqueKeys(map))
            }
        }

        deserializer.deserialize_map(UniqueKeysVisitor(PhantomData))
    }
}

/// `deserialize_with` target: an `IndexMap` whose keys must be distinct.
pub fn unique_keys<'de, D, V>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    UniqueKeys::deserialize(deserializer).map(|map| map.0)
}

/// Like [`unique_keys`], one level deeper: distinct outer keys, and
/// distinct keys inside every inner mapping.
pub fn unique_nested_keys<'de, D, V>(
    deserializer: D,
) -> Result<IndexMap<String, IndexMap<String, V>>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    let outer: UniqueKeys<UniqueKeys<V>> = UniqueKeys::deserialize(deserializer)?;
    Ok(outer
        .0
        .into_iter()
        .map(|(key, inner)| (key, inner.0))
        .collect())
}
