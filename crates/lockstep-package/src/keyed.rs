//! Serialize a `Vec<T>` as a JSON object whose keys come from the items.
//!
//! Entries keep the order of the vector, so callers control sorting and the
//! output stays byte-stable. On the way back in, each key is handed to
//! [`Keyed::apply_key`] to restore the fields it carries.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;

pub(crate) trait Keyed {
    fn key(&self) -> String;
    fn apply_key(&mut self, key: &str) -> Result<(), String>;
}

pub(crate) fn serialize<S, T>(items: &[T], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: Keyed + Serialize,
{
    serializer.collect_map(items.iter().map(|item| (item.key(), item)))
}

pub(crate) fn deserialize<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Keyed + Deserialize<'de>,
{
    struct KeyedVisitor<T>(PhantomData<T>);

    impl<'de, T> Visitor<'de> for KeyedVisitor<T>
    where
        T: Keyed + Deserialize<'de>,
    {
        type Value = Vec<T>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a map of keyed entries")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut items = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, mut value)) = map.next_entry::<String, T>()? {
                value.apply_key(&key).map_err(de::Error::custom)?;
                items.push(value);
            }
            Ok(items)
        }
    }

    deserializer.deserialize_map(KeyedVisitor(PhantomData))
}

/// Split `Name/1.0.0` into its name and version
pub(crate) fn split_name_version(key: &str) -> Result<(String, semver::Version), String> {
    let (name, version) = key
        .rsplit_once('/')
        .ok_or_else(|| format!("expected 'name/version', found '{}'", key))?;
    let version = crate::version::parse_version(version).map_err(|e| e.to_string())?;
    Ok((name.to_string(), version))
}
