//! Flat key/value configuration for pipeline nodes.
//!
//! Every configurable node speaks [`Configurable`]: it writes its
//! settings under a caller-chosen prefix into a [`PropertyList`] and can
//! restore itself from one. Prefixes compose with dots
//! (`"chain.histogram.mode"`), so a whole chain serializes into one flat
//! list, and the list round-trips through an INI file for on-disk state.
//!
//! # Example
//!
//! ```
//! use tilestream::config::PropertyList;
//! use tilestream::geom::IRect;
//!
//! let mut props = PropertyList::new();
//! props.set("aoi", IRect::from_bounds(0, 0, 511, 511));
//! props.set("histogram.bins", 256);
//!
//! let aoi: Option<IRect> = props.get_parsed("aoi").unwrap();
//! assert_eq!(aoi, Some(IRect::from_bounds(0, 0, 511, 511)));
//! ```

pub mod keys;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ini::Ini;

use crate::error::{PipelineError, PipelineResult};

/// An ordered flat map of string settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyList {
    entries: BTreeMap<String, String>,
}

impl PropertyList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` (via its `Display` form) under `key`, replacing any
    /// previous value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: fmt::Display,
    {
        self.entries.insert(key.into(), value.to_string());
    }

    /// The raw value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Parses the value under `key` into `T`.
    ///
    /// A missing key is `Ok(None)` so loaders can keep their defaults; a
    /// present but malformed value is an error naming the key.
    pub fn get_parsed<T>(&self, key: &str) -> PipelineResult<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse().map(Some).map_err(|e: T::Err| {
                PipelineError::Parse {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    /// All keys starting with `prefix`, in sorted order.
    pub fn keys_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_str())
    }

    /// All entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Loads a list from an INI file.
    ///
    /// Section names become key prefixes: `[histogram]` `mode=fast` loads
    /// as `histogram.mode`. Keys in the global section load bare.
    pub fn from_ini_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let ini = Ini::load_from_file(path)?;
        let mut list = Self::new();
        for (section, props) in ini.iter() {
            for (key, value) in props.iter() {
                match section {
                    Some(name) => list.set(format!("{}.{}", name, key), value),
                    None => list.set(key, value),
                }
            }
        }
        Ok(list)
    }

    /// Writes the list to an INI file.
    ///
    /// The leading dotted component of each key becomes the section, the
    /// remainder the key inside it; undotted keys land in the global
    /// section. This inverts [`PropertyList::from_ini_file`] exactly.
    pub fn to_ini_file<P: AsRef<Path>>(&self, path: P) -> PipelineResult<()> {
        let mut ini = Ini::new();
        for (key, value) in self.iter() {
            match key.split_once('.') {
                Some((section, rest)) => {
                    ini.set_to(Some(section), rest.to_string(), value.to_string());
                }
                None => {
                    ini.set_to(None::<String>, key.to_string(), value.to_string());
                }
            }
        }
        ini.write_to_file(path)?;
        Ok(())
    }
}

/// Joins a prefix and a key with a dot; an empty prefix yields the key
/// alone.
pub fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// A pipeline node whose settings round-trip through a [`PropertyList`].
pub trait Configurable {
    /// Writes this node's settings under `prefix`.
    fn save_state(&self, props: &mut PropertyList, prefix: &str);

    /// Applies any settings found under `prefix`, leaving unmentioned
    /// settings as they are.
    fn load_state(&mut self, props: &PropertyList, prefix: &str) -> PipelineResult<()>;
}
