//! Typed per-session values.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::error::SessionError;

/// Name of a session value together with the type stored under it.
///
/// ```rust,ignore
/// pub const USERNAME: SessionKey<String> = SessionKey::new("username");
/// session.insert(&USERNAME, &"alice".to_string())?;
/// let name: Option<String> = session.get(&USERNAME)?;
/// ```
pub struct SessionKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> SessionKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for SessionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SessionKey").field(&self.name).finish()
    }
}

impl<T> Clone for SessionKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SessionKey<T> {}

/// Serialized values of one session, keyed by [`SessionKey`] name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionValues {
    entries: BTreeMap<String, Value>,
}

impl SessionValues {
    pub fn get<T: DeserializeOwned>(&self, key: &SessionKey<T>) -> Result<Option<T>, SessionError> {
        match self.entries.get(key.name) {
            Some(value) => Ok(Some(T::deserialize(value)?)),
            None => Ok(None),
        }
    }

    pub fn insert<T: Serialize>(&mut self, key: &SessionKey<T>, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.entries.insert(key.name.to_string(), value);
        Ok(())
    }

    pub fn remove<T>(&mut self, key: &SessionKey<T>) -> bool {
        self.entries.remove(key.name).is_some()
    }

    pub fn contains<T>(&self, key: &SessionKey<T>) -> bool {
        self.entries.contains_key(key.name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
