//! Event - the unit producers raise
//!
//! An immutable `(name, data)` pair. The name is validated at construction so
//! a constructed `Event` is always well-formed.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::ContractError;

/// Domain event raised by producers and delivered to handlers.
///
/// Equality and hashing are by `(name, data)`.
///
/// # Examples
/// ```
/// use contracts::Event;
///
/// let event = Event::new("order-placed", 42u32).unwrap();
/// assert_eq!(event.name(), "order-placed");
/// assert_eq!(*event.data(), 42);
///
/// assert!(Event::new("  ", 42u32).is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Event<T> {
    name: String,
    data: T,
}

impl<T> Event<T> {
    /// Create a new event.
    ///
    /// # Errors
    /// Returns `ContractError::InvalidArgument` if `name` is empty or whitespace.
    pub fn new(name: impl Into<String>, data: T) -> Result<Self, ContractError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ContractError::invalid_argument(
                "name",
                "event name must not be empty or whitespace",
            ));
        }
        Ok(Self { name, data })
    }

    /// Event name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event payload
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consume the event, returning its payload
    pub fn into_data(self) -> T {
        self.data
    }

    /// Whether the event still satisfies its construction invariant.
    ///
    /// `new` and deserialization both reject blank names, so this only fails
    /// if a future constructor skips validation; `Notifier::notify` checks it
    /// before dispatch regardless.
    pub fn is_well_formed(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Type name of the payload, used in diagnostics
    pub fn data_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T: fmt::Debug> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("data", &self.data)
            .finish()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Event<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<U> {
            name: String,
            data: U,
        }

        let raw = Raw::<T>::deserialize(deserializer)?;
        Event::new(raw.name, raw.data).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
    struct Ping {
        x: i32,
    }

    #[test]
    fn test_new_rejects_blank_names() {
        for name in ["", " ", "\t\n"] {
            let err = Event::new(name, Ping { x: 1 }).unwrap_err();
            assert!(matches!(err, ContractError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn test_equality_by_name_and_data() {
        let a = Event::new("p", Ping { x: 1 }).unwrap();
        let b = Event::new("p", Ping { x: 1 }).unwrap();
        let c = Event::new("q", Ping { x: 1 }).unwrap();
        let d = Event::new("p", Ping { x: 2 }).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);

        let set: HashSet<_> = [a, b, c, d].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_deserialize_validates_name() {
        let ok: Event<Ping> = serde_json::from_str(r#"{"name":"p","data":{"x":3}}"#).unwrap();
        assert_eq!(ok.data().x, 3);

        let bad = serde_json::from_str::<Event<Ping>>(r#"{"name":" ","data":{"x":3}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_data_type_name() {
        let event = Event::new("p", Ping { x: 1 }).unwrap();
        assert!(event.data_type_name().ends_with("Ping"));
        assert!(event.is_well_formed());
    }
}
