use crate::core::{Result, RowscopeError};
use once_cell::unsync::OnceCell;
use serde_json::Value;
use std::fmt;

/// Follows `path` through nested JSON objects.
///
/// Fails with [`RowscopeError::MissingKey`] naming the first key that cannot
/// be resolved, which includes stepping into a value that is not an object.
///
/// ```
/// use rowscope::nested::access_nested_map;
/// use serde_json::json;
///
/// let map = json!({"a": {"b": 2}});
/// assert_eq!(access_nested_map(&map, &["a", "b"]).unwrap(), &json!(2));
/// assert!(access_nested_map(&map, &["a", "b", "c"]).is_err());
/// ```
pub fn access_nested_map<'a>(map: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().try_fold(map, |current, key| {
        current
            .as_object()
            .and_then(|object| object.get(*key))
            .ok_or_else(|| RowscopeError::MissingKey(key.to_string()))
    })
}

/// A value computed on first access and reused afterwards
pub struct Memoized<T> {
    cell: OnceCell<T>,
    init: fn() -> T,
}

impl<T> Memoized<T> {
    pub const fn new(init: fn() -> T) -> Self {
        Memoized {
            cell: OnceCell::new(),
            init,
        }
    }

    /// Returns the value, computing it if this is the first call
    pub fn get(&self) -> &T {
        self.cell.get_or_init(self.init)
    }

    /// Whether the value has been computed yet
    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for Memoized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("value", &self.cell.get()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_access_nested_map() {
        let cases = [
            (json!({"a": 1}), vec!["a"], json!(1)),
            (json!({"a": {"b": 2}}), vec!["a"], json!({"b": 2})),
            (json!({"a": {"b": 2}}), vec!["a", "b"], json!(2)),
        ];
        for (map, path, expected) in cases {
            assert_eq!(access_nested_map(&map, &path).unwrap(), &expected);
        }
    }

    #[test]
    fn test_empty_path_returns_map() {
        let map = json!({"a": 1});
        assert_eq!(access_nested_map(&map, &[]).unwrap(), &map);
    }

    #[test]
    fn test_access_nested_map_exception() {
        let cases = [
            (json!({}), vec!["a"], "a"),
            (json!({"a": 1}), vec!["a", "b"], "b"),
            (json!({"a": {"b": 2}}), vec!["a", "x", "y"], "x"),
        ];
        for (map, path, missing) in cases {
            match access_nested_map(&map, &path) {
                Err(RowscopeError::MissingKey(key)) => assert_eq!(key, missing),
                other => panic!("Expected MissingKey({}), got {:?}", missing, other),
            }
        }
    }

    thread_local! {
        static CALLS: Cell<u32> = Cell::new(0);
    }

    fn a_method() -> u32 {
        CALLS.with(|calls| calls.set(calls.get() + 1));
        42
    }

    #[test]
    fn test_memoize() {
        let property = Memoized::new(a_method);
        assert!(!property.is_computed());
        assert_eq!(*property.get(), 42);
        assert_eq!(*property.get(), 42);
        assert!(property.is_computed());
        assert_eq!(CALLS.with(Cell::get), 1);
    }
}
