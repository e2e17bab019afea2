//! Read-through cache for the category list

use std::sync::Mutex;

/// Memoized "list all categories" view.
///
/// The store invalidates it on every local add/delete. Changes made by another
/// process sharing the same vault file are not observed until the next local
/// mutation.
#[derive(Debug, Default)]
pub struct CategoryCache {
    names: Mutex<Option<Vec<String>>>,
}

impl CategoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached list, or `None` when it must be reloaded
    pub fn get(&self) -> Option<Vec<String>> {
        self.names.lock().ok().and_then(|names| names.clone())
    }

    pub fn put(&self, names: Vec<String>) {
        if let Ok(mut cached) = self.names.lock() {
            *cached = Some(names);
        }
    }

    pub fn invalidate(&self) {
        match self.names.lock() {
            Ok(mut cached) => *cached = None,
            // A poisoned cache is dropped rather than trusted
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_lifecycle() {
        let cache = CategoryCache::new();
        assert!(cache.get().is_none());

        cache.put(vec!["Work".to_string()]);
        assert_eq!(cache.get(), Some(vec!["Work".to_string()]));

        cache.invalidate();
        assert!(cache.get().is_none());
    }
}
