//! Process-lifetime cache of the displayable column list.

use std::sync::{Arc, OnceLock};

/// Ordered attribute names of the active backend. Once a non-empty list is
/// published it never changes; empty lists are handed back but not kept.
#[derive(Debug, Default)]
pub struct ColumnRegistry {
    cell: OnceLock<Arc<[String]>>,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<[String]>> {
        self.cell.get().cloned()
    }

    /// Publish `columns` unless a list is already cached; returns the cached one.
    pub fn publish(&self, columns: Arc<[String]>) -> Arc<[String]> {
        if columns.is_empty() {
            return self.get().unwrap_or(columns);
        }
        match self.cell.set(columns.clone()) {
            Ok(()) => columns,
            Err(_) => self.get().unwrap_or(columns),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Arc<[String]> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_publish_wins() {
        let registry = ColumnRegistry::new();
        let first = registry.publish(cols(&["SIRET", "Nom"]));
        let second = registry.publish(cols(&["Other"]));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(&*second, &["SIRET", "Nom"]);
    }

    #[test]
    fn empty_lists_are_not_cached() {
        let registry = ColumnRegistry::new();
        assert!(registry.publish(cols(&[])).is_empty());
        assert!(registry.get().is_none());

        registry.publish(cols(&["SIRET"]));
        assert_eq!(registry.get().as_deref(), Some(&["SIRET".to_string()][..]));
    }
}
