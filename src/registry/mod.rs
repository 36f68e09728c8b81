//! Rule registry.
//!
//! Maps rule names to rule instances. A process-wide default instance is
//! available through [`global`], but the engine accepts any `Registry`, so
//! tests and embedders can build isolated ones.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{EngineError, Result};
use crate::rule::Rule;

/// Thread-safe mapping from rule name to rule.
#[derive(Default)]
pub struct Registry {
    rules: RwLock<HashMap<String, Arc<dyn Rule>>>,
}

static GLOBAL: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide default registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule.
    ///
    /// Fails if a rule with the same name is already registered; rules are
    /// never silently shadowed.
    pub fn register(&self, rule: Arc<dyn Rule>) -> Result<()> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let name = rule.name().to_string();
        if rules.contains_key(&name) {
            return Err(EngineError::DuplicateRule { name });
        }
        tracing::debug!(rule = %name, "registered rule");
        rules.insert(name, rule);
        Ok(())
    }

    /// Look up a rule by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Rule>> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.get(name).cloned()
    }

    /// All registered rules, in unspecified order.
    pub fn all(&self) -> Vec<Arc<dyn Rule>> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.values().cloned().collect()
    }

    /// All registered rules sorted by name.
    pub fn sorted(&self) -> Vec<Arc<dyn Rule>> {
        let mut rules = self.all();
        rules.sort_by(|a, b| a.name().cmp(b.name()));
        rules
    }

    /// Names of all registered rules, in unspecified order.
    pub fn names(&self) -> Vec<String> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Category, Severity};

    struct NamedRule(&'static str);

    impl Rule for NamedRule {
        fn name(&self) -> &str {
            self.0
        }
        fn category(&self) -> Category {
            Category::Style
        }
        fn severity(&self) -> Severity {
            Severity::Info
        }
        fn description(&self) -> &str {
            "test rule"
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = Registry::new();
        registry.register(Arc::new(NamedRule("alpha"))).unwrap();

        assert!(registry.get("alpha").is_some());
        assert!(registry.get("beta").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        registry.register(Arc::new(NamedRule("alpha"))).unwrap();

        let err = registry.register(Arc::new(NamedRule("alpha"))).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateRule { ref name } if name == "alpha"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sorted_by_name() {
        let registry = Registry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(Arc::new(NamedRule(name))).unwrap();
        }

        let names: Vec<_> = registry.sorted().iter().map(|r| r.name().to_string()).collect();
        assert_eq!(names, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let name: &'static str = Box::leak(format!("rule-{}", i).into_boxed_str());
                    registry.register(Arc::new(NamedRule(name))).unwrap();
                    registry.all().len()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 8);
    }
}
