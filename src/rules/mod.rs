//! Built-in rules.
//!
//! Rules are grouped by category:
//! - `bugs`: unchecked-error, nil-deref, shadow-var
//! - `style`: naming-convention, import-order, line-length
//! - `perf`: prealloc-slice
//! - `security`: hardcoded-secret, sql-injection

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::registry::Registry;
use crate::rule::Rule;

mod bugs;
mod perf;
mod security;
mod style;

pub use bugs::{NilDeref, ShadowVar, UncheckedError};
pub use perf::PreallocSlice;
pub use security::{HardcodedSecret, SqlInjection};
pub use style::{ImportOrder, LineLength, NamingConvention, DEFAULT_MAX_LINE_LENGTH};

/// Instantiate every built-in rule, applying rule options from `config`.
pub fn builtin_rules(config: &Config) -> Result<Vec<Arc<dyn Rule>>> {
    Ok(vec![
        Arc::new(UncheckedError),
        Arc::new(NilDeref),
        Arc::new(ShadowVar),
        Arc::new(NamingConvention),
        Arc::new(ImportOrder),
        Arc::new(LineLength::from_config(config)?),
        Arc::new(PreallocSlice),
        Arc::new(HardcodedSecret),
        Arc::new(SqlInjection),
    ])
}

/// Register every built-in rule into `registry`.
pub fn register_builtin(registry: &Registry, config: &Config) -> Result<()> {
    for rule in builtin_rules(config)? {
        registry.register(rule)?;
    }
    Ok(())
}

/// Names of the built-in rules, for `glint init`.
pub fn builtin_names() -> Vec<String> {
    builtin_rules(&Config::default())
        .map(|rules| rules.iter().map(|r| r.name().to_string()).collect())
        .unwrap_or_default()
}
