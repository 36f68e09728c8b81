//! Diagnostic and rule model shared by the engine and rule plugins.
//!
//! - `Diagnostic`: an immutable finding with a resolved source span
//! - `Rule` / `FileRule`: the plugin contract
//! - `AnalysisContext`: the read-only per-file view passed to rules

mod context;
mod traits;
mod types;

pub use context::{AnalysisContext, LineIndex};
pub use traits::{FileRule, Rule};
pub use types::{sort_diagnostics, Category, Diagnostic, Position, Severity};
