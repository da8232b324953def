//! Two-pass record resolution
//!
//! Pass 1 scans the record text for declared key names. Pass 2 evaluates the
//! assignments in order, in a fresh scope, to obtain each key's effective
//! value. The resulting mapping contains exactly the keys from pass 1.

use super::{ConfigMapping, Registry, parser};
use crate::BuildError;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Resolves registry identifiers into config mappings
#[derive(Debug, Clone)]
pub struct Resolver<'a> {
    registry: &'a Registry,
    constants: &'a ConfigMapping,
    use_environment: bool,
}

impl<'a> Resolver<'a> {
    /// Create a resolver that expands against `constants` and the process
    /// environment
    pub fn new(registry: &'a Registry, constants: &'a ConfigMapping) -> Self {
        Self {
            registry,
            constants,
            use_environment: true,
        }
    }

    /// Do not consult the process environment during expansion
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    /// Resolve the mapping for one identifier
    pub async fn resolve(&self, identifier: &str) -> Result<ConfigMapping, BuildError> {
        let path = self.registry.lookup(identifier)?;
        debug!("Resolving '{}' from {}", identifier, path.display());

        let text = fs::read_to_string(path).await?;
        evaluate_record(&text, self.constants, self.use_environment)
            .map_err(|(line, message)| {
                BuildError::validation(identifier, path, format!("line {line}: {message}"))
            })
            .inspect(|mapping| debug!("Resolved {} keys for '{}'", mapping.len(), identifier))
    }
}

/// Load the shared constants record
///
/// A missing file yields an empty mapping. Constants may reference each other
/// and the process environment.
pub async fn load_constants(path: &Path) -> Result<ConfigMapping, BuildError> {
    if !fs::try_exists(path).await? {
        debug!("No constants file at {}", path.display());
        return Ok(ConfigMapping::new());
    }

    let text = fs::read_to_string(path).await?;
    evaluate_record(&text, &ConfigMapping::new(), true).map_err(|(line, message)| {
        BuildError::validation("constants", path, format!("line {line}: {message}"))
    })
}

/// Evaluate a record's text into its declared key/value mapping
///
/// Expansion looks up values assigned earlier in the same record, then
/// `seed`, then (if enabled) the process environment. Errors carry the
/// 1-based line number.
pub fn evaluate_record(
    text: &str,
    seed: &ConfigMapping,
    use_environment: bool,
) -> Result<ConfigMapping, (usize, String)> {
    let declared = parser::scan_declared_keys(text);
    let mut scope: HashMap<&str, String> = HashMap::new();

    for assignment in parser::assignments(text) {
        if parser::has_command_substitution(assignment.raw) {
            warn!(
                "line {}: command substitution in {} is not evaluated",
                assignment.line, assignment.key
            );
        }

        let lookup = |name: &str| {
            scope
                .get(name)
                .cloned()
                .or_else(|| seed.raw(name).map(str::to_string))
                .or_else(|| {
                    use_environment
                        .then(|| std::env::var(name).ok())
                        .flatten()
                })
        };

        let value = parser::expand_word(assignment.raw, &lookup)
            .map_err(|e| (assignment.line, format!("{}: {}", assignment.key, e)))?;
        scope.insert(assignment.key, value);
    }

    Ok(declared
        .into_iter()
        .map(|key| {
            let value = scope.get(key.as_str()).cloned().unwrap_or_default();
            (key, value)
        })
        .collect())
}
