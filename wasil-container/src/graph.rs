//! Dependency graph validation.
//!
//! Walks the definitions reachable from a set of root identifiers and
//! reports problems without constructing anything:
//! - Detects circular references
//! - Checks that every referent is defined here or in a delegate
//!
//! Factory-backed definitions are opaque; their dependencies are only
//! discovered when the factory runs.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::container::Container;
use crate::error::{CircularReferenceError, InjectorError, Result};

/// Depth-first walk over definitions, keyed by canonical identifier.
pub(crate) struct GraphValidator<'a> {
    container: &'a Container,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<String>,
    /// Already validated (cache)
    validated: HashSet<String>,
    /// Current DFS path (for error reporting)
    path: Vec<String>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            container,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    #[instrument(skip(self, roots), name = "graph_validation")]
    pub fn validate<I, S>(&mut self, roots: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for root in roots {
            self.validate_identifier(root.as_ref())?;
        }

        debug!(validated = self.validated.len(), "Dependency graph is valid");
        Ok(())
    }

    fn validate_identifier(&mut self, identifier: &str) -> Result<()> {
        let identifier = self.container.canonical(identifier);

        if self.validated.contains(&identifier) {
            return Ok(());
        }

        if self.visiting.contains(&identifier) {
            let start = self
                .path
                .iter()
                .position(|id| *id == identifier)
                .unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(identifier);

            warn!(chain = ?chain, "Circular reference in definitions");
            return Err(InjectorError::CircularReference(CircularReferenceError { chain }));
        }

        let Some(definition) = self.container.load_definition(&identifier)? else {
            if self.container.delegated_has(&identifier)? {
                self.validated.insert(identifier);
                return Ok(());
            }

            let mut err = self.container.not_found(&identifier);
            if let InjectorError::NotFound(ref mut not_found) = err {
                not_found.required_by = self.path.last().cloned();
            }
            return Err(err);
        };

        let referents: Vec<String> = definition.referents().map(str::to_string).collect();

        self.visiting.insert(identifier.clone());
        self.path.push(identifier.clone());

        for referent in &referents {
            self.validate_identifier(referent)?;
        }

        self.path.pop();
        self.visiting.remove(&identifier);
        self.validated.insert(identifier);

        Ok(())
    }
}
