//! Dependency-ordered creation of same-kind objects.
//!
//! Views may reference views that do not exist yet, and the dependency graph
//! is not known up front. Instead of sorting, the builder retries: each pass
//! attempts every pending definition, keeps the ones that failed with an
//! unresolved reference, and stops once a pass creates nothing.

use tracing::{debug, info};

use crate::error::{classify, CloneError, ErrorClass, Result};
use crate::object::{ObjectDefinition, ObjectKind};
use crate::progress::CloneContext;
use crate::session::Session;

/// Definitions not yet created on the destination. Shrinks monotonically.
#[derive(Debug, Default)]
pub struct PendingSet {
    definitions: Vec<ObjectDefinition>,
}

impl PendingSet {
    pub fn new(definitions: Vec<ObjectDefinition>) -> Self {
        Self { definitions }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.definitions.iter().map(|d| d.name.clone()).collect()
    }

    fn take(&mut self) -> Vec<ObjectDefinition> {
        std::mem::take(&mut self.definitions)
    }

    fn keep(&mut self, definition: ObjectDefinition) {
        self.definitions.push(definition);
    }
}

/// Result of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// Names in creation order.
    pub created: Vec<String>,
    pub passes: usize,
}

/// Create `definitions` on `dest`, discovering a valid order by retry.
///
/// Every name is dropped before the first attempt. Fails with
/// [`CloneError::UnresolvedDependencies`] after the first pass that creates
/// nothing, and immediately on any error that is not an unresolved reference.
pub async fn create_in_dependency_order<S: Session + ?Sized>(
    dest: &mut S,
    kind: ObjectKind,
    definitions: Vec<ObjectDefinition>,
    ctx: &CloneContext,
) -> Result<BuildOutcome> {
    for definition in &definitions {
        ctx.ensure_not_cancelled()?;
        dest.execute(&kind.drop_statement(&definition.name))
            .await
            .map_err(|e| CloneError::statement(kind, definition.name.as_str(), e))?;
    }

    let mut pending = PendingSet::new(definitions);
    let mut created = Vec::with_capacity(pending.len());
    let mut passes = 0;

    while !pending.is_empty() {
        passes += 1;
        let attempts = pending.take();
        let before = attempts.len();
        let mut last_error = None;

        for definition in attempts {
            ctx.ensure_not_cancelled()?;
            match dest.execute(&definition.create_statement).await {
                Ok(()) => {
                    debug!("Created {} `{}` in pass {}", kind, definition.name, passes);
                    created.push(definition.name);
                }
                Err(e) => match classify(&e) {
                    ErrorClass::UnresolvedReference => {
                        debug!(
                            "{} `{}` deferred in pass {}: {}",
                            kind, definition.name, passes, e
                        );
                        last_error = Some(e);
                        pending.keep(definition);
                    }
                    ErrorClass::Fatal => {
                        return Err(CloneError::statement(kind, definition.name, e));
                    }
                },
            }
        }

        ctx.notify(format!(
            "{} pass {}: created {}, {} pending",
            kind.keyword().to_lowercase(),
            passes,
            before - pending.len(),
            pending.len()
        ));

        if pending.len() == before {
            // a pass that created nothing always recorded an error
            if let Some(source) = last_error {
                return Err(CloneError::UnresolvedDependencies {
                    kind,
                    pending: pending.names(),
                    source,
                });
            }
        }
    }

    if passes > 0 {
        info!(
            "Created {} {} object(s) in {} pass(es)",
            created.len(),
            kind,
            passes
        );
    }

    Ok(BuildOutcome { created, passes })
}
