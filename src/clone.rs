//! The clone entry point.

use std::collections::HashSet;
use std::fmt;

use mysql_async::Conn;
use mysql_ddl::Pipeline;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::constraint::{settle, ConstraintGuard};
use crate::data::{CopyStrategy, DataMover, DEFAULT_BATCH_SIZE};
use crate::error::{CloneError, Result};
use crate::metadata;
use crate::object::{ObjectKind, SchemaNames, TableCloneOption, TriggerDescriptor};
use crate::ordered::create_in_dependency_order;
use crate::progress::{CloneContext, Progress, ProgressCallback};
use crate::schema;

/// What to clone.
#[derive(Clone)]
pub struct CloneRequest {
    /// Tables in clone order. Names must be unique.
    pub tables: Vec<TableCloneOption>,
    pub copy_views: bool,
    pub copy_triggers: bool,
    pub copy_routines: bool,
    pub strategy: CopyStrategy,
    pub batch_size: usize,
    pub progress: Option<ProgressCallback>,
    pub cancel: CancellationToken,
}

impl Default for CloneRequest {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            copy_views: false,
            copy_triggers: false,
            copy_routines: false,
            strategy: CopyStrategy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl fmt::Debug for CloneRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloneRequest")
            .field("tables", &self.tables)
            .field("copy_views", &self.copy_views)
            .field("copy_triggers", &self.copy_triggers)
            .field("copy_routines", &self.copy_routines)
            .field("strategy", &self.strategy)
            .field("batch_size", &self.batch_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl CloneRequest {
    /// Reject duplicate table names.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(CloneError::DuplicateTable(table.name.clone()));
            }
        }
        Ok(())
    }

    fn context(&self) -> CloneContext {
        CloneContext::new(Progress::new(self.progress.clone()), self.cancel.clone())
    }
}

/// What a successful clone did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneSummary {
    pub tables_cloned: usize,
    pub rows_copied: u64,
    pub views_created: usize,
    pub triggers_created: usize,
    pub routines_created: usize,
    /// Requested names that are not base tables.
    pub skipped: Vec<String>,
}

/// Clone the requested objects from `source` into `dest`.
///
/// Foreign key checks on the destination are disabled for the duration and
/// restored before returning, whatever the outcome.
pub async fn clone_database(
    source: &mut Conn,
    dest: &mut Conn,
    request: &CloneRequest,
) -> Result<CloneSummary> {
    request.validate()?;
    let ctx = request.context();

    let guard = ConstraintGuard::acquire(dest).await?;
    let outcome = run(source, dest, request, &ctx).await;
    let restored = guard.release(dest).await;

    if let Err(e) = &outcome {
        if e.is_cancelled() {
            warn!("Clone cancelled");
        }
    }
    settle(outcome, restored)
}

async fn run(
    source: &mut Conn,
    dest: &mut Conn,
    request: &CloneRequest,
    ctx: &CloneContext,
) -> Result<CloneSummary> {
    let names = SchemaNames::new(
        metadata::current_database(source).await?,
        metadata::current_database(dest).await?,
    );
    let rewrite = Pipeline::for_destination(names.rename());
    let mut summary = CloneSummary::default();

    let catalog = metadata::list_tables(source).await?;
    let mut mover = DataMover::new(request.strategy, request.batch_size);
    let mut cloned = HashSet::new();

    for table in &request.tables {
        ctx.ensure_not_cancelled()?;

        let descriptor = catalog
            .iter()
            .find(|t| t.name == table.name)
            .ok_or_else(|| CloneError::UnknownTable(table.name.clone()))?;
        if !descriptor.is_base_table {
            ctx.notify(format!("Skipping `{}`: not a base table", table.name));
            summary.skipped.push(table.name.clone());
            continue;
        }

        ctx.notify(format!("Cloning table `{}`", table.name));
        schema::clone_table(source, dest, &table.name).await?;
        if table.copy_data {
            ctx.notify(format!("Copying data for `{}`", table.name));
            let report = mover.copy(source, dest, &table.name, ctx).await?;
            summary.rows_copied += report.rows;
        }
        summary.tables_cloned += 1;
        cloned.insert(table.name.as_str());
    }

    if request.copy_views {
        ctx.ensure_not_cancelled()?;
        let views: Vec<_> = metadata::list_views(source)
            .await?
            .into_iter()
            .map(|view| schema::prepare_view(view, &rewrite))
            .collect();
        ctx.notify(format!("Creating {} view(s)", views.len()));
        let outcome = create_in_dependency_order(dest, ObjectKind::View, views, ctx).await?;
        summary.views_created = outcome.created.len();
    }

    if request.copy_triggers {
        let triggers =
            triggers_on_cloned_tables(metadata::list_triggers(source).await?, &cloned, ctx);
        for trigger in &triggers {
            ctx.ensure_not_cancelled()?;
            ctx.notify(format!("Cloning trigger `{}`", trigger.name));
            schema::clone_trigger(dest, trigger, &names, &rewrite).await?;
            summary.triggers_created += 1;
        }
    }

    if request.copy_routines {
        for routine in metadata::list_routines(source).await? {
            ctx.ensure_not_cancelled()?;
            ctx.notify(format!(
                "Cloning {} `{}`",
                routine.kind.object_kind().keyword().to_lowercase(),
                routine.name
            ));
            schema::clone_routine(source, dest, &routine, &rewrite).await?;
            summary.routines_created += 1;
        }
    }

    info!(
        "Clone finished: {} tables, {} rows, {} views, {} triggers, {} routines",
        summary.tables_cloned,
        summary.rows_copied,
        summary.views_created,
        summary.triggers_created,
        summary.routines_created
    );
    Ok(summary)
}

/// Keep triggers whose table was cloned by this request; report the rest.
fn triggers_on_cloned_tables(
    triggers: Vec<TriggerDescriptor>,
    cloned: &HashSet<&str>,
    ctx: &CloneContext,
) -> Vec<TriggerDescriptor> {
    triggers
        .into_iter()
        .filter(|trigger| {
            let keep = cloned.contains(trigger.table.as_str());
            if !keep {
                ctx.notify(format!(
                    "Skipping trigger `{}`: table `{}` is not part of this clone",
                    trigger.name, trigger.table
                ));
            }
            keep
        })
        .collect()
}
