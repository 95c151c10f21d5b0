//! Drop-and-recreate of tables, routines and triggers on the destination.

use mysql_async::Conn;
use mysql_ddl::Pipeline;
use tracing::debug;

use crate::error::{CloneError, Result};
use crate::metadata;
use crate::object::{ObjectDefinition, ObjectKind, RoutineDescriptor, SchemaNames, TriggerDescriptor};
use crate::session::Session;

async fn run<S: Session + ?Sized>(
    dest: &mut S,
    kind: ObjectKind,
    name: &str,
    sql: &str,
) -> Result<()> {
    dest.execute(sql)
        .await
        .map_err(|e| CloneError::statement(kind, name, e))
}

/// Copy a table's structure from `source` to `dest`.
pub async fn clone_table<S: Session + ?Sized>(
    source: &mut Conn,
    dest: &mut S,
    name: &str,
) -> Result<()> {
    let create_statement = metadata::show_create_table(source, name).await?;
    recreate_table(dest, name, &create_statement).await
}

/// Drop `name` on the destination and run the source's create-statement verbatim.
pub async fn recreate_table<S: Session + ?Sized>(
    dest: &mut S,
    name: &str,
    create_statement: &str,
) -> Result<()> {
    run(dest, ObjectKind::Table, name, &ObjectKind::Table.drop_statement(name)).await?;
    run(dest, ObjectKind::Table, name, create_statement).await?;
    debug!("Recreated table `{}`", name);
    Ok(())
}

/// Copy a stored function or procedure from `source` to `dest`.
pub async fn clone_routine<S: Session + ?Sized>(
    source: &mut Conn,
    dest: &mut S,
    routine: &RoutineDescriptor,
    rewrite: &Pipeline,
) -> Result<()> {
    let create_statement = metadata::show_create_routine(source, routine).await?;
    recreate_routine(dest, routine, &create_statement, rewrite).await
}

pub async fn recreate_routine<S: Session + ?Sized>(
    dest: &mut S,
    routine: &RoutineDescriptor,
    create_statement: &str,
    rewrite: &Pipeline,
) -> Result<()> {
    let kind = routine.kind.object_kind();
    run(dest, kind, &routine.name, &kind.drop_statement(&routine.name)).await?;
    run(dest, kind, &routine.name, &rewrite.apply(create_statement)).await?;
    debug!("Recreated {} `{}`", kind, routine.name);
    Ok(())
}

/// Rebuild a trigger from its catalog fields against the destination schema.
pub async fn clone_trigger<S: Session + ?Sized>(
    dest: &mut S,
    trigger: &TriggerDescriptor,
    names: &SchemaNames,
    rewrite: &Pipeline,
) -> Result<()> {
    let kind = ObjectKind::Trigger;
    let create_statement = trigger_statement(trigger, names, rewrite);
    run(dest, kind, &trigger.name, &kind.drop_statement(&trigger.name)).await?;
    run(dest, kind, &trigger.name, &create_statement).await?;
    debug!("Recreated trigger `{}` on `{}`", trigger.name, trigger.table);
    Ok(())
}

pub fn trigger_statement(
    trigger: &TriggerDescriptor,
    names: &SchemaNames,
    rewrite: &Pipeline,
) -> String {
    rewrite.apply(&trigger.parts().to_create_statement(names.rename()))
}

/// A view definition ready for the destination.
pub fn prepare_view(view: ObjectDefinition, rewrite: &Pipeline) -> ObjectDefinition {
    let create_statement = rewrite.apply(&view.create_statement);
    ObjectDefinition {
        name: view.name,
        create_statement,
    }
}
