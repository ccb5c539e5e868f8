//! Built-in calculations
//!
//! Small utilities that every deployment gets for free. Real raster
//! work is registered by downstream crates; these exist so scripts can
//! log progress and materialize marker files without extra tooling.

use linkme::distributed_slice;
use tracing::{debug, info};

use gridflow_foundation::TypeKind;

use crate::{ArgSpec, CALCULATIONS, CalcContext, CalcDescriptor, CalcError};

#[distributed_slice(CALCULATIONS)]
static ECHO: CalcDescriptor = CalcDescriptor {
    name: "Echo",
    summary: "Write a message to the pipeline log",
    signature: &[ArgSpec::input("Message", TypeKind::Str)],
    run: echo,
};

fn echo(ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    let mut cursor = ctx.cursor();
    let message = cursor.next_str()?;
    cursor.finish()?;
    info!(target: "pipeline", "{message}");
    Ok(())
}

#[distributed_slice(CALCULATIONS)]
static TOUCH_FILE: CalcDescriptor = CalcDescriptor {
    name: "TouchFile",
    summary: "Create an empty file at the target path",
    signature: &[ArgSpec::output("Target", TypeKind::File)],
    run: touch_file,
};

fn touch_file(ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
    let mut cursor = ctx.cursor();
    let target = cursor.next_path()?;
    cursor.finish()?;
    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
        && !ctx.probe().is_directory(parent)
    {
        return Err(CalcError::Failed(format!(
            "output directory '{}' does not exist",
            parent.display()
        )));
    }
    std::fs::File::create(target)?;
    debug!(path = %target.display(), "touched");
    Ok(())
}
