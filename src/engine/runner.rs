//! Running a single template block

use tracing::{debug, warn};

use crate::executor::statements::execute_source;
use crate::executor::{Control, Interpreter, ScriptContext, ScriptError, Services, Val};
use crate::host::CancellationChecker;
use crate::template::{BlockKind, TemplateBlock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    /// Text that replaces the block, including inline error markers
    Output(String),
    Cancelled,
}

/// Run `block` against `ctx` and produce its fragment.
///
/// Faults become inline markers; only cancellation escapes.
pub fn run_block(
    services: &Services,
    ctx: &mut ScriptContext,
    block: &TemplateBlock,
    cancel: &dyn CancellationChecker,
) -> BlockOutcome {
    if ctx.return_requested() {
        debug!(block = block.index, "Skipping block after return");
        return BlockOutcome::Output(String::new());
    }
    if cancel.check_cancelled().is_err() {
        return BlockOutcome::Cancelled;
    }

    ctx.clear_iteration_cache();
    services.trace.block_started(block.index, block.kind, &block.code);
    let result = match block.kind {
        BlockKind::Interpolation => interpolate(services, ctx, block, cancel),
        BlockKind::Execution => execute(services, ctx, block, cancel),
    };

    let output = match result {
        Ok(output) => output,
        Err(ScriptError::Cancelled) => return BlockOutcome::Cancelled,
        Err(ScriptError::Parse(failure)) => {
            warn!(block = block.index, error = %failure, "Block failed to parse");
            format!("[Parse error: {}]", failure)
        }
        Err(err) => {
            warn!(block = block.index, error = %err, "Block failed");
            format!("[Error: {}]", err.message())
        }
    };

    if services.trace.wants_snapshots() {
        services.trace.variables(block.index, &ctx.variables());
    }
    services.trace.block_finished(block.index, &output);
    BlockOutcome::Output(output)
}

fn interpolate(
    services: &Services,
    ctx: &mut ScriptContext,
    block: &TemplateBlock,
    cancel: &dyn CancellationChecker,
) -> Result<String, ScriptError> {
    let code = block.code.trim();
    if code.is_empty() {
        return Ok(String::new());
    }
    let mut interp = Interpreter::new(ctx, services, cancel).with_block(block.index);
    Ok(match interp.evaluate(code)? {
        Val::Undefined | Val::Null => String::new(),
        value => value.to_display_string(),
    })
}

fn execute(
    services: &Services,
    ctx: &mut ScriptContext,
    block: &TemplateBlock,
    cancel: &dyn CancellationChecker,
) -> Result<String, ScriptError> {
    ctx.reset_accumulator();
    let control = {
        let mut interp = Interpreter::new(ctx, services, cancel).with_block(block.index);
        execute_source(&mut interp, &block.code)
    };
    ctx.finalize_builders();

    if let Control::Return(value) = control? {
        debug!(block = block.index, "Return requested");
        ctx.request_return(value);
    }
    Ok(ctx.accumulated_output())
}
