//! Script step.

use crate::pipeline::context::ExecutionContext;
use crate::scripting::CompiledScripts;
use crate::types::Value;

/// Run the step's script over the value as text.
///
/// The compiled script is reused across runs while the source is unchanged.
/// A fatal engine error tears the engine down; the next script step builds a
/// new one.
pub fn script(
    value: &mut Value,
    params: &str,
    index: usize,
    ctx: &mut ExecutionContext,
    scripts: &mut CompiledScripts,
) -> Result<(), String> {
    let input = value.clone().into_string()?;

    let engine = ctx.script_engine();
    let compiled = scripts
        .get_or_compile(engine, index, params)
        .map_err(|e| e.to_string())?;

    match engine.execute(compiled.ast(), &input) {
        Ok(Some(output)) => *value = Value::String(output),
        Ok(None) => *value = Value::None,
        Err(e) => {
            if e.is_fatal() {
                ctx.teardown_script_engine(e.message());
            }
            return Err(e.to_string());
        }
    }
    Ok(())
}
