use serde_json::Value;

use crate::dispatcher::{CommandDispatcher, Workspace};
use crate::error::AppError;

use super::{Command, CommandOutput};

/// Decode a (name, arguments) pair and execute it.
/// This is the single entry point for surfaces that speak raw tool calls
/// (CLI `run`, HTTP `commands`).
pub fn execute_tool_call(
    dispatcher: &CommandDispatcher,
    ws: &mut Workspace,
    name: &str,
    input: &Value,
) -> Result<CommandOutput, AppError> {
    let cmd = Command::from_tool_call(name, input).map_err(|e| AppError::invalid(e.to_string()))?;
    dispatcher.execute(ws, cmd)
}
