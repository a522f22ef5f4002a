//! JavaScript evaluation.

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::event::exception_text;
use crate::protocol::{Command, RuntimeCommand};

use super::Page;

// ============================================================================
// Page - Script Execution
// ============================================================================

impl Page {
    /// Calls `function` with JSON `args` in the page and returns its result.
    ///
    /// `function` is JavaScript function source; arguments are embedded as
    /// JSON literals, so only plain data crosses the boundary. A returned
    /// promise is awaited.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sum = page.evaluate("(a, b) => a + b", &[json!(2), json!(3)]).await?;
    /// assert_eq!(sum, json!(5));
    /// ```
    ///
    /// # Errors
    ///
    /// - [`Error::ScriptError`] if the script throws or the promise rejects
    /// - any session or protocol error
    pub async fn evaluate(&self, function: &str, args: &[Value]) -> Result<Value> {
        let args = args
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?
            .join(", ");

        self.evaluate_expression(&format!("({function})({args})"))
            .await
    }

    /// Evaluates a JavaScript expression and returns its value.
    ///
    /// Values JSON cannot carry (`NaN`, `Infinity`, `-0`, bigints) come back
    /// as their string form; `undefined` comes back as `null`.
    pub async fn evaluate_expression(&self, expression: &str) -> Result<Value> {
        debug!(target_id = %self.target_id(), len = expression.len(), "Evaluating script");

        let result = self
            .send_command(Command::Runtime(RuntimeCommand::Evaluate {
                expression: expression.to_string(),
                return_by_value: true,
                await_promise: true,
            }))
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            return Err(Error::script_error(exception_text(details)));
        }

        let remote = result.get("result").unwrap_or(&Value::Null);
        if let Some(value) = remote.get("value") {
            return Ok(value.clone());
        }
        if let Some(unserializable) = remote.get("unserializableValue") {
            return Ok(unserializable.clone());
        }
        Ok(Value::Null)
    }
}
