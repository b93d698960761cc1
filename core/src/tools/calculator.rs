use crate::tools::{extract_f64_arg, extract_string_arg};
use crate::traits::{Tool, ToolContext};
use async_trait::async_trait;
use serde_json::json;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Perform a basic arithmetic operation on two numbers"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["add", "subtract", "multiply", "divide"],
                    "description": "Arithmetic operation to apply"
                },
                "a": { "type": "number", "description": "Left operand" },
                "b": { "type": "number", "description": "Right operand" }
            },
            "required": ["operation", "a", "b"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _context: &ToolContext,
    ) -> anyhow::Result<serde_json::Value> {
        let operation = extract_string_arg(&params, "operation")?;
        let a = extract_f64_arg(&params, "a")?;
        let b = extract_f64_arg(&params, "b")?;

        let value = match operation.as_str() {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    anyhow::bail!("Cannot divide by zero");
                }
                a / b
            }
            other => anyhow::bail!("Unsupported operation: {}", other),
        };

        Ok(json!(value))
    }
}
