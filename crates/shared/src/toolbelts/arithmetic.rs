// crates/shared/src/toolbelts/arithmetic.rs
use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

use crate::register_toolbelt;

#[derive(Default)]
pub struct Arithmetic;

register_toolbelt! {
    Arithmetic {
        description: "Basic arithmetic on two numbers",
        tools: {
            "multiply" => multiply {
                description: "Tool use to multiply two numbers in parameters a and b",
                params: [
                    "a": "number" => "First factor",
                    "b": "number" => "Second factor"
                ]
            },
            "add" => add {
                description: "Tool use to add two numbers in parameters a and b",
                params: [
                    "a": "number" => "First addend",
                    "b": "number" => "Second addend"
                ]
            }
        }
    }
}

impl Arithmetic {
    async fn multiply(&self, args: &Map<String, Value>) -> Result<Value> {
        apply(args, i64::checked_mul, |a, b| a * b)
    }

    async fn add(&self, args: &Map<String, Value>) -> Result<Value> {
        apply(args, i64::checked_add, |a, b| a + b)
    }
}

/// Integer inputs stay integers unless the operation overflows.
fn apply(
    args: &Map<String, Value>,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let a = operand(args, "a")?;
    let b = operand(args, "b")?;

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(result) = int_op(x, y) {
            return Ok(json!(result));
        }
    }

    let x = a.as_f64().ok_or_else(|| anyhow!("'a' is not a number"))?;
    let y = b.as_f64().ok_or_else(|| anyhow!("'b' is not a number"))?;
    let result = float_op(x, y);
    if !result.is_finite() {
        return Err(anyhow!("result is not a finite number"));
    }
    Ok(json!(result))
}

fn operand<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a Value> {
    args.get(name)
        .filter(|v| v.is_number())
        .ok_or_else(|| anyhow!("'{}' must be a number", name))
}
