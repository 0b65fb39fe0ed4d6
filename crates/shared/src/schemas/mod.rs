// crates/shared/src/schemas/mod.rs
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Panics on an unknown name; only called from `register_toolbelt!`
    /// expansions, so a typo surfaces the first time the schemas are built.
    pub fn from_json_type(name: &str) -> Self {
        match name {
            "string" => ParamType::String,
            "integer" => ParamType::Integer,
            "number" => ParamType::Number,
            "boolean" => ParamType::Boolean,
            "array" => ParamType::Array,
            "object" => ParamType::Object,
            other => panic!("unsupported parameter type '{}'", other),
        }
    }

    pub fn json_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParameterSchema {
    pub name: &'static str,
    pub param_type: ParamType,
    pub description: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSchema>,
}

/// What the model sees of a tool: name, description and JSON schema.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    pub fn name(&self) -> &str {
        &self.function.name
    }
}

impl ToolSchema {
    pub fn to_descriptor(&self) -> ToolDescriptor {
        let mut properties = json!({});
        let mut required = vec![];

        for param in &self.parameters {
            properties[param.name] = json!({
                "type": param.param_type.json_name(),
                "description": param.description
            });
            if param.required {
                required.push(param.name);
            }
        }

        ToolDescriptor {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: self.name.to_string(),
                description: self.description.to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": properties,
                    "required": required
                }),
            },
        }
    }

    /// Checks an argument object against the declared parameters.
    /// Returns a human readable reason on the first mismatch.
    pub fn validate(&self, args: &Map<String, Value>) -> Result<(), String> {
        for param in &self.parameters {
            match args.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(format!("missing required parameter '{}'", param.name));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(format!(
                        "parameter '{}' must be of type {}, got {}",
                        param.name,
                        param.param_type.json_name(),
                        value
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(extra) = args
            .keys()
            .find(|key| !self.parameters.iter().any(|p| p.name == key.as_str()))
        {
            return Err(format!("unknown parameter '{}'", extra));
        }

        Ok(())
    }
}

pub type ToolHandler = Arc<dyn Fn(Map<String, Value>) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Boxes an async closure into a [`ToolHandler`].
pub fn handler_fn<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |args: Map<String, Value>| -> BoxFuture<'static, anyhow::Result<Value>> {
        Box::pin(f(args))
    })
}

/// A registered tool: its schema plus the callable behind it.
#[derive(Clone)]
pub struct ToolSpec {
    pub schema: ToolSchema,
    pub handler: ToolHandler,
}

impl ToolSpec {
    pub fn new(schema: ToolSchema, handler: ToolHandler) -> Self {
        Self { schema, handler }
    }

    pub fn name(&self) -> &'static str {
        self.schema.name
    }

    pub fn description(&self) -> &'static str {
        self.schema.description
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        self.schema.to_descriptor()
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}
