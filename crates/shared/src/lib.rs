// crates/shared/src/lib.rs
pub mod errors;
pub mod events;
pub mod macros;
pub mod messages;
pub mod registry;
pub mod schemas;
pub mod toolbelts;

#[doc(hidden)]
pub use once_cell;

pub use errors::{RegistryError, ToolError};
pub use messages::{Message, Role, Route, ToolCallRequest, ToolResult};
pub use registry::{ToolRegistry, Toolbelt};
pub use schemas::{handler_fn, ParamType, ParameterSchema, ToolDescriptor, ToolHandler, ToolSchema, ToolSpec};
