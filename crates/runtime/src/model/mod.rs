pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, Message, ModelRequest, ModelResponse, Part, Role, ToolArguments, ToolCall,
    ToolChoice, ToolResult, ToolSpec, Usage,
};
