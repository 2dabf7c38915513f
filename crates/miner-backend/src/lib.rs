pub mod adapter;
pub mod openai_compat;
pub mod registry;
pub mod test_backend;
pub mod types;

pub use adapter::BackendAdapter;
pub use test_backend::TestModeAdapter;
pub use types::{
    BackendError, ChatCompletionRequest, ChatMessage, InferenceResult, TokenUsage, ToolCall,
    ToolDefinition,
};
