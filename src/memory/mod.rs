//! 对话记忆：Agent 运行轨迹

pub mod conversation;

pub use conversation::{Conversation, FunctionCall, Message, Role};
