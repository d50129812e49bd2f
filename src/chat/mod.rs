mod message;

pub use message::{Badge, ChatMessage, ChatSender};
