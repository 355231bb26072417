pub mod conversation;
pub mod language;
pub mod message;

pub use conversation::{Conversation, ConversationWithMessages};
pub use language::{language_name, Language, LANGUAGES};
pub use message::{Message, NewMessage, Role, ValidationError};
