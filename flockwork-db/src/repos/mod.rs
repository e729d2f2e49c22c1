//! Repository modules for database operations

pub mod agents;
pub mod conversations;

pub use agents::AgentRunRepository;
pub use conversations::ConversationRepository;
