pub mod attachments;
pub mod database;
pub mod gateway;
pub mod location;
pub mod locks;
pub mod quote;
pub mod session;
pub mod transcript;

pub use attachments::AttachmentEncoder;
pub use database::Database;
pub use gateway::AssistantGateway;
pub use quote::{QuoteFlow, QuoteSession};
pub use session::SessionResolver;
pub use transcript::TranscriptStore;
