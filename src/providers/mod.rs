pub mod relay;
pub mod traits;
pub mod types;

pub use relay::RelayBackend;
pub use traits::AssistantBackend;
pub use types::ProviderError;
