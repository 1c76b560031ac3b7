pub mod attachment;
pub mod conversation;
pub mod frame;
pub mod identity;

pub use attachment::{AttachmentRef, UploadedFile};
pub use conversation::ConversationRecord;
pub use frame::{FrameMessage, FrameMessageType};
pub use identity::UserKey;
