//! Data models for session entities.

mod entry;
mod image;
mod snapshot;

pub use entry::{ConversationEntry, EntryId, META_CONTEXT_USED, META_TOKEN_COUNT};
pub use self::image::{GeneratedImage, ImageId};
pub use snapshot::{format_duration, SessionSnapshot};
