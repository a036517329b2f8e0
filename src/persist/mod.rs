//! Conversation persistence: the append/seal writer and the text formats it
//! embeds in messages.

pub mod directive;
pub mod recovery;
pub mod resume;
pub mod writer;

pub use directive::ToolCallDirective;
pub use recovery::{RecoveryMarker, DEFAULT_RECOVERY_PROMPT};
pub use resume::{detect_unresolved, UnresolvedTurn};
pub use writer::ConversationWriter;
