// Public modules
pub mod channel;
pub mod frame;
pub mod message;
pub mod user;

// Re-exports
pub use channel::Channel;
pub use frame::{ControlFrame, InboundEvent};
pub use message::Message;
pub use user::User;
