// Public modules
pub mod channel;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod observability;
pub mod render;
pub mod session;
pub mod types;

// Re-exports
pub use channel::{ChannelResolver, resolve, send_message};
pub use client::{ApiClient, ApiResponse, RequestClient};
pub use config::{ConfigStore, SessionContext};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, RenderedMessage, Renderer, render_message};
pub use session::{SessionState, StreamSession, Termination, unless_cancelled};
pub use types::*;
