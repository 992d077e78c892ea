pub mod config;
pub mod error;
pub mod render;
pub mod session;
pub mod sse;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use config::{Config, Theme};
pub use error::{ConfigError, LineParseError, SubmitError, TransportError};
pub use render::render_markdown;
pub use session::{ChatSession, SessionObserver, TurnOutcome, APOLOGY_TEXT};
pub use sse::{parse_line, LineBuffer, StreamEvent, Utf8StreamDecoder};
pub use state::{ChatMessage, ChatRole, GenerationSettings, SessionSnapshot, Transcript};
pub use transport::{ByteStream, ChatRequest, HttpTransport, Transport};
