// Session module - Session management
pub mod manager;
pub mod queue;
pub mod session;

pub use manager::{SessionManager, SessionSummary};
pub use queue::{CommandQueue, DrainState};
pub use session::{Session, EVENT_CAPACITY};
