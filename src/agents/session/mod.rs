pub mod context;
pub mod interaction;
pub mod orchestrator;

pub use context::{CycleJournal, SessionLedger, SessionLog, SessionRecord, SessionStatus};
pub use interaction::{Presenter, TerminalPresenter};
pub use orchestrator::{SessionOrchestrator, survey};
