//! 核心编排层：错误类型、会话监管、任务协调器、事件流

pub mod coordinator;
pub mod error;
pub mod session_supervisor;
pub mod stream;

pub use coordinator::{TaskCoordinator, TaskOutcome, TaskPhase, PLANNING_NOTICE};
pub use error::{AbortCode, AgentError};
pub use session_supervisor::SessionSupervisor;
pub use stream::{EventSink, TaskStream};
