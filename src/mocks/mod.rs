//! In-memory implementations for testing.
//!
//! The mock ledger keeps all coordinator state behind a single mutex, so
//! each operation is genuinely atomic with respect to concurrent tasks,
//! matching the guarantee the Redis commands give across processes. Integration
//! tests exercise the promotion engine and expiration pipeline against
//! these at memory speed.

pub mod ledger;
pub mod mirror;
pub mod notifier;
pub mod repos;
pub mod scheduler;

pub use ledger::MockLedger;
pub use mirror::MockMirror;
pub use notifier::RecordingNotifier;
pub use repos::{MockEventRepository, MockUserRepository};
pub use scheduler::RecordingScheduler;
