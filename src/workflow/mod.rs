pub mod pending_change;
pub mod update_ctx;
pub mod update_flow;

pub use pending_change::PendingChange;
pub use update_ctx::UpdateCtx;
pub use update_flow::UpdateFlow;
