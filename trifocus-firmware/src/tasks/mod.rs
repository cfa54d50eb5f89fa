//! Embassy async tasks
//!
//! The step and limit tasks run on the highest-priority interrupt executor,
//! the control tick on the next one down, everything else in thread mode.

pub mod comms;
pub mod limit;
pub mod notify;
pub mod persistence;
pub mod status;
pub mod step;
pub mod tick;

pub use comms::{comms_rx_task, comms_tx_task};
pub use limit::limit_task;
pub use notify::notify_task;
pub use persistence::persistence_task;
pub use status::status_task;
pub use step::step_task;
pub use tick::tick_task;
