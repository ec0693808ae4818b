pub mod config;
pub mod outline;
pub mod task;

pub use config::*;
pub use outline::*;
pub use task::*;
