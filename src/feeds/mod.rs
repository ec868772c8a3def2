pub mod health;

pub use health::{ping_health, KeepAliveMonitor};
