pub mod health;
pub mod maintainers;
pub mod metrics;
pub mod packages;
pub mod state;
