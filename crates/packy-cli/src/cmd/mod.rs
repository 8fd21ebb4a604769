pub mod config;
pub mod cycle;
pub mod maintainer;
pub mod serve;
