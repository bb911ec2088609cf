pub mod common;
pub mod config;
pub mod diagnostics;
pub mod refresh;
pub mod reprogram;
pub mod schedule;
pub mod settings;
pub mod times;
