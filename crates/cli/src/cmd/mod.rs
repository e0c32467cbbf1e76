//! CLI command implementations

pub mod config;
pub mod deindex;
pub mod index;
pub mod select;
pub mod view;
