//! Command handlers

pub mod extract;
pub mod list;
