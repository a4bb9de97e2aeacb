//! Utility modules for source discovery and watch routing.

pub mod category;
pub mod files;
