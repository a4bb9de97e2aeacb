//! Build-time extraction, rewriting and caching of GROQ queries embedded in
//! JavaScript and TypeScript sources.
//!
//! ```text
//! sources ──► extract ──► rewrite ──► engine ──► cache ◄── lookup (render time)
//!                                        │
//!                                        └──► pages (page queries)
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod extract;
pub mod logger;
pub mod pages;
pub mod rewrite;
pub mod utils;
pub mod watch;
