//! ragchat - terminal client for a retrieval-augmented chat backend
//!
//! The [`chat`] module holds the session controller; [`backend`] is the
//! HTTP seam it talks through. Everything else is the binary's plumbing.

pub mod backend;
pub mod chat;
pub mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod repl;
pub mod startup;
pub mod storage;
pub mod util;
