//! Clinika client - session state and request orchestration for the
//! Clinika medical assistant
//!
//! A [`session::Session`] holds the conversation log, the bound patient
//! context and the single-flight operation state. The pure
//! [`state_machine::transition()`] function decides what every user action
//! and every backend settlement does to it, and the [`runtime`] task applies
//! those decisions and talks to the assistant service through a
//! [`backend::Backend`].

pub mod backend;
pub mod config;
pub mod download;
pub mod runtime;
pub mod session;
pub mod state_machine;
