//! Command protocol over a Unix socket
//!
//! A [`CommandServer`] exposes one [`crate::TocSession`] to external
//! controllers (a toolbar button, a keyboard shortcut daemon, the `readtoc
//! send` subcommand), which talk to it through a [`CommandClient`].

mod client;
mod protocol;
mod server;

pub use client::{is_server_running, CommandClient};
pub use protocol::*;
pub use server::CommandServer;
