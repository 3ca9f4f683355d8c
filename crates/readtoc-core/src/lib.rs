//! Reactive table-of-contents engine for long-form article pages
//!
//! The engine measures an article inside a host [`dom::Document`], keeps the
//! heading list, the active heading and the height of any sticky topbar up to
//! date as observable [`stream::Stream`]s, and hands them to a
//! [`toc::Renderer`]. [`session::TocSession`] drives one page and
//! [`ipc::CommandServer`] exposes it to external controllers.

pub mod active;
pub mod config;
pub mod content;
pub mod dom;
pub mod error;
pub mod events;
pub mod host;
pub mod ipc;
pub mod preferences;
pub mod scroll;
pub mod session;
pub mod stream;
pub mod toc;
pub mod topbar;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, EasingType, ScrollConfig};
pub use dom::{Document, MemoryDocument, SharedDocument};
pub use error::{Error, Result};
pub use ipc::{CommandClient, CommandServer};
pub use preferences::{FilePreferences, MemoryPreferences, Preferences};
pub use session::{Command, TocSession};
pub use stream::Stream;
pub use toc::{Renderer, Toc, TocOptions, TocProps};
