//! Interactive channels: console prompts and a scripted replay for tests.

pub mod console;
pub mod scripted;

pub use console::ConsoleChannel;
pub use scripted::ScriptedChannel;
