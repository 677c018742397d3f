//! Telegram Bot API adapter: chat channel for the admin plus report delivery.

pub mod client;
pub mod mapper;

pub use client::TelegramBot;
