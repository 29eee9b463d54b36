#![deny(missing_docs)]
//! Node Gate Bot
//!
//! A Telegram bot that serves FAQ-style nodes from a menu, optionally
//! guarded by a secret code, and delivers text, photo or voice content
//! kept in MinIO.

/// Telegram bot implementation
pub mod bot;
/// Node catalog and personal answers
pub mod catalog;
/// Configuration management
pub mod config;
/// Content resolution through the fetch gate
pub mod content;
/// Media delivery and handle cache
pub mod delivery;
/// Conversation state machine
pub mod engine;
/// Per-chat conversation service
pub mod service;
/// Object store access (MinIO / S3)
pub mod storage;
/// Transport-agnostic messaging interfaces
pub mod transport;
