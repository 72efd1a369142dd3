//! Chat platform interface for the colleague quiz bot.
//!
//! - **Commands** (`commands`) - `/cquiz create|list|start|help` parsing and routing
//! - **Events** (`events`) - slash commands and direct-channel posts dispatched to handlers
//! - **Gateway** (`gateway`) - outbound messages and user/channel directory lookups
//! - **Transport** (`socket`) - inbound event loop feeding the dispatcher
//!
//! ```text
//! Transport → EventDispatcher → Handlers → quiz services → QuizStore
//!                                   ↓
//!                  ChatGateway ← prompts, replies, reveal posts
//! ```

pub mod commands;
pub mod events;
pub mod gateway;
pub mod socket;
