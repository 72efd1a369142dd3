//! Colleague quiz bot service: prompt scheduler, direct-message conversations,
//! `/cquiz` commands and channel reveals wired over the shared quiz store.

pub mod bootstrap;
pub mod conversation;
pub mod quiz_commands;
pub mod reveal;
pub mod runtime;
pub mod scheduler;
pub mod shutdown;
pub mod workflow;

#[cfg(test)]
mod testing;
