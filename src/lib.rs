//! Dispatch tasks to a remote agent and track them until they finish.
//!
//! [`service::Relay`] is the entry point: it submits content to the agent
//! found through its agent card, keeps one background poll per run, and
//! evicts finished runs after a retention window.

pub mod banner;
pub mod clock;
pub mod config;
pub mod consts;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod policy;
pub mod poller;
pub mod reaper;
pub mod registry;
pub mod remote;
pub mod run;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod spinner;
pub mod tracker;
