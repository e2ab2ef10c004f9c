//! Deskbot core library: activity types, conversation state, command/action/message handlers,
//! the backend client, the dispatch pipeline, and the HTTP messaging endpoint used by the CLI.

pub mod activity;
pub mod app;
pub mod backend;
pub mod cards;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod init;
pub mod pipeline;
pub mod storage;
