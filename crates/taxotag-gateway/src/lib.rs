//! # taxotag-gateway
//!
//! A small HTTP gateway that accepts OpenAI-style requests, merges default
//! request parameters into the JSON body, and forwards them to an upstream
//! LLM router whose paths differ from the OpenAI ones.

pub mod config;
pub mod proxy;

pub use config::GatewayConfig;
pub use proxy::{app_router, merge_defaults, GatewayError, GatewayState};
