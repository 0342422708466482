//! Account Service - user accounts behind a shared-counter rate limiter
//!
//! This crate implements a user-account HTTP API (registration, login,
//! self-profile) whose routes are guarded by fixed-window admission control.
//! Counters live in Redis so every instance of the service shares one budget
//! per client address or per user.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod http;
pub mod ratelimit;
pub mod user;
