//! Real-time room and match coordination.
//!
//! Users join a room by code, report the items they like, and every
//! connection in the room is told when two or more members like the same
//! item.

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod protocol;
pub mod services;
