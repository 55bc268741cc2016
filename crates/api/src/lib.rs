//! HTTP gateway: configuration, routing and the transform pipeline.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;
pub mod tls;
