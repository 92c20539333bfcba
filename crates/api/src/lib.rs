//! HTTP API: server bootstrap, routing, auth middleware, and the
//! request/response mapping onto the queue engine.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
