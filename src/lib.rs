//! Mutating admission webhook front end.
//!
//! A TLS server that receives Kubernetes admission reviews on `/mutate`, hands the raw
//! payload to a [`mutate::Mutator`], and returns the result. `/` answers health probes.
//! On SIGTERM or SIGINT the server stops accepting connections and drains in-flight
//! requests for a bounded time before returning.

pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod mutate;
pub mod routes;
pub mod state;

pub use error::AppError;
