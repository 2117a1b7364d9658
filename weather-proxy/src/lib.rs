//! Server-side forwarder for the OpenWeather current-conditions endpoint.
//!
//! The proxy keeps the API key on the server, maps upstream failures to a
//! uniform `{"message": ...}` body and passes successful bodies through
//! unchanged.
//!
//! Layout follows an explicit module boundary: `config` reads the
//! environment, `routes` owns every endpoint, and `main.rs` only wires them.

pub mod config;
pub mod routes;

pub use config::ProxyConfig;
pub use routes::{ProxyState, router};
