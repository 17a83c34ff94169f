//! Turnstile: a first-come-first-served ticketing queue.
//!
//! Demand for a limited seat pool far exceeds supply, so buyers are
//! throttled through a serialized queue and admitted in join order to a
//! short payment window. The concurrency core:
//!
//! - [`ledger`]: the seat counter, queue order, active markers, and
//!   expiration fences, all mediated by coordinator (Redis) atomics;
//! - [`store`]: the durable Postgres mirror of queue entries and
//!   reservations, written after every ledger commit;
//! - [`engine`]: the promotion engine (decrement-first admission) and the
//!   idempotent expiration pipeline that returns abandoned seats;
//! - [`queue`] and [`payment`]: the join and payment protocols;
//! - [`notify`]: best-effort per-user push over WebSockets.
//!
//! Under arbitrary concurrency and partial failure, successful reservations
//! never exceed the declared seat count, and every released seat is
//! returned exactly once.

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mocks;
pub mod notify;
pub mod payment;
pub mod queue;
pub mod server;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{QueueError, Result};
