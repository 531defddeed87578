//! pgswitch - minimal-downtime schema updates for PostgreSQL clusters
//! fronted by pgbouncer
//!
//! One invocation discovers which pool fronts the master, pauses
//! streaming replication, takes the master out of the pool, applies the
//! schema and security changes in a single transaction, and brings the
//! cluster back, undoing whatever it started if anything fails.

pub mod admin;
pub mod cli;
pub mod failover;
pub mod observability;
pub mod policy;
pub mod pool;
pub mod preflight;
pub mod steps;
pub mod streaming;
pub mod topology;
