//! A mutating admission webhook that injects the Tyk mesh sidecar into annotated Pods and
//! Services, and registers the workload's routes (and, with mesh TLS, its certificates) with the
//! gateway while doing so.

pub mod admission;
pub mod ca;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod patch;
pub mod policy;
pub mod processor;
pub mod registration;
pub mod server;
pub mod sidecar;

#[cfg(test)]
mod tests;
