//! Cross-crate scenarios driving the full HTTP router.

#[cfg(test)]
pub mod harness;

#[cfg(test)]
mod degradation;
#[cfg(test)]
mod idempotency;
#[cfg(test)]
mod runtime;
#[cfg(test)]
mod security;
#[cfg(test)]
mod server;
#[cfg(test)]
mod webhook_flow;
