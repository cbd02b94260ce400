//! # engine_component
//!
//! Identity primitives shared by every layer of the scheduler.
//!
//! This crate provides:
//!
//! - [`Entity`] and [`ComponentId`]: `u64` handles, allocated by
//!   [`IdAllocator`] and never reused.
//! - [`ComponentTypeId`]: deterministic per-type tags (FNV-1a of the name).
//! - [`Pool`]: indexed vector with swap-remove, used for the live registry
//!   and the deferred-mutation queues.

pub mod component;
pub mod entity;
pub mod handle;
pub mod pool;

pub use component::{ComponentAllocator, ComponentId, ComponentTypeId};
pub use entity::{Entity, EntityAllocator};
pub use handle::{Handle, IdAllocator};
pub use pool::{OverflowPolicy, Pool, PoolError};
