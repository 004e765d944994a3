//! Host-facing side of the lookup control.

pub mod control;
pub mod event;
pub mod presenter;
