//! Systems module - the simulation core and the ECS systems that drive it.

pub mod bridge;
pub mod collision;
pub mod combat;
pub mod debug;
pub mod lifecycle;
pub mod trajectory;
