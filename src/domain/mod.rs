// Domain module: instance entities, the solver-facing model, and schedules

pub mod instance;
pub mod models;
pub mod schedule;
pub mod solver_service;
pub mod value_objects;

pub use instance::*;
pub use models::*;
pub use schedule::*;
pub use solver_service::*;
pub use value_objects::*;
