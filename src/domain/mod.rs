//! Domain layer: documents, the business rules that govern them, and the
//! ports the application layer drives them through.

pub mod appointment;
pub mod events;
pub mod ids;
pub mod ports;
pub mod queue;
pub mod rating;
pub mod rules;
pub mod salon;
