// Domain layer - Composition model, validation rules and job records

pub mod errors;
pub mod job;
pub mod model;
pub mod rules;
