// ports/mod.rs — external collaborators the core consumes (spec.md §6).
// Interfaces only: the exchange, the strategy, the persistence tables and the
// notification sink are treated as black boxes implementing these traits.
pub mod exchange;
pub mod notification;
pub mod persistence;
pub mod strategy;
