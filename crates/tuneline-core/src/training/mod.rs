//! Local training backends.

pub mod bigram_trainer;

pub use bigram_trainer::BigramAdapterBackend;
