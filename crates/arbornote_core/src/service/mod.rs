//! Use-case services above the repository layer.

pub mod subtree_service;

pub use subtree_service::{
    ReconcileError, ReconcileOptions, ReconcilerState, SubtreeCheckOutcome, SubtreeService,
};
