//! Persistence contracts and SQLite implementations.

pub mod graph_repo;

pub use graph_repo::{
    GraphRepoError, GraphRepoResult, GraphRepository, NewNote, SqliteGraphRepository,
};
