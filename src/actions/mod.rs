//! File actions: removal of the duplicates an analysis marks as redundant.
//!
//! Files go to the system trash by default, or are removed permanently
//! with `--permanent`. Each file's size is checked against the catalog
//! first.

pub mod delete;

pub use delete::{
    delete_batch, delete_to_trash, permanent_delete, removal_targets, validate_preserves_copy,
    verify_size, BatchDeleteResult, DeleteConfig, DeleteError, DeleteResult, RemovalTarget,
};
