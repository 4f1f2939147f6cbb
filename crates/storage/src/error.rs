// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the storage layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("row not found")]
    NotFound,

    #[error("invalid row data: {0}")]
    InvalidRow(String),

    #[error(transparent)]
    Core(#[from] orch_core::CoreError),
}

pub type Result<T> = std::result::Result<T, StorageError>;
