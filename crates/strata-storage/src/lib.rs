//! # Strata Storage
//!
//! Chunked, column-oriented in-memory storage for StrataDB:
//! - Zero-suppression integer codecs (fixed-size byte-aligned, SIMD-BP128)
//! - Value, dictionary, run-length, and reference columns
//! - Row-group ("chunk") tables with an append/seal protocol
//! - Chunk re-encoding
//! - A process-wide storage manager and table statistics

pub mod chunk;
pub mod column;
pub mod encoding;
pub mod statistics;
pub mod storage_manager;
pub mod table;
pub mod zs;

pub use chunk::Chunk;
pub use column::{
    Column, ColumnVisitor, DictionaryColumn, PosList, ReferenceColumn, RunLengthColumn,
    TypedValues, ValueColumn,
};
pub use encoding::{encode_chunk, encode_dictionary, encode_run_length, ChunkEncoding};
pub use statistics::{generate_table_statistics, ColumnStatistics, TableStatistics};
pub use storage_manager::StorageManager;
pub use table::{SharedTable, Table};
pub use zs::{encode_by_zs_type, fixed_size_type_for, ZsDecoder, ZsType, ZsVector};
