pub mod db;

pub use db::{
    claim_import_batch, create_db, create_memory_db, find_batch_by_hash, get_import_batch,
    get_import_batches, get_pending_statement_transactions, get_statement_transaction,
    mark_import_failed, reclaim_import_batch, record_extraction, review_statement_transaction,
    BatchClaim, DbPool, ImportBatch, ImportStatus, StagedTransaction, StorageError,
};
