pub mod hash;
pub mod ofx;

pub use hash::content_hash;
pub use ofx::{
    ExtractError, ExtractOptions, StatementExtraction, StatementExtractor,
    DEFAULT_PLACEHOLDER_DESCRIPTION,
};
