// (c) Roel Kluin, 2023, GPL v3

#[macro_use]
extern crate derive_new;

#[macro_use]
pub mod rdbg;
pub mod error;
pub mod logging;
pub mod new_types;
pub mod encseq;
pub mod kmercode;
pub mod suffixsortspace;
pub mod codehasher;
pub mod config;
pub mod xdrop;
pub mod seeds;
pub mod boundaries;
pub mod report;
pub mod index;
pub mod harvest;

pub use boundaries::{BoundaryAssembler, LtrBoundary};
pub use config::LtrConfig;
pub use encseq::{EncodedSequence, SequenceStore};
pub use error::LtrError;
