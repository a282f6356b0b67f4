//! # genomat
//!
//! Streaming encoder from genomic variant-store query results to standard
//! genotype interchange formats.
//!
//! A columnar variant store answers range queries by driving a callback
//! stream: one call per variant position, then one call per matching
//! (sample, position) cell, in row order. `genomat` consumes that stream
//! and writes five files per pass:
//!
//! | File | Contents |
//! |---|---|
//! | `.fam` | sample identifiers, one line per row of the declared range |
//! | `.bim` | variant metadata, one line per position |
//! | `.tped` | transposed text genotype matrix |
//! | `.bed` | 2-bit packed genotype matrix, variant-major |
//! | `.bgen` | block-framed, optionally compressed genotype probabilities |
//!
//! The interesting work is in the `.bed` and `.bgen` paths: 2-bit packing
//! with byte alignment per variant, combinatorial enumeration of the
//! probability-slot layout for phased and unphased samples, per-variant
//! block framing through a pluggable zlib/zstd compressor, and header
//! totals that are back-patched only on clean completion so truncated
//! output is detectable.
//!
//! One encoder instance serves one worker rank over a disjoint row/column
//! range; instances share nothing. The encoder is purely reactive: the
//! query engine owns the loop and the thread.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use genomat::prelude::*;
//!
//! let files = OutputFileSet::create("cohort.chr20").unwrap();
//! let mut encoder = ExportEncoderBuilder::default()
//!     .registry(FieldRegistry::genotype_defaults())
//!     .row_range(0, 2503)
//!     .compression(Compression::Zlib)
//!     .build(files)
//!     .unwrap();
//!
//! // the query engine calls encoder.on_interval(..) / encoder.on_cell(..)
//!
//! encoder.finish().unwrap();
//! ```

pub mod bgen;
pub mod bitpack;
pub mod enumerate;

mod block;
mod call;
mod config;
mod encoder;
mod error;
mod field;
mod files;
mod interval;
mod processor;
pub mod prelude;

pub use block::{BlockCodec, Compressor, ZlibCompressor, ZstdCompressor};
pub use call::{GenotypeCall, GenotypeCode};
pub use config::{Compression, ExportConfig};
pub use encoder::{ExportEncoder, ExportEncoderBuilder};
pub use error::{ConfigError, EncodeError, Error, FieldError, Result};
pub use field::{FieldArity, FieldKind, FieldRegistry, GenomicField, GenomicFieldType};
pub use files::{OutputFileSet, BED_MAGIC};
pub use interval::GenomicInterval;
pub use processor::ResultProcessor;
