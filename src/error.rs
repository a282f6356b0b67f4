/// Custom Result type for genomat operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the genomat library, encompassing all possible error cases
/// that can occur while encoding a query-result stream into the output formats.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Value-range errors raised by typed field accessors
    FieldError(#[from] FieldError),
    /// Fatal configuration errors that abort the encoding pass
    ConfigError(#[from] ConfigError),
    /// Errors raised by the encoder state machine and output framing
    EncodeError(#[from] EncodeError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// UTF-8 encoding/decoding errors
    Utf8Error(#[from] std::str::Utf8Error),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}

/// Value-range errors: surfaced to the caller of the accessor, never recovered
/// internally.
#[derive(thiserror::Error, Debug)]
pub enum FieldError {
    /// A typed accessor was given an offset at or beyond the declared element count
    ///
    /// # Arguments
    /// * First `usize` - The requested element offset
    /// * Second `usize` - The declared element count of the field
    #[error("Field offset ({0}) is out of declared element range ({1})")]
    OffsetOutOfRange(usize, usize),

    /// A field name was queried that the registry was never populated with
    #[error("Unknown genomic field: {0}")]
    UnknownField(String),

    /// An accessor was used that does not match the field's declared value kind
    #[error("Field {name} holds {found} values, not {expected}")]
    KindMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The field's raw buffer is shorter than its declared element count implies
    ///
    /// # Arguments
    /// * `String` - The field name
    /// * First `usize` - The bytes actually present
    /// * Second `usize` - The bytes the declared count requires
    #[error("Field {0} buffer holds {1} bytes, expected at least {2}")]
    TruncatedBuffer(String, usize, usize),
}

/// Fatal configuration errors: reported once, aborting the encode pass.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A phased interpretation was requested on a field not marked phase-bearing
    #[error("Field {0} is not phase-bearing and cannot carry genotypes")]
    NotPhaseBearing(String),

    /// A cell changed the allele count established for its column
    ///
    /// # Arguments
    /// * First `u16` - The allele count established by the column's first call
    /// * Second `u16` - The conflicting allele count
    #[error("Allele count changed mid-column: expected {0}, got {1}")]
    AlleleCountChanged(u16, u16),

    /// A cell changed the phasedness established for its column
    ///
    /// # Arguments
    /// * `bool` - The phasedness the column's first call established
    #[error("Phasedness changed mid-column (column established phased={0})")]
    PhasednessChanged(bool),

    /// The genotype field held no haplotypes at all
    #[error("Empty genotype vector for sample {0}")]
    EmptyGenotype(String),

    /// The declared row range is inverted
    #[error("Invalid row range: [{0}, {1}]")]
    InvalidRowRange(u64, u64),

    /// The configured sample list does not cover the declared row range
    ///
    /// # Arguments
    /// * First `usize` - Number of identifiers supplied
    /// * Second `usize` - Cardinality of the declared row range
    #[error("Sample list holds {0} identifiers but the row range spans {1} rows")]
    SampleListMismatch(usize, usize),
}

/// Errors raised by the encoder state machine and the binary framing layer.
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    /// A stream event arrived after the encoder was finalized
    #[error("Encoder already finalized; no further events accepted")]
    AlreadyFinalized,

    /// A cell arrived before any interval was opened
    #[error("Cell for sample {0} arrived before any interval")]
    CellBeforeInterval(String),

    /// A cell arrived with a row index below the previous one for the same column
    ///
    /// # Arguments
    /// * First `u64` - The row index that arrived
    /// * Second `u64` - The last row index seen in the column
    #[error("Row order violation: row {0} after row {1}")]
    RowOrderViolation(u64, u64),

    /// A cell arrived with a row index outside the declared row range
    #[error("Row {0} is outside the declared row range [{1}, {2}]")]
    RowOutOfRange(u64, u64, u64),

    /// A block payload or framed length exceeded the u32 the format can record
    #[error("Block of {0} bytes exceeds the format's 32-bit length field")]
    BlockTooLarge(usize),

    /// A probabilistic-file header was shorter than its fixed fields
    #[error("Probabilistic file header truncated at {0} bytes")]
    TruncatedHeader(usize),

    /// The compressor failed; the format forbids falling back to uncompressed
    #[error("Block compression failed: {0}")]
    CompressionFailed(String),
}
