pub use crate::processor::ResultProcessor;

pub use crate::{
    Compression, Error, ExportConfig, ExportEncoder, ExportEncoderBuilder, FieldRegistry,
    GenomicField, GenomicFieldType, GenomicInterval, GenotypeCall, OutputFileSet, Result,
};
