//! The callback protocol the query engine drives.

use auto_impl::auto_impl;

use crate::error::Result;
use crate::field::GenomicField;
use crate::interval::GenomicInterval;

/// Consumer of an ordered query-result stream.
///
/// The engine calls [`on_interval`](Self::on_interval) once per newly
/// entered variant position, in strictly increasing coordinate order, before
/// any cell of that interval; then [`on_cell`](Self::on_cell) once per
/// matched (sample, interval) pair, samples in increasing row order. Calls
/// are never concurrent, and implementations own the thread of control for
/// the duration of each call.
///
/// `coordinates` is the cell's (row, column) pair in the store's global
/// space. The field buffers are only valid for the duration of the call.
#[auto_impl(&mut, Box)]
pub trait ResultProcessor {
    fn on_interval(&mut self, interval: &GenomicInterval) -> Result<()>;

    fn on_cell(
        &mut self,
        sample: &str,
        coordinates: (u64, u64),
        interval: &GenomicInterval,
        fields: &[GenomicField<'_>],
    ) -> Result<()>;
}
