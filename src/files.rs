//! The five output resources of one encoding pass.
//!
//! All five writers are acquired together at construction and flushed
//! together; dropping the set flushes best-effort so partial output is
//! still inspectable after an aborted pass (the probabilistic file's zeroed
//! totals mark it incomplete).

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Magic bytes opening the fixed-genotype binary file
pub const BED_MAGIC: [u8; 3] = [0x6c, 0x1b, 0x01];

fn suffixed(prefix: &Path, ext: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(".");
    path.push(ext);
    path.into()
}

/// Owns the five output writers of one export pass.
pub struct OutputFileSet<W: Write + Seek> {
    fam: W,
    bim: W,
    tped: W,
    bed: W,
    bgen: W,
    finished: bool,
}
impl OutputFileSet<BufWriter<File>> {
    /// Creates `<prefix>.fam`, `.bim`, `.tped`, `.bed` and `.bgen`.
    pub fn create(prefix: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.as_ref();
        let open = |ext: &str| -> Result<BufWriter<File>> {
            Ok(BufWriter::new(File::create(suffixed(prefix, ext))?))
        };
        Ok(Self::from_writers(
            open("fam")?,
            open("bim")?,
            open("tped")?,
            open("bed")?,
            open("bgen")?,
        ))
    }
}
impl<W: Write + Seek> OutputFileSet<W> {
    /// Wraps caller-supplied writers (in-memory cursors in tests).
    pub fn from_writers(fam: W, bim: W, tped: W, bed: W, bgen: W) -> Self {
        Self {
            fam,
            bim,
            tped,
            bed,
            bgen,
            finished: false,
        }
    }

    pub fn fam_mut(&mut self) -> &mut W {
        &mut self.fam
    }

    pub fn bim_mut(&mut self) -> &mut W {
        &mut self.bim
    }

    pub fn tped_mut(&mut self) -> &mut W {
        &mut self.tped
    }

    pub fn bed_mut(&mut self) -> &mut W {
        &mut self.bed
    }

    pub fn bgen_mut(&mut self) -> &mut W {
        &mut self.bgen
    }

    pub fn fam(&self) -> &W {
        &self.fam
    }

    pub fn bim(&self) -> &W {
        &self.bim
    }

    pub fn tped(&self) -> &W {
        &self.tped
    }

    pub fn bed(&self) -> &W {
        &self.bed
    }

    pub fn bgen(&self) -> &W {
        &self.bgen
    }

    /// Flushes all five writers, failing on the first error.
    pub fn finish(&mut self) -> Result<()> {
        self.fam.flush()?;
        self.bim.flush()?;
        self.tped.flush()?;
        self.bed.flush()?;
        self.bgen.flush()?;
        self.finished = true;
        Ok(())
    }
}

impl<W: Write + Seek> Drop for OutputFileSet<W> {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.fam.flush();
            let _ = self.bim.flush();
            let _ = self.tped.flush();
            let _ = self.bed.flush();
            let _ = self.bgen.flush();
        }
    }
}
