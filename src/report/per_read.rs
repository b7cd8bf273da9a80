use crate::core::model::{ReadRecord, phred_from_accuracy};
use crate::report::staged::{StagedFile, StagedSet};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

pub fn length_file_name(well: &str) -> String {
    format!("{}_HiFi_Length.txt", well)
}

pub fn phred_file_name(well: &str) -> String {
    format!("{}.hifi_reads_Phred.txt", well)
}

pub struct PerReadSink {
    lengths: StagedFile,
    phred: StagedFile,
}

impl PerReadSink {
    pub fn create(out_dir: &Path, well: &str) -> Result<Self> {
        let lengths = StagedFile::create(out_dir, &length_file_name(well))?;
        let phred = match StagedFile::create(out_dir, &phred_file_name(well)) {
            Ok(p) => p,
            Err(e) => {
                lengths.discard();
                return Err(e);
            }
        };
        Ok(Self { lengths, phred })
    }

    pub fn write(&mut self, read: &ReadRecord) -> Result<()> {
        writeln!(self.lengths.writer(), "{}", read.length)
            .with_context(|| format!("failed to write {}", self.lengths.tmp_path().display()))?;
        writeln!(self.phred.writer(), "{:.4}", phred_from_accuracy(read.accuracy))
            .with_context(|| format!("failed to write {}", self.phred.tmp_path().display()))?;
        Ok(())
    }

    pub fn into_staged(self) -> StagedSet {
        let mut set = StagedSet::default();
        set.push(self.lengths);
        set.push(self.phred);
        set
    }

    pub fn discard(self) {
        self.lengths.discard();
        self.phred.discard();
    }
}
