use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct StagedFile {
    tmp: PathBuf,
    dest: PathBuf,
    w: BufWriter<File>,
}

impl StagedFile {
    pub fn create(out_dir: &Path, name: &str) -> Result<Self> {
        let dest = out_dir.join(name);
        let tmp = out_dir.join(format!("{}.tmp", name));
        let file =
            File::create(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        Ok(Self {
            tmp,
            dest,
            w: BufWriter::with_capacity(1 << 20, file),
        })
    }

    pub fn writer(&mut self) -> &mut BufWriter<File> {
        &mut self.w
    }

    pub fn tmp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn discard(self) {
        drop(self.w);
        let _ = fs::remove_file(&self.tmp);
    }
}

#[derive(Default)]
pub struct StagedSet {
    files: Vec<StagedFile>,
}

impl StagedSet {
    pub fn push(&mut self, file: StagedFile) {
        self.files.push(file);
    }

    pub fn create(&mut self, out_dir: &Path, name: &str) -> Result<&mut StagedFile> {
        let file = StagedFile::create(out_dir, name)?;
        self.files.push(file);
        let idx = self.files.len() - 1;
        Ok(&mut self.files[idx])
    }

    pub fn discard(self) {
        for f in self.files {
            f.discard();
        }
    }

    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut flushed = Vec::with_capacity(self.files.len());
        let mut files = self.files.into_iter();
        while let Some(mut f) = files.next() {
            if let Err(e) = f.w.flush() {
                let tmp = f.tmp.clone();
                f.discard();
                for rest in flushed.into_iter().chain(files) {
                    rest.discard();
                }
                return Err(e).with_context(|| format!("failed to flush {}", tmp.display()));
            }
            flushed.push(f);
        }

        let mut committed: Vec<PathBuf> = Vec::with_capacity(flushed.len());
        let mut pending = flushed.into_iter();
        while let Some(f) = pending.next() {
            if let Err(e) = fs::rename(&f.tmp, &f.dest) {
                let dest = f.dest.clone();
                f.discard();
                for rest in pending {
                    rest.discard();
                }
                for path in &committed {
                    let _ = fs::remove_file(path);
                }
                return Err(e)
                    .with_context(|| format!("failed to move output to {}", dest.display()));
            }
            committed.push(f.dest);
        }
        Ok(committed)
    }
}
