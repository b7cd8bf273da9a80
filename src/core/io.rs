use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use gzp::deflate::{Bgzf, Mgzip};
use gzp::par::decompress::ParDecompressBuilder;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::path::Path;

const GZIP_READ_BUF: usize = 8 * 1024 * 1024;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub type InputReader = Box<dyn BufRead + Send>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Plain,
    Gzip,
    Stdin,
}

pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub struct MmapSource {
    mmap: Mmap,
}

impl MmapSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        // SAFETY: read-only file mapping.
        let mmap = unsafe { Mmap::map(&file) }.with_context(|| "mmap failed")?;
        Ok(Self { mmap })
    }

    pub fn into_reader(self) -> InputReader {
        Box::new(Cursor::new(self.mmap))
    }
}

pub fn open_input(path: &Path, threads: usize) -> Result<(InputReader, InputKind)> {
    let kind = detect_input_kind(path)?;
    let reader: InputReader = match kind {
        InputKind::Stdin => {
            let mut reader = BufReader::with_capacity(GZIP_READ_BUF, io::stdin());
            let head = reader.fill_buf().with_context(|| "failed to read stdin")?;
            if head.starts_with(&GZIP_MAGIC) {
                Box::new(BufReader::with_capacity(
                    GZIP_READ_BUF,
                    MultiGzDecoder::new(reader),
                ))
            } else {
                Box::new(reader)
            }
        }
        InputKind::Plain => {
            let len = std::fs::metadata(path)
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len();
            if len == 0 {
                Box::new(io::empty())
            } else {
                MmapSource::open(path)?.into_reader()
            }
        }
        InputKind::Gzip => Box::new(BufReader::with_capacity(
            GZIP_READ_BUF,
            open_gzip_reader(path, threads)?,
        )),
    };
    Ok((reader, kind))
}

pub fn detect_input_kind(path: &Path) -> Result<InputKind> {
    if is_stdin(path) {
        return Ok(InputKind::Stdin);
    }
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if ext == "gz" || ext == "bgz" {
            return Ok(InputKind::Gzip);
        }
    }
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut magic = [0u8; 2];
    let n = file
        .read(&mut magic)
        .with_context(|| "failed to read magic bytes")?;
    if n == 2 && magic == GZIP_MAGIC {
        Ok(InputKind::Gzip)
    } else {
        Ok(InputKind::Plain)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum GzipVariant {
    Standard,
    Mgzip,
    Bgzf,
}

fn detect_gzip_variant(path: &Path) -> Result<GzipVariant> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut header = [0u8; 20];
    let n = file
        .read(&mut header)
        .with_context(|| "failed to read gzip header")?;
    Ok(gzip_variant_of(&header[..n]))
}

fn gzip_variant_of(header: &[u8]) -> GzipVariant {
    if header.len() < 14 || header[..2] != GZIP_MAGIC {
        return GzipVariant::Standard;
    }
    // FEXTRA must be set for either subfield to be present
    if header[3] & 4 == 0 {
        return GzipVariant::Standard;
    }
    match (header[12], header[13]) {
        (b'B', b'C') => GzipVariant::Bgzf,
        (b'I', b'G') => GzipVariant::Mgzip,
        _ => GzipVariant::Standard,
    }
}

pub fn open_gzip_reader(path: &Path, threads: usize) -> Result<Box<dyn Read + Send>> {
    let variant = detect_gzip_variant(path)?;
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let reader: Box<dyn Read + Send> = match variant {
        GzipVariant::Bgzf if threads > 1 => Box::new(
            ParDecompressBuilder::<Bgzf>::new()
                .num_threads(threads)
                .with_context(|| format!("invalid decompression threads {}", threads))?
                .from_reader(reader),
        ),
        GzipVariant::Mgzip if threads > 1 => Box::new(
            ParDecompressBuilder::<Mgzip>::new()
                .num_threads(threads)
                .with_context(|| format!("invalid decompression threads {}", threads))?
                .from_reader(reader),
        ),
        _ => Box::new(MultiGzDecoder::new(reader)),
    };
    Ok(reader)
}
