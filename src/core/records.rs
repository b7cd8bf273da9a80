use crate::core::model::{InputFormat, ReadRecord};
use memchr::memchr;
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

const SAM_MIN_COLUMNS: usize = 11;
const SAM_SEQ_COLUMN: usize = 9;
const SAM_FLAG_COLUMN: usize = 1;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line {line}: missing {field}")]
    MissingField { line: u64, field: &'static str },
    #[error("line {line}: invalid {field} value '{value}'")]
    InvalidField {
        line: u64,
        field: &'static str,
        value: String,
    },
    #[error("line {line}: SAM record has {found} columns, expected at least 11")]
    ShortSamRecord { line: u64, found: usize },
    #[error("read failed after line {line}")]
    Io {
        line: u64,
        #[source]
        source: io::Error,
    },
}

pub fn detect_format(path: &Path, head: &[u8]) -> InputFormat {
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    let name = name
        .strip_suffix(".gz")
        .or_else(|| name.strip_suffix(".bgz"))
        .unwrap_or(name.as_str());
    if name.ends_with(".sam") {
        return InputFormat::Sam;
    }
    if name.ends_with(".readstats") || name.ends_with(".tsv") || name.ends_with(".txt") {
        return InputFormat::ReadStats;
    }
    sniff_format(head)
}

fn sniff_format(head: &[u8]) -> InputFormat {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let rest = &head[start..];
    if rest.first() == Some(&b'@') {
        return InputFormat::Sam;
    }
    let line = match memchr(b'\n', rest) {
        Some(end) => &rest[..end],
        None => rest,
    };
    if Fields::new(line).count() >= SAM_MIN_COLUMNS {
        InputFormat::Sam
    } else {
        InputFormat::ReadStats
    }
}

/// Reads without an accuracy and flag-masked SAM records only count toward `skipped`.
pub struct RecordReader<R> {
    reader: R,
    format: InputFormat,
    exclude_flags: u16,
    buf: Vec<u8>,
    line_no: u64,
    skipped: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R, format: InputFormat, exclude_flags: u16) -> Self {
        debug_assert!(format != InputFormat::Auto);
        Self {
            reader,
            format,
            exclude_flags,
            buf: Vec::with_capacity(64 * 1024),
            line_no: 0,
            skipped: 0,
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn lines(&self) -> u64 {
        self.line_no
    }

    fn parse_line(&self, line: &[u8]) -> Result<Option<ReadRecord>, RecordError> {
        match self.format {
            InputFormat::Sam => parse_sam(line, self.line_no, self.exclude_flags),
            _ => parse_readstats(line, self.line_no),
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<ReadRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(source) => {
                    return Some(Err(RecordError::Io {
                        line: self.line_no,
                        source,
                    }));
                }
            }
            self.line_no += 1;
            let line = trim_eol(&self.buf);
            if line.is_empty() || (self.format == InputFormat::Sam && line[0] == b'@') {
                continue;
            }
            match self.parse_line(line) {
                Ok(Some(rec)) => return Some(Ok(rec)),
                Ok(None) => self.skipped += 1,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn trim_eol(mut line: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = line.split_last() {
        if last == b'\n' || last == b'\r' {
            line = rest;
        } else {
            break;
        }
    }
    line
}

// <length>\t<rq>[\t<np>]
fn parse_readstats(line: &[u8], line_no: u64) -> Result<Option<ReadRecord>, RecordError> {
    let mut fields = Fields::new(line);
    let length = match fields.next() {
        Some(f) if !f.is_empty() => parse_num::<u64>(f, line_no, "length")?,
        _ => {
            return Err(RecordError::MissingField {
                line: line_no,
                field: "length",
            });
        }
    };
    let accuracy = match fields.next() {
        Some(f) if !f.is_empty() => parse_accuracy(f, line_no)?,
        _ => return Ok(None),
    };
    let passes = match fields.next() {
        Some(f) if !f.is_empty() => Some(parse_num::<u64>(f, line_no, "passes")?),
        _ => None,
    };
    Ok(Some(ReadRecord {
        length,
        accuracy,
        passes,
    }))
}

fn parse_sam(
    line: &[u8],
    line_no: u64,
    exclude_flags: u16,
) -> Result<Option<ReadRecord>, RecordError> {
    let mut flag = 0u16;
    let mut length = 0u64;
    let mut accuracy = None;
    let mut passes = None;
    let mut columns = 0usize;
    for (i, field) in Fields::new(line).enumerate() {
        columns = i + 1;
        match i {
            SAM_FLAG_COLUMN => flag = parse_num::<u16>(field, line_no, "FLAG")?,
            SAM_SEQ_COLUMN => {
                // `*` is an unstored sequence, not a one-base read
                length = if field == b"*" { 0 } else { field.len() as u64 };
            }
            _ if i >= SAM_MIN_COLUMNS => {
                if let Some(v) = field.strip_prefix(b"rq:f:") {
                    accuracy = Some(parse_accuracy(v, line_no)?);
                } else if let Some(v) = field.strip_prefix(b"np:i:") {
                    passes = Some(parse_num::<u64>(v, line_no, "np tag")?);
                }
            }
            _ => {}
        }
    }
    if columns < SAM_MIN_COLUMNS {
        return Err(RecordError::ShortSamRecord {
            line: line_no,
            found: columns,
        });
    }
    if flag & exclude_flags != 0 {
        return Ok(None);
    }
    Ok(accuracy.map(|accuracy| ReadRecord {
        length,
        accuracy,
        passes,
    }))
}

fn parse_accuracy(field: &[u8], line_no: u64) -> Result<f64, RecordError> {
    let v = parse_num::<f64>(field, line_no, "accuracy")?;
    if !v.is_finite() {
        return Err(invalid(field, line_no, "accuracy"));
    }
    Ok(v)
}

fn parse_num<T: std::str::FromStr>(
    field: &[u8],
    line_no: u64,
    name: &'static str,
) -> Result<T, RecordError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.trim().parse::<T>().ok())
        .ok_or_else(|| invalid(field, line_no, name))
}

fn invalid(field: &[u8], line_no: u64, name: &'static str) -> RecordError {
    RecordError::InvalidField {
        line: line_no,
        field: name,
        value: String::from_utf8_lossy(field).into_owned(),
    }
}

struct Fields<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Fields<'a> {
    fn new(line: &'a [u8]) -> Self {
        Self { rest: Some(line) }
    }
}

impl<'a> Iterator for Fields<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = self.rest?;
        match memchr(b'\t', rest) {
            Some(i) => {
                self.rest = Some(&rest[i + 1..]);
                Some(&rest[..i])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(text: &str, format: InputFormat) -> (Vec<ReadRecord>, u64) {
        let mut reader = reader_over(text.as_bytes(), format, 0x900);
        let recs = reader
            .by_ref()
            .collect::<Result<Vec<_>, _>>()
            .expect("parse");
        (recs, reader.skipped())
    }

    fn reader_over(text: &[u8], format: InputFormat, flags: u16) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::new(Cursor::new(text.to_vec()), format, flags)
    }

    fn rec(length: u64, accuracy: f64, passes: Option<u64>) -> ReadRecord {
        ReadRecord {
            length,
            accuracy,
            passes,
        }
    }

    fn sam_line(flag: u16, seq: &str, tags: &str) -> String {
        format!("m84135/1/ccs\t{flag}\t*\t0\t255\t*\t*\t0\t0\t{seq}\t*\t{tags}\n")
    }

    #[test]
    fn readstats_lines() {
        let text = "100\t0.999\t5\n200\t0.99\t\n\n300\t\t7\n400\t1.0\t0\r\n";
        let (recs, skipped) = collect(text, InputFormat::ReadStats);
        assert_eq!(
            recs,
            vec![
                rec(100, 0.999, Some(5)),
                rec(200, 0.99, None),
                rec(400, 1.0, Some(0)),
            ]
        );
        assert_eq!(skipped, 1);
    }

    #[test]
    fn readstats_two_columns_means_no_passes() {
        let (recs, _) = collect("15000\t0.9995\n", InputFormat::ReadStats);
        assert_eq!(recs[0].passes, None);
    }

    #[test]
    fn readstats_bad_numbers_fail_with_line() {
        let mut reader = reader_over(b"100\t0.9\t3\nabc\t0.9\t3\n", InputFormat::ReadStats, 0x900);
        assert!(reader.next().unwrap().is_ok());
        match reader.next().unwrap() {
            Err(RecordError::InvalidField { line, field, value }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "length");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut reader = reader_over(b"100\tNaN\n", InputFormat::ReadStats, 0);
        assert!(matches!(
            reader.next(),
            Some(Err(RecordError::InvalidField {
                field: "accuracy",
                ..
            }))
        ));

        let mut reader = reader_over(b"\t0.9\n", InputFormat::ReadStats, 0);
        assert!(matches!(
            reader.next(),
            Some(Err(RecordError::MissingField { line: 1, .. }))
        ));
    }

    #[test]
    fn sam_records_use_seq_length_and_tags() {
        let mut text = String::from("@HD\tVN:1.6\tSO:unknown\n@RG\tID:x\n");
        text += &sam_line(4, "ACGTACGTAC", "np:i:12\trq:f:0.998\tzm:i:1");
        text += &sam_line(4, "ACGT", "rq:f:0.99");
        text += &sam_line(4, "ACG", "np:i:3");
        let (recs, skipped) = collect(&text, InputFormat::Sam);
        assert_eq!(
            recs,
            vec![
                rec(10, 0.998, Some(12)),
                rec(4, 0.99, None),
            ]
        );
        assert_eq!(skipped, 1);
    }

    #[test]
    fn sam_secondary_and_supplementary_are_skipped() {
        let mut text = sam_line(0x100 | 4, "ACGT", "rq:f:0.99");
        text += &sam_line(0x800, "ACGT", "rq:f:0.99");
        text += &sam_line(0x10, "ACGTA", "rq:f:0.99");
        let (recs, skipped) = collect(&text, InputFormat::Sam);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].length, 5);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn sam_unstored_sequence_has_no_bases() {
        let text = sam_line(4, "*", "rq:f:0.99\tnp:i:5");
        let (recs, skipped) = collect(&text, InputFormat::Sam);
        assert_eq!(recs, vec![rec(0, 0.99, Some(5))]);
        assert_eq!(skipped, 0);
    }

    #[test]
    fn sam_short_record_is_an_error() {
        let mut reader = reader_over(b"r1\t4\t*\n", InputFormat::Sam, 0x900);
        assert!(matches!(
            reader.next(),
            Some(Err(RecordError::ShortSamRecord { line: 1, found: 3 }))
        ));
    }

    #[test]
    fn format_detection() {
        assert_eq!(detect_format(Path::new("w/a.sam.gz"), b"100\t0.9\n"), InputFormat::Sam);
        assert_eq!(detect_format(Path::new("a.readstats"), b"@HD\n"), InputFormat::ReadStats);
        assert_eq!(detect_format(Path::new("-"), b"@HD\tVN:1.6\n"), InputFormat::Sam);
        assert_eq!(detect_format(Path::new("reads"), b"100\t0.9\t3\n"), InputFormat::ReadStats);
        let sam = sam_line(4, "ACGT", "rq:f:0.9");
        assert_eq!(detect_format(Path::new("reads"), sam.as_bytes()), InputFormat::Sam);
        assert_eq!(detect_format(Path::new("reads"), b""), InputFormat::ReadStats);
    }
}
