use crate::core::model::WellSummary;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const HEADER: [&str; 14] = [
    "Polymerase_Read_Bases",
    "Polymerase_Reads",
    "Polymerase_N50",
    "Ave_Polymerase_Length",
    "Subreads_Bases",
    "Subreads_Reads",
    "Ave_Subreads_Length",
    "Subreads_N50",
    "HiFi_Bases",
    "HiFi_Reads",
    "Ave_HiFi_Length",
    "HiFi_N50",
    "HiFi_MeanPass",
    "HiFi_Quality",
];

// Polymerase and subread levels are not computed from HiFi reads.
const POLYMERASE: [&str; 4] = ["0", "0", "0", "0"];
const SUBREADS: [&str; 4] = ["-", "-", "-", "-"];

pub fn row_fields(s: &WellSummary) -> Vec<String> {
    let mut row: Vec<String> = POLYMERASE
        .iter()
        .chain(SUBREADS.iter())
        .map(|v| v.to_string())
        .collect();
    row.extend([
        s.total_bases.to_string(),
        s.read_count.to_string(),
        s.average_length.to_string(),
        s.n50.to_string(),
        s.mean_passes.to_string(),
        format!("Q{}", s.median_quality),
    ]);
    row
}

pub fn format_row(s: &WellSummary) -> String {
    row_fields(s).join("\t")
}

pub fn stat_file_name(well: &str) -> String {
    format!("{}_stat.txt", well)
}

pub fn write_to<W: Write>(w: &mut W, summary: &WellSummary) -> Result<()> {
    writeln!(w, "{}", HEADER.join("\t"))?;
    writeln!(w, "{}", format_row(summary))?;
    Ok(())
}

pub fn write_combined(path: &Path, wells: &[(String, WellSummary)]) -> Result<()> {
    let mut w = BufWriter::new(
        File::create(path).with_context(|| format!("create {} failed", path.display()))?,
    );
    writeln!(w, "Well\t{}", HEADER.join("\t"))?;
    for (name, summary) in wells {
        writeln!(w, "{}\t{}", name, format_row(summary))?;
    }
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_well_row() {
        assert_eq!(
            format_row(&WellSummary::default()),
            "0\t0\t0\t0\t-\t-\t-\t-\t0\t0\t0\t0\t0\tQ0"
        );
    }

    #[test]
    fn hifi_fields_follow_placeholders() {
        let s = WellSummary {
            total_bases: 1000,
            read_count: 4,
            average_length: 250,
            n50: 300,
            mean_passes: 5,
            median_quality: 30,
        };
        let row = row_fields(&s);
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(
            format_row(&s),
            "0\t0\t0\t0\t-\t-\t-\t-\t1000\t4\t250\t300\t5\tQ30"
        );
    }

    #[test]
    fn files_have_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Vec::new();
        write_to(&mut buf, &WellSummary::default()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Polymerase_Read_Bases\tPolymerase_Reads"));
        assert!(lines[0].ends_with("HiFi_MeanPass\tHiFi_Quality"));

        let combined = dir.path().join("all.tsv");
        let wells = vec![
            ("1_A01".to_string(), WellSummary::default()),
            (
                "1_B01".to_string(),
                WellSummary {
                    read_count: 1,
                    ..WellSummary::default()
                },
            ),
        ];
        write_combined(&combined, &wells).unwrap();
        let text = std::fs::read_to_string(&combined).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Well\tPolymerase_Read_Bases"));
        assert!(lines[2].starts_with("1_B01\t0\t0\t0\t0\t-"));
    }
}
