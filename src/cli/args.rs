use crate::core::model::DEFAULT_EXCLUDE_FLAGS;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kira-readstat",
    version,
    about = "Per-well HiFi read statistics (bases, N50, mean passes, median Q)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Run(RunArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    #[arg(
        required = true,
        help = "readstats or SAM text inputs, optionally gzip/BGZF compressed; `-` for stdin"
    )]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "out_by_well")]
    pub out: PathBuf,

    #[arg(
        long,
        conflicts_with = "group_by_parent",
        help = "Pool every input into a single well with this name"
    )]
    pub well: Option<String>,

    #[arg(
        long,
        default_value_t = false,
        help = "Name wells after the directory above `hifi_reads` (`<WELL>/hifi_reads/...`)"
    )]
    pub group_by_parent: bool,

    #[arg(long, env = "NSLOTS", default_value_t = num_cpus::get())]
    pub threads: usize,

    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    pub format: FormatArg,

    #[arg(
        long,
        value_parser = parse_flags,
        default_value_t = DEFAULT_EXCLUDE_FLAGS,
        help = "SAM FLAG bits that drop a record (decimal or 0x-prefixed hex)"
    )]
    pub exclude_flags: u16,

    #[arg(
        long,
        default_value_t = false,
        help = "Only write `<well>_stat.txt`, skip the per-read length and Phred files"
    )]
    pub summary_only: bool,

    #[arg(long, help = "Also write one table with a row per well")]
    pub combined: Option<PathBuf>,

    #[arg(
        long,
        default_value_t = false,
        help = "Bundle each well's outputs into `<well>_readstat.zip`"
    )]
    pub zip: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum FormatArg {
    #[value(name = "auto")]
    Auto,
    #[value(name = "readstats")]
    ReadStats,
    #[value(name = "sam")]
    Sam,
}

pub fn parse_flags(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid flag mask '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_masks() {
        assert_eq!(parse_flags("0x900"), Ok(0x900));
        assert_eq!(parse_flags("2304"), Ok(0x900));
        assert_eq!(parse_flags("0"), Ok(0));
        assert!(parse_flags("0xzz").is_err());
        assert!(parse_flags("70000").is_err());
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["kira-readstat", "run", "a.readstats"]).unwrap();
        let Commands::Run(args) = cli.command;
        assert_eq!(args.out, PathBuf::from("out_by_well"));
        assert_eq!(args.exclude_flags, 0x900);
        assert!(!args.summary_only);
        assert!(args.threads >= 1);
    }

    #[test]
    fn well_conflicts_with_grouping() {
        let res = Cli::try_parse_from([
            "kira-readstat",
            "run",
            "a.sam",
            "--well",
            "w",
            "--group-by-parent",
        ]);
        assert!(res.is_err());
    }
}
