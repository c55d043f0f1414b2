use std::path::PathBuf;

use arca_hash::DEFAULT_BLOCK_SIZE;
use arca_types::{ByteRange, HashAlgorithm};
use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "arca",
    about = "Arca - single-pass hashing and verified chunked uploads",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show how content is split into upload parts
    Ranges(RangesArgs),
    /// Compute several hashes of a file in one read
    Hash(HashArgs),
    /// Compute a SHA-256 tree hash or combine existing ones
    TreeHash(TreeHashArgs),
    /// Check a file against a JSON list of hash records
    Verify(VerifyArgs),
    /// Upload a file to the configured backend
    Upload(UploadArgs),
}

#[derive(Args)]
pub struct RangesArgs {
    /// Part size (bytes, or with a KiB/MiB/GiB suffix)
    #[arg(short, long, value_parser = parse_size)]
    pub part_size: u64,
    /// Content length in bytes
    #[arg(short, long, conflicts_with = "file")]
    pub length: Option<u64>,
    /// File whose length is partitioned
    #[arg(required_unless_present = "length")]
    pub file: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: PathBuf,
    /// Algorithm to compute; repeat for several
    #[arg(short, long = "algorithm", default_value = "sha256")]
    pub algorithms: Vec<HashAlgorithm>,
    /// Also hash the inclusive byte range FROM-TO
    #[arg(short, long = "range")]
    pub ranges: Vec<ByteRange>,
    /// Also hash from OFFSET to the end of the file
    #[arg(long = "from")]
    pub offsets: Vec<u64>,
    /// Also hash every upload part of this size
    #[arg(short, long, value_parser = parse_size)]
    pub part_size: Option<u64>,
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,
}

#[derive(Args)]
pub struct TreeHashArgs {
    #[arg(required_unless_present = "combine")]
    pub file: Option<PathBuf>,
    /// Combine part tree hashes (hex, in part order) instead of reading a file
    #[arg(long, num_args = 1.., conflicts_with = "file")]
    pub combine: Vec<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub file: PathBuf,
    /// JSON array of hash records
    pub hashes: PathBuf,
}

#[derive(Args)]
pub struct UploadArgs {
    pub file: PathBuf,
    #[arg(short, long, default_value = "arca.toml")]
    pub config: PathBuf,
    /// Object key or archive name; defaults to the file name
    #[arg(short, long)]
    pub key: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Override the configured part size
    #[arg(short, long, value_parser = parse_size)]
    pub part_size: Option<u64>,
}

/// Parse a byte count such as `5242880`, `512KiB`, `8MiB` or `4G`.
pub fn parse_size(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{text}'"))?;
    let shift = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 0,
        "k" | "kb" | "kib" => 10,
        "m" | "mb" | "mib" => 20,
        "g" | "gb" | "gib" => 30,
        other => return Err(format!("unknown size unit '{other}'")),
    };
    value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size '{text}' is too large"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_with_units() {
        assert_eq!(parse_size("1048576"), Ok(1 << 20));
        assert_eq!(parse_size("512KiB"), Ok(512 * 1024));
        assert_eq!(parse_size("8MiB"), Ok(8 << 20));
        assert_eq!(parse_size("8m"), Ok(8 << 20));
        assert_eq!(parse_size("4 GiB"), Ok(4 << 30));
    }

    #[test]
    fn bad_sizes() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MiB").is_err());
        assert!(parse_size("3TiB").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
    }

    #[test]
    fn hash_command_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "arca", "hash", "data.bin", "-a", "md5", "-a", "sha256-tree", "-r", "0-99",
            "--from", "100", "--format", "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Hash(args) = cli.command else {
            panic!("expected hash command");
        };
        assert_eq!(args.algorithms, vec![HashAlgorithm::Md5, HashAlgorithm::TreeSha256]);
        assert_eq!(args.ranges, vec![ByteRange::new(0, 99).unwrap()]);
        assert_eq!(args.offsets, vec![100]);
        assert_eq!(args.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn hash_defaults_to_sha256() {
        let cli = Cli::try_parse_from(["arca", "hash", "data.bin"]).unwrap();
        let Command::Hash(args) = cli.command else {
            panic!("expected hash command");
        };
        assert_eq!(args.algorithms, vec![HashAlgorithm::Sha256]);
    }

    #[test]
    fn rejects_unknown_algorithm_and_bad_range() {
        assert!(Cli::try_parse_from(["arca", "hash", "f", "-a", "sha1"]).is_err());
        assert!(Cli::try_parse_from(["arca", "hash", "f", "-r", "9-2"]).is_err());
    }

    #[test]
    fn ranges_needs_length_or_file() {
        assert!(Cli::try_parse_from(["arca", "ranges", "-p", "5MiB"]).is_err());
        assert!(Cli::try_parse_from(["arca", "ranges", "-p", "5MiB", "-l", "10", "f"]).is_err());
        let cli = Cli::try_parse_from(["arca", "ranges", "-p", "5MiB", "-l", "10"]).unwrap();
        assert!(matches!(cli.command, Command::Ranges(RangesArgs { length: Some(10), .. })));
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["arca", "-vv", "tree-hash", "--combine", "ab"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
