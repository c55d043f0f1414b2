use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use arca_hash::{process_with_block_size, tree_hash_from_hex_strings, tree_hash_reader, verify, HashStrategy};
use arca_types::{create_byte_ranges, ByteRange, Hash};
use arca_upload::{AnonymousSigner, AnyBackend, BackendAdapter, ChunkedUploader, ContentDescription, UploadConfig};
use colored::Colorize;
use tracing::info;

use crate::cli::*;
use crate::transport::ReqwestClient;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Ranges(args) => cmd_ranges(args, format),
        Command::Hash(args) => cmd_hash(args, format),
        Command::TreeHash(args) => cmd_tree_hash(args, format),
        Command::Verify(args) => cmd_verify(args, format),
        Command::Upload(args) => cmd_upload(args, format),
    }
}

fn file_len(path: &Path) -> anyhow::Result<u64> {
    let meta = std::fs::metadata(path).with_context(|| format!("cannot stat {}", path.display()))?;
    Ok(meta.len())
}

fn open(path: &Path) -> anyhow::Result<File> {
    File::open(path).with_context(|| format!("cannot open {}", path.display()))
}

fn cmd_ranges(args: RangesArgs, format: OutputFormat) -> anyhow::Result<()> {
    let length = match (args.length, &args.file) {
        (Some(length), _) => length,
        (None, Some(path)) => file_len(path)?,
        (None, None) => bail!("either --length or a file is required"),
    };
    let ranges = create_byte_ranges(args.part_size, length)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ranges)?),
        OutputFormat::Text => {
            for (i, range) in ranges.iter().enumerate() {
                println!("{:>6}  {:<28} {} bytes", i + 1, range.to_string().cyan(), range.length());
            }
            println!("{} parts of up to {} bytes", ranges.len().to_string().bold(), args.part_size);
        }
    }
    Ok(())
}

/// Every strategy a `hash` invocation asks for, in output order.
pub(crate) fn build_strategies(args: &HashArgs, content_length: u64) -> anyhow::Result<Vec<HashStrategy>> {
    let mut spans: Vec<Option<ByteRange>> = vec![None];
    spans.extend(args.ranges.iter().copied().map(Some));
    if let Some(part_size) = args.part_size {
        spans.extend(create_byte_ranges(part_size, content_length)?.into_iter().map(Some));
    }

    let mut strategies = Vec::new();
    for &algorithm in &args.algorithms {
        for span in &spans {
            strategies.push(match span {
                Some(range) => HashStrategy::range(algorithm, *range),
                None => HashStrategy::whole(algorithm),
            });
        }
        for &offset in &args.offsets {
            strategies.push(HashStrategy::from_offset(algorithm, offset));
        }
    }
    Ok(strategies)
}

fn cmd_hash(args: HashArgs, format: OutputFormat) -> anyhow::Result<()> {
    if args.block_size == 0 {
        bail!("--block-size must be positive");
    }
    let length = file_len(&args.file)?;
    let strategies = build_strategies(&args, length)?;
    let output = process_with_block_size(open(&args.file)?, strategies, args.block_size)?;

    for failure in &output.failures {
        eprintln!("{} {}", "warning:".yellow().bold(), failure);
    }
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output.hashes)?),
        OutputFormat::Text => {
            for hash in &output.hashes {
                print_hash(hash);
            }
            println!("{} bytes read", output.bytes_read);
        }
    }
    if !output.failures.is_empty() {
        bail!("{} hash(es) could not be computed", output.failures.len());
    }
    Ok(())
}

fn print_hash(hash: &Hash) {
    let span = hash
        .range()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "whole".into());
    println!("{:<12} {:<24} {}", hash.algorithm().to_string().cyan(), span, hash.value());
}

fn cmd_tree_hash(args: TreeHashArgs, format: OutputFormat) -> anyhow::Result<()> {
    let digest = if !args.combine.is_empty() {
        tree_hash_from_hex_strings(args.combine.as_slice())?
    } else if let Some(path) = &args.file {
        tree_hash_reader(BufReader::new(open(path)?))?
    } else {
        bail!("either a file or --combine is required");
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "hash_algorithm": "sha256-tree", "hash": digest.to_hex() })
        ),
        OutputFormat::Text => println!("{}", digest.to_hex()),
    }
    Ok(())
}

pub(crate) fn load_expected(path: &Path) -> anyhow::Result<Vec<Hash>> {
    let reader = BufReader::new(open(path)?);
    serde_json::from_reader(reader).with_context(|| format!("invalid hash records in {}", path.display()))
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let expected = load_expected(&args.hashes)?;
    if expected.is_empty() {
        bail!("{} lists no hashes", args.hashes.display());
    }
    let report = verify(BufReader::new(open(&args.file)?), &expected)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            for hash in &report.verified {
                println!("  {} {}", "ok".green(), hash);
            }
            for mismatch in &report.mismatches {
                println!(
                    "  {} {} (computed {})",
                    "mismatch".red().bold(),
                    mismatch.expected,
                    mismatch.computed.value().yellow()
                );
            }
            for hash in &report.unverifiable {
                println!("  {} {}", "unverifiable".yellow(), hash);
            }
        }
    }

    if !report.is_valid() {
        bail!(
            "verification failed: {} mismatched, {} unverifiable",
            report.mismatches.len(),
            report.unverifiable.len()
        );
    }
    if format == OutputFormat::Text {
        println!("{} {} hash(es) verified", "✓".green().bold(), report.verified.len());
    }
    Ok(())
}

fn cmd_upload(args: UploadArgs, format: OutputFormat) -> anyhow::Result<()> {
    let config = UploadConfig::load(&args.config)
        .with_context(|| format!("cannot load config {}", args.config.display()))?;
    let file = open(&args.file)?;
    let size = file.metadata()?.len();
    let key = match args.key {
        Some(key) => key,
        None => args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("cannot derive a key from the file name; pass --key")?,
    };

    let client = ReqwestClient::new(Duration::from_secs(config.request_timeout_secs))?;
    let backend = AnyBackend::from_config(&config.backend, client, AnonymousSigner)?;
    let part_size = match args.part_size {
        Some(part_size) => part_size,
        None => backend.upload_info().fit_part_size(size)?,
    };
    if part_size != backend.upload_info().part_size {
        info!(part_size, "using non-default part size");
    }
    let uploader = ChunkedUploader::with_part_size(backend, part_size)?;

    let mut content = ContentDescription::new(key, size);
    if let Some(description) = args.description {
        content = content.with_description(description);
    }
    let reader = BufReader::with_capacity(config.read_buffer_size, file);
    let done = uploader
        .upload(&content, reader)
        .with_context(|| format!("upload of {} failed", args.file.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&done)?),
        OutputFormat::Text => {
            println!("{} Uploaded {} to {}", "✓".green().bold(), done.key.bold(), done.backend);
            println!("  Content: {}", done.content_id.yellow());
            println!("  Upload:  {}", done.upload_id.dimmed());
            println!("  Size:    {} bytes in {} parts", done.total_size, done.parts.len());
            for hash in done.aggregate.iter() {
                println!("  {:<8} {}", hash.algorithm().to_string().cyan(), hash.value());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_types::HashAlgorithm;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    fn hash_args(file: PathBuf) -> HashArgs {
        HashArgs {
            file,
            algorithms: vec![HashAlgorithm::Sha256],
            ranges: Vec::new(),
            offsets: Vec::new(),
            part_size: None,
            block_size: 4,
        }
    }

    #[test]
    fn strategies_cover_every_algorithm_and_span() {
        let mut args = hash_args(PathBuf::from("unused"));
        args.algorithms = vec![HashAlgorithm::Md5, HashAlgorithm::Sha256];
        args.ranges = vec![ByteRange::new(0, 4).unwrap()];
        args.offsets = vec![6];
        args.part_size = Some(4);

        let strategies = build_strategies(&args, 11).unwrap();
        // whole + explicit range + 3 parts + from-offset, per algorithm
        assert_eq!(strategies.len(), 12);
        assert_eq!(strategies[0].algorithm(), HashAlgorithm::Md5);
        assert_eq!(strategies[6].algorithm(), HashAlgorithm::Sha256);
    }

    #[test]
    fn zero_part_size_is_an_error() {
        let mut args = hash_args(PathBuf::from("unused"));
        args.part_size = Some(0);
        assert!(build_strategies(&args, 10).is_err());
    }

    #[test]
    fn hash_reports_unreachable_ranges() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "short.txt", b"hello");
        let mut args = hash_args(path);
        args.ranges = vec![ByteRange::new(2, 50).unwrap()];
        assert!(cmd_hash(args, OutputFormat::Text).is_err());
    }

    #[test]
    fn hash_succeeds_on_reachable_ranges() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        let mut args = hash_args(path);
        args.part_size = Some(5);
        cmd_hash(args, OutputFormat::Json).unwrap();
    }

    #[test]
    fn verify_passes_and_fails() {
        let dir = TempDir::new().unwrap();
        let data = write_file(&dir, "hello.txt", b"hello world");
        let good = write_file(
            &dir,
            "good.json",
            format!(r#"[{{"hash_algorithm":"sha256","hash":"{HELLO_SHA256}"}}]"#).as_bytes(),
        );
        let bad = write_file(
            &dir,
            "bad.json",
            br#"[{"hash_algorithm":"md5","hash":"00000000000000000000000000000000","offset":0,"length":5}]"#,
        );

        let ok = VerifyArgs { file: data.clone(), hashes: good };
        cmd_verify(ok, OutputFormat::Text).unwrap();

        let err = cmd_verify(VerifyArgs { file: data, hashes: bad }, OutputFormat::Text).unwrap_err();
        assert!(err.to_string().contains("1 mismatched"));
    }

    #[test]
    fn expected_hashes_keep_their_ranges() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "hashes.json",
            br#"[{"hash_algorithm":"crc32","hash":"3610a686","offset":0,"length":5}]"#,
        );
        let hashes = load_expected(&path).unwrap();
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0].range(), Some(ByteRange::new(0, 4).unwrap()));
    }

    #[test]
    fn malformed_hash_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hashes.json", br#"[{"hash_algorithm":"sha1","hash":"ab"}]"#);
        let err = load_expected(&path).unwrap_err();
        assert!(err.to_string().contains("invalid hash records"));
    }

    #[test]
    fn tree_hash_of_file_matches_sha256_below_one_mib() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "hello.txt", b"hello world");
        let args = TreeHashArgs { file: Some(path), combine: Vec::new() };
        cmd_tree_hash(args, OutputFormat::Text).unwrap();

        let combine = TreeHashArgs { file: None, combine: vec![HELLO_SHA256.into()] };
        cmd_tree_hash(combine, OutputFormat::Json).unwrap();
    }

    #[test]
    fn ranges_from_file_length() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.bin", &[7u8; 10]);
        let args = RangesArgs { part_size: 4, length: None, file: Some(path) };
        cmd_ranges(args, OutputFormat::Text).unwrap();

        let zero = RangesArgs { part_size: 0, length: Some(10), file: None };
        assert!(cmd_ranges(zero, OutputFormat::Text).is_err());
    }

    #[test]
    fn upload_to_memory_backend() {
        let dir = TempDir::new().unwrap();
        let config = write_file(&dir, "arca.toml", b"[backend]\nkind = \"memory\"\n");
        let data = write_file(&dir, "hello.txt", b"hello world");
        let args = UploadArgs {
            file: data,
            config,
            key: None,
            description: Some("greeting".into()),
            part_size: None,
        };
        cmd_upload(args, OutputFormat::Text).unwrap();
    }

    #[test]
    fn upload_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let config = write_file(&dir, "arca.toml", b"[backend]\nkind = \"memory\"\n");
        let data = write_file(&dir, "empty.txt", b"");
        let args = UploadArgs { file: data, config, key: None, description: None, part_size: None };
        assert!(cmd_upload(args, OutputFormat::Text).is_err());
    }

    #[test]
    fn upload_needs_a_config() {
        let dir = TempDir::new().unwrap();
        let data = write_file(&dir, "hello.txt", b"hello");
        let args = UploadArgs {
            file: data,
            config: dir.path().join("missing.toml"),
            key: Some("k".into()),
            description: None,
            part_size: None,
        };
        let err = cmd_upload(args, OutputFormat::Json).unwrap_err();
        assert!(err.to_string().contains("cannot load config"));
    }
}
