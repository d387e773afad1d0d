use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use blockpak::{PackageBuilder, PackageReader};

#[derive(Parser)]
#[command(
    name = "bpak",
    about = "Pack asset trees into block-structured .bpak packages",
    arg_required_else_help = true
)]
struct Cli {
    /// Add every file under this directory, recursively (repeatable)
    #[arg(short = 'd', long = "dir", value_name = "PATH")]
    dirs: Vec<PathBuf>,

    /// Add one file (repeatable)
    #[arg(short = 'f', long = "file", value_name = "PATH")]
    files: Vec<PathBuf>,

    /// Output package path
    #[arg(short = 'o', long = "out", value_name = "PATH")]
    out: Option<PathBuf>,

    /// Mount prefix prepended to every archive path
    #[arg(short = 'm', long = "mount", value_name = "PREFIX", default_value = "")]
    mount: String,

    /// Compression level: 0 (store) .. 9 (max)
    #[arg(short = 'c', long = "compression", value_name = "LEVEL", default_value_t = 6)]
    compression: u8,

    /// Encrypt every block with a key derived from this string
    #[arg(short = 'e', long = "encryption", value_name = "KEY")]
    encryption: Option<String>,

    /// Extensions stored without a compression attempt (space-separated)
    #[arg(long = "ignore-compression-ext", value_name = "EXT", num_args = 1..)]
    ignore_compression_ext: Vec<String>,

    /// List the file table of an existing package instead of building one
    #[arg(long = "list", value_name = "ARCHIVE", conflicts_with_all = ["dirs", "files", "out"])]
    list: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match &cli.list {
        Some(archive) => list(archive, cli.encryption.as_deref()),
        None => pack(&cli),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn pack(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let output = cli
        .out
        .as_ref()
        .ok_or("no output path (-o/--out) was given")?;
    if cli.dirs.is_empty() && cli.files.is_empty() {
        return Err("nothing to pack: add inputs with -d/--dir or -f/--file".into());
    }

    let mut builder = PackageBuilder::new();
    builder.set_mount_path(cli.mount.clone());
    builder.set_compression_level(cli.compression);
    if let Some(key) = &cli.encryption {
        builder.set_encryption(key)?;
    }
    for ext in &cli.ignore_compression_ext {
        builder.add_ignore_compression_extension(ext);
    }
    for dir in &cli.dirs {
        builder.add_directory(dir, true)?;
    }
    for file in &cli.files {
        let archive_path = file
            .file_name()
            .ok_or_else(|| format!("not a file: {}", file.display()))?
            .to_string_lossy()
            .into_owned();
        builder.add_file(file, archive_path);
    }

    let report = builder.build(output)?;
    for packed in &report.files {
        println!(
            "  packed  {:<40} key={} {:>10} B -> {:>10} B  {} block(s)",
            packed.logical_path,
            hex::encode(packed.path_key.to_be_bytes()),
            packed.uncompressed_size,
            packed.stored_size,
            packed.num_blocks,
        );
    }
    println!(
        "Created: {} ({} files, {} B in, {} B of block payload)",
        output.display(),
        report.files.len(),
        report.bytes_in,
        report.bytes_out
    );
    Ok(())
}

fn list(archive: &PathBuf, key: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let reader = match key {
        Some(k) => PackageReader::open_encrypted(archive, k)?,
        None => PackageReader::open(archive)?,
    };
    println!("Package: {}", archive.display());
    println!(
        "  version {}  level {}  files {}",
        reader.header().version,
        reader.header().compression_level,
        reader.num_files()
    );
    println!("{:<10} {:>12} {:>8}  Flags", "Key", "Size", "Blocks");
    let mut entries: Vec<_> = reader.entries().collect();
    entries.sort_by_key(|e| e.path_key);
    for entry in entries {
        let mut flags = String::new();
        if entry.is_compressed() {
            flags.push('C');
        }
        if entry.is_encrypted() {
            flags.push('E');
        }
        println!(
            "{:<10} {:>12} {:>8}  {}",
            hex::encode(entry.path_key.to_be_bytes()),
            entry.uncompressed_size,
            entry.num_blocks,
            flags
        );
    }
    Ok(())
}
