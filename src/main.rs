//! Main entry point for the memzip CLI application.
//!
//! Archives are loaded whole into memory (from disk or over HTTP) and then
//! driven through the same handle API the Lua module exposes.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use luamemzip::{Cli, ZipHandle, io, lua};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if cli.create {
        return create_archive(&cli).await;
    }
    if cli.delete {
        return delete_entries(&cli);
    }

    let image = match &cli.file {
        Some(location) => Some(load_source(location).await?),
        None => None,
    };

    if let Some(script) = &cli.script {
        return run_script(script, image.as_deref()).await;
    }

    let Some(image) = image else {
        bail!("missing FILE (see --help)");
    };
    process_zip(&image, &cli)
}

/// Load an archive, reporting network usage for remote sources.
async fn load_source(location: &str) -> Result<Vec<u8>> {
    let (image, transferred) = io::load(location).await?;
    if io::is_http_url(location) {
        info!("Total bytes transferred: {}", format_size(transferred));
    }
    Ok(image)
}

/// Dispatch a loaded archive to the action the flags select.
///
/// Without -p or -t the archive is listed.
fn process_zip(image: &[u8], cli: &Cli) -> Result<()> {
    let mut handle = ZipHandle::open_stream(Some(image), None, Some("r"))?;

    if cli.test {
        return test_entries(&handle, &cli.entries);
    }
    if cli.pipe {
        return print_entries(&mut handle, &cli.entries);
    }
    list_files(&handle, cli.verbose)
}

/// List entries in the archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): names from the directory listing, one per line
/// - Verbose format (`-v`): Detailed table with size, method, CRC and timestamps
fn list_files(handle: &ZipHandle, verbose: bool) -> Result<()> {
    if !verbose {
        for name in handle.list_entries(None)? {
            println!("{}", name);
        }
        return Ok(());
    }

    let entries = handle.stat_entries()?;

    println!(
        "{:>10}  {:>10}  {:>5}  {:>8}  {:>10}  {:>5}  Name",
        "Length", "Size", "Cmpr", "CRC-32", "Date", "Time"
    );
    println!("{}", "-".repeat(80));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let (year, month, day) = entry.mod_date();
        let (hour, minute, _second) = entry.mod_time();

        println!(
            "{:>10}  {:>10}  {}  {:08x}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            entry.crc32,
            year,
            month,
            day,
            hour,
            minute,
            entry.file_name
        );

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(80));
    println!(
        "{:>10}  {:>10}  {}  {:>31}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 && compressed <= uncompressed {
        format!("{:>4}%", 100 - (compressed * 100 / uncompressed))
    } else {
        "  0%".to_string()
    }
}

/// Print `name: true|false` for each requested entry.
fn test_entries(handle: &ZipHandle, names: &[String]) -> Result<()> {
    if names.is_empty() {
        bail!("-t needs at least one entry name");
    }
    for name in names {
        let exists = handle
            .entry_exists(name)
            .with_context(|| format!("cannot look up {}", name))?;
        println!("{}: {}", name, exists);
    }
    Ok(())
}

/// Write matching entries to stdout.
///
/// Patterns may use `*` and `?`; plain names match the full path or the base
/// name. With no patterns every file entry is printed. When more than one
/// entry matches, each is preceded by a `--- name ---` marker.
fn print_entries(handle: &mut ZipHandle, patterns: &[String]) -> Result<()> {
    let names: Vec<String> = handle
        .list_entries(None)?
        .into_iter()
        .filter(|name| !name.ends_with('/'))
        .filter(|name| patterns.is_empty() || patterns.iter().any(|p| entry_matches(p, name)))
        .collect();

    let mut stdout = std::io::stdout().lock();
    let show_names = names.len() > 1;

    for name in &names {
        handle.entry_open(name)?;
        let data = handle
            .entry_read()
            .with_context(|| format!("cannot read {}", name))?;
        handle.entry_close()?;

        if show_names {
            writeln!(stdout, "--- {} ---", name)?;
        }
        stdout.write_all(&data)?;
    }
    stdout.flush()?;

    Ok(())
}

fn entry_matches(pattern: &str, name: &str) -> bool {
    if has_glob_chars(pattern) {
        return glob_match(pattern, name);
    }
    let basename = Path::new(name)
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    name == pattern || basename == pattern
}

/// Build FILE from local paths; directories are added recursively.
async fn create_archive(cli: &Cli) -> Result<()> {
    let Some(output) = &cli.file else {
        bail!("-c needs an output FILE");
    };
    if cli.entries.is_empty() {
        bail!("-c needs at least one path to add");
    }

    let mut handle = ZipHandle::open_stream(None, Some(cli.level), Some("w"))?;

    for root in &cli.entries {
        let mut pending = vec![PathBuf::from(root)];
        while let Some(path) = pending.pop() {
            let name = archive_name(&path);
            let metadata = tokio::fs::metadata(&path)
                .await
                .with_context(|| format!("cannot stat {}", path.display()))?;

            if metadata.is_dir() {
                add_entry(&mut handle, &format!("{}/", name), None)?;
                let mut dir = tokio::fs::read_dir(&path).await?;
                let mut children = Vec::new();
                while let Some(child) = dir.next_entry().await? {
                    children.push(child.path());
                }
                // Reverse-sorted so the stack pops in name order.
                children.sort_by(|a, b| b.cmp(a));
                pending.extend(children);
            } else {
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("cannot read {}", path.display()))?;
                add_entry(&mut handle, &name, Some(&data))?;
            }

            if !cli.is_quiet() {
                println!("  adding: {}", name);
            }
        }
    }

    let image = handle.serialize()?;
    tokio::fs::write(output, &image)
        .await
        .with_context(|| format!("cannot write {}", output))?;
    info!(entries = handle.list_entries(None)?.len(), bytes = image.len(), "wrote {}", output);

    Ok(())
}

fn add_entry(handle: &mut ZipHandle, name: &str, data: Option<&[u8]>) -> Result<()> {
    handle.entry_open(name)?;
    if let Some(data) = data {
        handle.entry_write(data)?;
    }
    handle.entry_close()?;
    Ok(())
}

/// Entry name for a local path: `/`-separated, without a trailing slash.
fn archive_name(path: &Path) -> String {
    let name = path.to_string_lossy().replace('\\', "/");
    name.trim_end_matches('/').to_string()
}

/// Remove entries from a local archive in delete mode.
fn delete_entries(cli: &Cli) -> Result<()> {
    let Some(path) = &cli.file else {
        bail!("-D needs a FILE");
    };
    if io::is_http_url(path) {
        bail!("-D only works on local files");
    }

    let mut handle = ZipHandle::open_file(path, cli.level, "d")?;
    let names: Vec<&str> = cli.entries.iter().map(String::as_str).collect();
    let removed = handle.entries_delete(&names)?;
    handle.try_close()?;

    if !cli.is_quiet() {
        println!("  deleted {} of {} entries", removed, names.len());
    }
    Ok(())
}

/// Run a Lua script with `luamemzip` preloaded and the archive (if any) in
/// the global `ARCHIVE`.
async fn run_script(script: &str, image: Option<&[u8]>) -> Result<()> {
    let code = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("cannot read script {}", script))?;

    let state = mlua::Lua::new();
    lua::preload(&state).map_err(|e| anyhow!("cannot preload luamemzip: {}", e))?;
    if let Some(image) = image {
        let archive = state
            .create_string(image)
            .map_err(|e| anyhow!("cannot expose archive: {}", e))?;
        state
            .globals()
            .set("ARCHIVE", archive)
            .map_err(|e| anyhow!("cannot expose archive: {}", e))?;
    }

    debug!(script, "running lua script");
    state
        .load(code)
        .set_name(format!("@{}", script))
        .exec()
        .map_err(|e| anyhow!("{}", e))
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// ```ignore
/// assert!(glob_match("*.txt", "readme.txt"));
/// assert!(glob_match("file?.dat", "file1.dat"));
/// assert!(!glob_match("*.txt", "readme.md"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero characters, or one more and stays
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
