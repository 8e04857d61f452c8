use clap::Parser;

use crate::zip::DEFAULT_COMPRESSION_LEVEL;

#[derive(Parser, Debug)]
#[command(name = "memzip")]
#[command(version)]
#[command(about = "Inspect and build ZIP archives in memory, or script them from Lua", long_about = None)]
#[command(after_help = "Examples:\n  \
  memzip -l data.zip                     list entries of data.zip\n  \
  memzip -p data.zip '*.txt' | more      print every .txt entry\n  \
  memzip -t data.zip a.txt b.txt         test whether entries exist\n  \
  memzip -c out.zip notes.txt img/       create out.zip from local paths\n  \
  memzip -D out.zip notes.txt            delete notes.txt from out.zip\n  \
  memzip -s check.lua https://example.com/archive.zip\n                                         \
  run check.lua with the archive loaded as ARCHIVE")]
pub struct Cli {
    /// ZIP file path or HTTP URL (the output path with -c)
    #[arg(value_name = "FILE")]
    pub file: Option<String>,

    /// Entries to act on, or local paths to add with -c
    #[arg(value_name = "ENTRIES")]
    pub entries: Vec<String>,

    /// List entry names
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely (sizes, method, CRC, time)
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Print matching entries to stdout
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Test whether each named entry exists
    #[arg(short = 't')]
    pub test: bool,

    /// Create FILE from the local paths given as ENTRIES
    #[arg(short = 'c')]
    pub create: bool,

    /// Delete the named entries from local FILE in place
    #[arg(short = 'D')]
    pub delete: bool,

    /// Compression level for -c (0 stores, 1-10 deflate)
    #[arg(short = 'L', value_name = "LEVEL", default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub level: i32,

    /// Run a Lua script with the luamemzip module preloaded
    #[arg(short = 's', value_name = "SCRIPT")]
    pub script: Option<String>,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet || self.pipe
    }

    /// Default tracing filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "luamemzip=debug,memzip=debug"
        } else if self.quiet {
            "luamemzip=error,memzip=error"
        } else {
            "luamemzip=info,memzip=info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_listing() {
        let cli = Cli::try_parse_from(["memzip", "-l", "a.zip"]).unwrap();
        assert!(cli.list);
        assert_eq!(cli.file.as_deref(), Some("a.zip"));
        assert_eq!(cli.level, DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_parses_create_with_level() {
        let cli = Cli::try_parse_from(["memzip", "-c", "-L", "0", "out.zip", "a", "b/"]).unwrap();
        assert!(cli.create);
        assert_eq!(cli.level, 0);
        assert_eq!(cli.entries, ["a", "b/"]);
    }

    #[test]
    fn test_pipe_is_quiet() {
        let cli = Cli::try_parse_from(["memzip", "-p", "a.zip"]).unwrap();
        assert!(cli.is_quiet());
        assert_eq!(cli.log_filter(), "luamemzip=info,memzip=info");
    }
}
