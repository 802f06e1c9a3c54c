//! store subcommands - drive a LineStore from the shell

use clap::{Args, Subcommand};
use linestore::{
    compact_file, similarity, AppendResult, CompactOptions, LineLog, LineStore, SharedStore,
    SimilarityResult, StoreConfig,
};
use std::path::PathBuf;
use std::string::FromUtf8Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

#[derive(Args)]
pub struct StoreArgs {
    /// Line log path (default: $NEARLINE_PATH or ~/.nearline/lines.txt)
    #[arg(short, long, global = true)]
    path: Option<PathBuf>,
    /// Similarity threshold in (0, 1] (default: $NEARLINE_THRESHOLD or 0.9)
    #[arg(short, long, global = true)]
    threshold: Option<f64>,
}

impl StoreArgs {
    fn config(&self) -> StoreConfig {
        let mut config = StoreConfig::from_env();
        if let Some(path) = &self.path {
            config = config.with_path(path);
        }
        if let Some(threshold) = self.threshold {
            config = config.with_threshold(threshold);
        }
        config
    }
}

#[derive(Subcommand)]
pub enum StoreCommands {
    /// Append lines unless they are near-duplicates
    Append {
        /// Candidate lines
        #[arg(required = true)]
        lines: Vec<String>,
    },
    /// Append every line read from stdin
    Ingest {
        /// Print one JSON outcome per line
        #[arg(long)]
        json: bool,
    },
    /// Check a line against the store without writing
    Check {
        /// Candidate line
        line: String,
    },
    /// Show number of stored lines
    Count,
    /// Print the similarity of two strings
    Similarity {
        a: String,
        b: String,
    },
    /// Deduplicate an existing line file into a new file
    Compact {
        /// Input file
        input: PathBuf,
        /// Output file (may equal input)
        output: PathBuf,
        /// Compare only the part before the last occurrence of this character
        #[arg(short = 'd', long)]
        key_delimiter: Option<char>,
    },
}

pub async fn run(args: StoreArgs, cmd: StoreCommands) -> anyhow::Result<()> {
    match cmd {
        StoreCommands::Append { lines } => cmd_append(&args, &lines),
        StoreCommands::Ingest { json } => cmd_ingest(&args, json).await,
        StoreCommands::Check { line } => cmd_check(&args, &line),
        StoreCommands::Count => cmd_count(&args),
        StoreCommands::Similarity { a, b } => {
            println!("{:.4}", similarity(&a, &b));
            Ok(())
        }
        StoreCommands::Compact { input, output, key_delimiter } => {
            cmd_compact(&args, &input, &output, key_delimiter)
        }
    }
}

fn open_store(args: &StoreArgs) -> anyhow::Result<LineStore> {
    Ok(LineStore::from_config(&args.config())?)
}

// ==================== Append ====================

fn cmd_append(args: &StoreArgs, lines: &[String]) -> anyhow::Result<()> {
    let mut store = open_store(args)?;
    let mut failed = 0;

    for line in lines {
        let result = store.append(line)?;
        if matches!(result, AppendResult::Failed { .. }) {
            failed += 1;
        }
        println!("{}", describe(&result));
    }

    if failed > 0 {
        anyhow::bail!("{} line(s) could not be written to {}", failed, store.log().path().display());
    }
    Ok(())
}

// ==================== Ingest ====================

#[derive(Default)]
struct IngestSummary {
    accepted: usize,
    rejected: usize,
    failed: usize,
}

impl IngestSummary {
    fn record(&mut self, result: &AppendResult) {
        match result {
            AppendResult::Accepted => self.accepted += 1,
            AppendResult::Failed { .. } => self.failed += 1,
            _ => self.rejected += 1,
        }
    }
}

async fn cmd_ingest(args: &StoreArgs, json: bool) -> anyhow::Result<()> {
    let store = SharedStore::new(open_store(args)?);
    store.initialize().await?;

    let mut summary = IngestSummary::default();
    let read = ingest_lines(&store, BufReader::new(tokio::io::stdin()), json, &mut summary).await;

    eprintln!(
        "Ingested: {} accepted, {} rejected, {} failed ({} lines stored)",
        summary.accepted,
        summary.rejected,
        summary.failed,
        store.line_count().await
    );

    read?;
    if summary.failed > 0 {
        anyhow::bail!("{} line(s) could not be written", summary.failed);
    }
    Ok(())
}

/// Feed every line of `reader` to the store. A line that is not valid UTF-8
/// counts as failed and the rest of the input is still processed.
async fn ingest_lines<R, L>(
    store: &SharedStore<L>,
    mut reader: R,
    json: bool,
    summary: &mut IngestSummary,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    L: LineLog + 'static,
{
    let mut buf = Vec::new();
    let mut line_no = 0usize;

    while reader.read_until(b'\n', &mut buf).await? > 0 {
        line_no += 1;
        let result = match decode_line(std::mem::take(&mut buf)) {
            Ok(line) => store.append(&line).await?,
            Err(e) => AppendResult::Failed {
                error: format!("input line {} is not valid UTF-8: {}", line_no, e),
            },
        };
        summary.record(&result);

        if json {
            println!("{}", serde_json::to_string(&result)?);
        } else {
            println!("{}", describe(&result));
        }
    }
    Ok(())
}

/// Strip the `\n` / `\r\n` terminator and decode.
fn decode_line(mut raw: Vec<u8>) -> Result<String, FromUtf8Error> {
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    String::from_utf8(raw)
}

// ==================== Check / Count ====================

fn cmd_check(args: &StoreArgs, line: &str) -> anyhow::Result<()> {
    let mut store = open_store(args)?;
    store.initialize()?;

    match store.check_similar(line.trim()) {
        SimilarityResult::Similar { similar_to, similarity } => {
            println!("similar ({:.1}%): {}", similarity * 100.0, similar_to);
        }
        SimilarityResult::NoMatch => println!("no match"),
    }
    Ok(())
}

fn cmd_count(args: &StoreArgs) -> anyhow::Result<()> {
    let mut store = open_store(args)?;
    store.initialize()?;
    println!("{}", store.line_count());
    Ok(())
}

// ==================== Compact ====================

fn cmd_compact(
    args: &StoreArgs,
    input: &std::path::Path,
    output: &std::path::Path,
    key_delimiter: Option<char>,
) -> anyhow::Result<()> {
    let options = CompactOptions {
        threshold: args.config().threshold,
        key_delimiter,
    };
    let stats = compact_file(input, output, &options)?;

    println!("Processing complete:");
    println!("  Total lines processed: {}", stats.total);
    println!("  Unique lines: {}", stats.unique);
    println!("  Duplicates removed: {}", stats.removed);
    Ok(())
}

fn describe(result: &AppendResult) -> String {
    match result {
        AppendResult::Accepted => "accepted".to_string(),
        AppendResult::RejectedEmpty => "rejected: empty line".to_string(),
        AppendResult::RejectedMultiline => "rejected: line contains a line break".to_string(),
        AppendResult::RejectedSimilar { similarity, similar_to } => {
            format!("rejected: {:.1}% similar to {:?}", similarity * 100.0, similar_to)
        }
        AppendResult::Failed { error } => format!("failed: {}", error),
    }
}
