use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use flate2::read::GzDecoder;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use rowpack_codecs::{codec_by_id, codec_by_name};
use rowpack_core::format::DEFAULT_ROWS_PER_BLOCK;
use rowpack_core::{column, csv};
use rowpack_core::{ColumnDescriptor, RowCursor, RowReader, RowWriter, TypeCodec, TypeEvidence};

// ── CLI definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "rowpack",
    about = "Import CSV into typed RPAK1 row files, inspect them, and read rows at random",
    version
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV file into an RPAK1 row file
    Import {
        /// CSV source ("-" reads stdin, *.gz is gunzipped)
        input: PathBuf,
        /// Destination RPAK1 file
        output: PathBuf,
        /// Block codec: passthrough | zstd | lz4 | shuffle-zstd
        #[arg(short, long, default_value = "zstd")]
        codec: String,
        /// Zstd compression level (1–22, zstd and shuffle-zstd only)
        #[arg(long, default_value_t = 3)]
        zstd_level: i32,
        /// Rows per compressed block
        #[arg(short, long, default_value_t = DEFAULT_ROWS_PER_BLOCK)]
        rows_per_block: u32,
        /// Force a column's type instead of deducing it, as name:type
        /// (e.g. --column zip:string --column score:f32)
        #[arg(long = "column", value_name = "NAME:TYPE")]
        columns: Vec<String>,
    },
    /// Print the row layout deduced from a CSV file
    Schema {
        /// CSV source ("-" reads stdin, *.gz is gunzipped)
        input: PathBuf,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print header, schema and block index statistics of a row file
    Inspect {
        /// RPAK1 file to inspect
        file: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
    /// Write a row file back out as CSV
    Export {
        /// Source RPAK1 file
        input: PathBuf,
        /// Destination CSV ("-" writes to stdout)
        output: PathBuf,
        /// Comma-separated column names to keep, in output order
        #[arg(long)]
        columns: Option<String>,
    },
    /// Decode a single row, touching only the block that holds it
    ReadRow {
        /// RPAK1 file
        file: PathBuf,
        /// Zero-based row index
        #[arg(short, long)]
        index: u64,
    },
}

// ── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

/// Whole CSV input in memory: stdin for "-", gunzipped for *.gz.
fn read_input(input: &Path) -> anyhow::Result<Arc<[u8]>> {
    let mut bytes = Vec::new();
    if input.to_str() == Some("-") {
        io::stdin().lock().read_to_end(&mut bytes)?;
    } else {
        let file = File::open(input).with_context(|| format!("opening input file {:?}", input))?;
        if input.extension().is_some_and(|ext| ext == "gz") {
            GzDecoder::new(file)
                .read_to_end(&mut bytes)
                .with_context(|| format!("gunzipping {:?}", input))?;
        } else {
            io::BufReader::new(file).read_to_end(&mut bytes)?;
        }
    }
    debug!(bytes = bytes.len(), "input read");
    Ok(bytes.into())
}

fn parse_overrides(specs: &[String]) -> anyhow::Result<HashMap<String, TypeCodec>> {
    specs
        .iter()
        .map(|spec| {
            let (name, ty) = spec
                .rsplit_once(':')
                .with_context(|| format!("--column {:?} is not NAME:TYPE", spec))?;
            let codec: TypeCodec = ty.parse()?;
            Ok((name.to_string(), codec))
        })
        .collect()
}

/// Scan `bytes` once with evidence and lay the columns out back to back.
/// Overridden columns keep their forced codec; variable-width slots are as
/// wide as the widest field seen.
fn csv_layout(
    bytes: &Arc<[u8]>,
    overrides: &HashMap<String, TypeCodec>,
) -> anyhow::Result<(RowCursor, Vec<ColumnDescriptor>)> {
    let mut evidence: Vec<TypeEvidence> = Vec::new();
    let segments = csv::parse_segments(Arc::clone(bytes), Some(&mut evidence))?;
    let names = segments.names();
    for name in overrides.keys() {
        if !names.contains(name) {
            anyhow::bail!("--column {:?} does not match any header column", name);
        }
    }
    let layout = column::layout(names.iter().zip(&evidence).map(|(name, ev)| {
        let codec = overrides
            .get(name)
            .copied()
            .unwrap_or_else(|| ev.deduce().codec);
        (name.clone(), codec, ev.column_length as usize)
    }))?;
    Ok((segments, layout))
}

fn open_reader(file: &Path) -> anyhow::Result<RowReader> {
    let header = RowReader::peek_header(file)?;
    let codec = codec_by_id(header.codec_id)?;
    RowReader::open(file, codec)
}

/// Render one exported CSV field.
///
/// Imported cells keep their raw bytes, quotes and escapes included, so
/// text that leaves the tokenizer with no open quote or escape and no bare
/// separator is written verbatim. Anything else is double-quoted with
/// every quote, backslash and line break escaped.
fn csv_field(text: &str) -> String {
    if reads_back_whole(text) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        if matches!(c, '\\' | '"' | '\'' | '\n' | '\r') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn reads_back_whole(text: &str) -> bool {
    let (mut quote, mut double_quote, mut escape) = (false, false, false);
    for b in text.bytes() {
        if escape {
            escape = false;
            continue;
        }
        match b {
            b'"' => double_quote = !double_quote,
            b'\'' => quote = !quote,
            b'\\' => escape = true,
            b'\r' | b'\n' => return false,
            b',' if !quote && !double_quote => return false,
            _ => {}
        }
    }
    !(quote || double_quote || escape)
}

// ── Subcommand implementations ─────────────────────────────────────────────

fn run_import(
    input: PathBuf,
    output: PathBuf,
    codec_name: &str,
    zstd_level: i32,
    rows_per_block: u32,
    columns: &[String],
) -> anyhow::Result<()> {
    let codec = codec_by_name(codec_name, zstd_level)?;
    let codec_display = codec.name().to_string();
    let overrides = parse_overrides(columns)?;

    let t0 = Instant::now();
    let bytes = read_input(&input)?;
    let (segments, layout) = csv_layout(&bytes, &overrides)?;
    info!(rows = segments.len(), columns = layout.len(), "csv scanned");

    let typed = csv::parse_conformant(Arc::clone(&bytes), Some(layout.clone()), None)?;
    let mut writer = RowWriter::create(&output, layout, codec, rows_per_block)
        .with_context(|| format!("creating output file {:?}", output))?;
    let row_len = column::row_len(writer.layout());
    writer.write_cursor(&typed)?;
    let rows = writer.finish()?;
    let elapsed = t0.elapsed();

    let file_size = std::fs::metadata(&output)?.len();
    eprintln!("  codec       : {}", codec_display);
    eprintln!("  rows        : {}", rows);
    eprintln!("  columns     : {}", typed.width());
    eprintln!("  row width   : {} B", row_len);
    eprintln!("  csv size    : {}", human_bytes(bytes.len() as u64));
    eprintln!("  row file    : {}", human_bytes(file_size));
    eprintln!(
        "  ratio       : {:.2}x",
        bytes.len() as f64 / file_size.max(1) as f64
    );
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_schema(input: PathBuf, json: bool) -> anyhow::Result<()> {
    let bytes = read_input(&input)?;
    let (segments, layout) = csv_layout(&bytes, &HashMap::new())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }
    println!("=== {} rows, {} B per row ===", segments.len(), column::row_len(&layout));
    println!();
    println!("  {:<24}  {:>8}  {:>8}  {:>8}", "column", "codec", "begin", "end");
    println!("  {}", "-".repeat(54));
    for col in &layout {
        println!(
            "  {:<24}  {:>8}  {:>8}  {:>8}",
            col.name, col.codec, col.begin, col.end
        );
    }
    Ok(())
}

fn run_inspect(file: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let reader = open_reader(&file)?;
    let codec = codec_by_id(reader.header.codec_id)?;
    let file_size = std::fs::metadata(&file)?.len();

    println!("=== RPAK1 File: {:?} ===", file);
    println!();
    println!("  format version : {}", reader.header.version);
    println!("  codec          : {} (id={})", codec.name(), reader.header.codec_id);
    println!("  byte order     : {:?}", reader.header.byte_order);
    println!("  rows           : {}", reader.row_count());
    println!("  row width      : {} B", reader.row_len());
    println!("  rows per block : {}", reader.header.rows_per_block);
    println!("  block count    : {}", reader.block_count());
    println!("  raw size       : {}", human_bytes(reader.raw_size()));
    println!("  compressed     : {}", human_bytes(reader.compressed_size()));
    println!("  file on disk   : {}", human_bytes(file_size));
    println!("  ratio          : {:.2}x", reader.ratio());
    println!("  flags          : 0x{:016x}", reader.header.flags);

    println!();
    println!("  {:<24}  {:>8}  {:>8}  {:>8}", "column", "codec", "begin", "end");
    println!("  {}", "-".repeat(54));
    for col in reader.layout() {
        println!(
            "  {:<24}  {:>8}  {:>8}  {:>8}",
            col.name, col.codec, col.begin, col.end
        );
    }

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>14}  {:>10}  {:>12}  {:>12}  {:>16}",
            "block", "file offset", "first row", "compressed", "raw", "checksum"
        );
        println!("  {}", "-".repeat(78));
        for (i, e) in reader.entries().iter().enumerate() {
            println!(
                "  {:>8}  {:>14}  {:>10}  {:>12}  {:>12}  {:016x}",
                i,
                e.offset,
                e.first_row,
                human_bytes(e.compressed_len as u64),
                human_bytes(e.raw_len as u64),
                e.checksum
            );
        }
    }
    Ok(())
}

fn run_export(input: PathBuf, output: PathBuf, columns: Option<String>) -> anyhow::Result<()> {
    let reader = open_reader(&input)?;
    let mut cursor = reader.into_cursor()?;
    if let Some(list) = columns {
        let names: Vec<&str> = list.split(',').map(str::trim).collect();
        cursor = cursor.select_names(&names)?;
    }

    let dst: Box<dyn Write> = if output.to_str() == Some("-") {
        Box::new(io::stdout().lock())
    } else {
        Box::new(
            File::create(&output).with_context(|| format!("creating output file {:?}", output))?,
        )
    };
    let mut dst = BufWriter::new(dst);

    let header: Vec<String> = cursor.names().iter().map(|n| csv_field(n)).collect();
    writeln!(dst, "{}", header.join(","))?;
    for row in cursor.rows() {
        let fields: Vec<String> = row
            .values()?
            .iter()
            .map(|v| csv_field(&v.to_string()))
            .collect();
        writeln!(dst, "{}", fields.join(","))?;
    }
    dst.flush()?;
    info!(rows = cursor.len(), columns = cursor.width(), "exported");
    Ok(())
}

fn run_read_row(file: PathBuf, index: u64) -> anyhow::Result<()> {
    let mut reader = open_reader(&file)?;
    let block = index / reader.header.rows_per_block.max(1) as u64;
    eprintln!("seeking to row {} (block {})...", index, block);

    let t0 = Instant::now();
    let values = reader.read_row(index)?;
    let elapsed = t0.elapsed();
    eprintln!("  decoded in {:.3}ms", elapsed.as_secs_f64() * 1000.0);

    println!("--- row {} ---", index);
    for (col, value) in reader.layout().iter().zip(&values) {
        println!("  {:<24} {:>8}  {}", col.name, col.codec, value);
    }
    Ok(())
}

// ── Entry point ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Commands::Import {
            input,
            output,
            codec,
            zstd_level,
            rows_per_block,
            columns,
        } => run_import(input, output, &codec, zstd_level, rows_per_block, &columns),
        Commands::Schema { input, json } => run_schema(input, json),
        Commands::Inspect { file, blocks } => run_inspect(file, blocks),
        Commands::Export {
            input,
            output,
            columns,
        } => run_export(input, output, columns),
        Commands::ReadRow { file, index } => run_read_row(file, index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fields the tokenizer reads from `fields` exported as one line.
    fn reimported(fields: &[&str]) -> Vec<String> {
        let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
        let parsed = csv::parse_line(line.as_bytes(), 0, -1, None).unwrap();
        parsed
            .fields
            .iter()
            .map(|r| line[r.start as usize..r.end as usize].to_string())
            .collect()
    }

    #[test]
    fn imported_text_exports_verbatim() {
        for text in ["plain", "\"x, y\"", "'a,b'", "x\\,y", "-3.5", "caf\u{e9}", ""] {
            assert_eq!(csv_field(text), text);
            assert_eq!(reimported(&[text, "z"]), [text, "z"]);
        }
    }

    #[test]
    fn open_quotes_and_separators_stay_in_one_field() {
        for text in ["a,b", "say \"hi", "it's", "two\nlines", "trailing\\"] {
            let field = csv_field(text);
            assert!(field.starts_with('"') && field.ends_with('"'), "{field:?}");
            let back = reimported(&[text, "z"]);
            assert_eq!(back.len(), 2, "{text:?} leaked into the next field");
            assert_eq!(back[1], "z");
        }
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("it's"), "\"it\\'s\"");
    }

    #[test]
    fn human_bytes_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(2048), "2.00 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }
}
