//! jsb CLI - Command-line tool for Football Manager match-engine `.jsb` files.
//!
//! This is the main entry point for the jsb command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use walkdir::WalkDir;

use jsb::prelude::*;

/// jsb - decode, edit and re-encode match-engine .jsb files
#[derive(Parser)]
#[command(name = "jsb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory with extra layout recipes
    #[arg(long, global = true, env = "JSB_LAYOUT_DIR")]
    layout_dir: Option<PathBuf>,

    /// Game build whose layout to use (newest known when absent)
    #[arg(long, global = true, env = "JSB_BUILD")]
    build: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// How to pick the layout for a `.jsb` file.
#[derive(Args, Clone)]
struct LayoutArgs {
    /// File variant (guessed from the file name or contents when absent)
    #[arg(long)]
    variant: Option<FileVariant>,

    /// Layout table or recipe to use instead of the built-in one
    #[arg(short, long)]
    layout: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a .jsb file into a JSON document
    Decode {
        /// Input .jsb file
        input: PathBuf,

        /// Output JSON file (defaults to the input with a .json extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Encode an edited JSON document using the file it was decoded from
    Encode {
        /// Edited JSON document
        document: PathBuf,

        /// The .jsb file the document was decoded from
        #[arg(long)]
        original: PathBuf,

        /// Output .jsb file
        #[arg(short, long)]
        output: PathBuf,

        /// Layout table or recipe to use instead of the built-in one
        #[arg(short, long)]
        layout: Option<PathBuf>,
    },

    /// Check that files decode and re-encode byte for byte
    Validate {
        /// Files, directories or glob patterns
        #[arg(required = true)]
        paths: Vec<String>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Resolve a layout against a file, or list the known layouts
    Layout {
        /// .jsb file to resolve the layout against
        input: Option<PathBuf>,

        /// Output layout table JSON (printed when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Apply edits (a JSON object of key -> value) to a .jsb file
    Patch {
        /// Input .jsb file
        input: PathBuf,

        /// JSON object of edits
        edits: PathBuf,

        /// Output .jsb file (defaults to patching the input in place)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Check a .jsb file against desired values (a JSON object of key -> value)
    Verify {
        /// Input .jsb file
        input: PathBuf,

        /// JSON object of desired values
        desired: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// List keys whose copies in a .jsb file hold different values
    Compare {
        /// Input .jsb file
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let layouts = Layouts::new(cli.layout_dir.as_deref(), cli.build)?;

    match cli.command {
        Commands::Decode { input, output, layout } => {
            cmd_decode(&layouts, &input, output.as_deref(), &layout)?;
        }
        Commands::Encode {
            document,
            original,
            output,
            layout,
        } => {
            cmd_encode(&layouts, &document, &original, &output, layout.as_deref())?;
        }
        Commands::Validate { paths, layout } => {
            cmd_validate(&layouts, &paths, &layout)?;
        }
        Commands::Layout { input, output, layout } => {
            cmd_layout(&layouts, input.as_deref(), output.as_deref(), &layout)?;
        }
        Commands::Patch {
            input,
            edits,
            output,
            dry_run,
            layout,
        } => {
            cmd_patch(&layouts, &input, &edits, output.as_deref(), dry_run, &layout)?;
        }
        Commands::Verify { input, desired, layout } => {
            cmd_verify(&layouts, &input, &desired, &layout)?;
        }
        Commands::Compare { input, layout } => {
            cmd_compare(&layouts, &input, &layout)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Built-in recipes plus any loaded from the layout directory.
struct Layouts {
    registry: LayoutRegistry,
    build: Option<String>,
}

impl Layouts {
    fn new(layout_dir: Option<&Path>, build: Option<String>) -> Result<Self> {
        let mut registry = LayoutRegistry::builtin().context("Failed to load built-in layouts")?;
        if let Some(dir) = layout_dir {
            let loaded = registry
                .load_dir(dir)
                .with_context(|| format!("Failed to read layout directory {}", dir.display()))?;
            tracing::debug!(dir = %dir.display(), loaded, "loaded layout recipes");
        }
        Ok(Self { registry, build })
    }

    /// Layout for a `.jsb` file.
    fn for_file(&self, path: &Path, data: &[u8], args: &LayoutArgs) -> Result<LayoutTable> {
        if let Some(layout_path) = &args.layout {
            return LayoutFile::load(layout_path)
                .and_then(|file| file.into_table(data))
                .with_context(|| format!("Failed to resolve layout {}", layout_path.display()));
        }

        let variant = match args.variant {
            Some(variant) => variant,
            None => FileVariant::from_path(path)
                .or_else(|| FileVariant::detect(data))
                .with_context(|| format!("Cannot tell which file {} is; pass --variant", path.display()))?,
        };

        self.resolve(variant, self.build.as_deref(), data)
    }

    fn resolve(&self, variant: FileVariant, build: Option<&str>, data: &[u8]) -> Result<LayoutTable> {
        let recipe = self.registry.find(variant, build)?;
        tracing::debug!(variant = %recipe.variant, build = %recipe.build, "using layout recipe");
        recipe
            .resolve(data)
            .with_context(|| format!("Layout {} build {} does not match this file", recipe.variant, recipe.build))
    }
}

/// Write through a sibling temporary file so no partial output survives an error.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    fs::write(&tmp, contents).with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_field_map(path: &Path) -> Result<FieldMap> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a JSON object of values", path.display()))
}

fn cmd_decode(layouts: &Layouts, input: &Path, output: Option<&Path>, args: &LayoutArgs) -> Result<()> {
    let data = read_input(input)?;
    let layout = layouts.for_file(input, &data, args)?;

    let start = Instant::now();
    let doc = decode(&data, &layout).context("Failed to decode")?;

    let output = output.map_or_else(|| input.with_extension("json"), Path::to_path_buf);
    write_atomic(&output, doc.to_json()?.as_bytes())?;

    println!(
        "Decoded {} fields ({} opaque bytes) in {:?} -> {}",
        doc.fields.len(),
        doc.opaque_bytes(),
        start.elapsed(),
        output.display()
    );

    Ok(())
}

fn cmd_encode(layouts: &Layouts, document: &Path, original: &Path, output: &Path, layout: Option<&Path>) -> Result<()> {
    let doc = DecodedDocument::load(document).context("Failed to read document")?;
    let data = read_input(original)?;

    let layout = match layout {
        Some(path) => LayoutFile::load(path)
            .and_then(|file| file.into_table(&data))
            .with_context(|| format!("Failed to resolve layout {}", path.display()))?,
        None => layouts.resolve(doc.source.variant, Some(&doc.source.build), &data)?,
    };

    let out = encode_against(&doc, &layout, &data).context("Failed to encode")?;
    write_atomic(output, &out)?;

    println!("Encoded {} fields, {} bytes -> {}", doc.fields.len(), out.len(), output.display());

    Ok(())
}

/// Expand files, directories (every `.jsb` below them) and glob patterns.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_dir() {
            for entry in WalkDir::new(path) {
                let entry = entry?;
                if entry.file_type().is_file() && entry.path().extension().and_then(|e| e.to_str()) == Some("jsb") {
                    files.push(entry.into_path());
                }
            }
        } else if path.exists() {
            files.push(path.to_path_buf());
        } else {
            let matches = glob::glob(pattern).with_context(|| format!("Bad pattern: {pattern}"))?;
            let before = files.len();
            for entry in matches {
                files.push(entry?);
            }
            if files.len() == before {
                bail!("No files match {pattern}");
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn cmd_validate(layouts: &Layouts, patterns: &[String], args: &LayoutArgs) -> Result<()> {
    let files = expand_paths(patterns)?;
    println!("Validating {} files...", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let failures = AtomicUsize::new(0);

    let results: Vec<(PathBuf, Result<ValidationReport>)> = files
        .into_par_iter()
        .map(|path| {
            let result = read_input(&path).and_then(|data| {
                let layout = layouts.for_file(&path, &data, args)?;
                Ok(validate(&data, &layout)?)
            });
            if !matches!(&result, Ok(report) if report.is_ok()) {
                failures.fetch_add(1, Ordering::Relaxed);
            }
            pb.inc(1);
            (path, result)
        })
        .collect();

    pb.finish_and_clear();

    for (path, result) in &results {
        match result {
            Ok(report) => println!("{}: {}", path.display(), report),
            Err(err) => println!("{}: ERROR: {:#}", path.display(), err),
        }
    }

    let failures = failures.into_inner();
    println!(
        "\n{} passed, {} failed in {:?}",
        results.len() - failures,
        failures,
        start.elapsed()
    );

    if failures > 0 {
        bail!("{failures} of {} files failed validation", results.len());
    }

    Ok(())
}

fn cmd_layout(layouts: &Layouts, input: Option<&Path>, output: Option<&Path>, args: &LayoutArgs) -> Result<()> {
    let Some(input) = input else {
        for recipe in layouts.registry.recipes() {
            println!(
                "{:<22} {:<8} {:>4} anchors {:>2} scan regions",
                recipe.variant,
                recipe.build,
                recipe.anchors.len(),
                recipe.scans.len()
            );
        }
        return Ok(());
    };

    let data = read_input(input)?;
    let layout = layouts.for_file(input, &data, args)?;
    let json = layout.to_json()?;

    match output {
        Some(output) => {
            write_atomic(output, json.as_bytes())?;
            println!(
                "Resolved {} fields ({} bytes) -> {}",
                layout.len(),
                layout.field_bytes(),
                output.display()
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_patch(
    layouts: &Layouts,
    input: &Path,
    edits: &Path,
    output: Option<&Path>,
    dry_run: bool,
    args: &LayoutArgs,
) -> Result<()> {
    let data = read_input(input)?;
    let layout = layouts.for_file(input, &data, args)?;
    let edits = read_field_map(edits)?;

    let mut doc = decode(&data, &layout).context("Failed to decode")?;
    let report = apply_patch(&mut doc, &layout, &edits).context("Failed to apply edits")?;

    for update in report.changed() {
        println!("{}: {} -> {}", update.field, update.old, update.new);
    }
    for key in &report.unknown {
        println!("{key}: no such field, skipped");
    }

    if dry_run {
        println!("Dry run: {} fields would change", report.changed().count());
        return Ok(());
    }

    let out = encode_document(&doc, &layout).context("Failed to encode")?;
    let output = output.unwrap_or(input);
    write_atomic(output, &out)?;

    println!("Patched {} fields -> {}", report.changed().count(), output.display());

    Ok(())
}

fn cmd_verify(layouts: &Layouts, input: &Path, desired: &Path, args: &LayoutArgs) -> Result<()> {
    let data = read_input(input)?;
    let layout = layouts.for_file(input, &data, args)?;
    let desired = read_field_map(desired)?;

    let doc = decode(&data, &layout).context("Failed to decode")?;
    let report = verify(&doc, &layout, &desired)?;

    for failure in &report.failed {
        let found: Vec<String> = failure
            .found
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("FAIL {}: expected {}, found {}", failure.key, failure.expected, found.join(", "));
    }
    for key in &report.disagreements {
        println!("WARN {key}: copies disagree");
    }
    for key in &report.unknown {
        println!("WARN {key}: no such field");
    }

    println!(
        "{} passed, {} failed, {} unknown",
        report.passed.len(),
        report.failed.len(),
        report.unknown.len()
    );

    if !report.is_ok() {
        bail!("{} values do not match", report.failed.len());
    }

    Ok(())
}

fn cmd_compare(layouts: &Layouts, input: &Path, args: &LayoutArgs) -> Result<()> {
    let data = read_input(input)?;
    let layout = layouts.for_file(input, &data, args)?;

    let doc = decode(&data, &layout).context("Failed to decode")?;
    let differences = compare_copies(&doc, &layout)?;

    for diff in &differences {
        let values: Vec<String> = diff
            .values
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("{}: {}", diff.key, values.join(", "));
    }

    println!("{} keys differ between copies", differences.len());

    Ok(())
}
