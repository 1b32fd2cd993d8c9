// modbreaker/src/main.rs
//! ModBreaker CLI
//!
//! Command-line interface for PBO listing and extraction, P3D and config
//! inspection, and catalog scans of whole mod folders.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info};

use modbreaker_catalog::{Catalog, CatalogBuilder, CatalogOptions};
use modbreaker_parsers::config::{ClassHierarchy, ConfigReader, ConfigSection};
use modbreaker_parsers::logging::{self, TracingConfig};
use modbreaker_parsers::p3d::parse_mesh;
use modbreaker_parsers::pbo::{format_bytes, PboArchive, PboEntry};
use modbreaker_parsers::signature::{detect_named, FileFormat, FileKind};
use modbreaker_parsers::{economy, paa, read_source, rvmat, ParseOptions};

/// ModBreaker - DayZ mod ingestion tool
#[derive(Parser)]
#[command(name = "modbreaker")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format for structured data
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// JSON file with parser options
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Triangles kept per mesh
    #[arg(long, global = true)]
    max_triangles: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List the entries of a PBO archive
    List(ListArgs),

    /// Extract files from a PBO archive
    Extract(ExtractArgs),

    /// Show what a file is and what it holds
    Info(InfoArgs),

    /// Parse a P3D mesh
    Mesh(MeshArgs),

    /// Read a config.bin / config.cpp
    Config(ConfigArgs),

    /// Build the catalog of a mod folder or PBO
    Scan(ScanArgs),

    /// Show archive statistics
    Stats(StatsArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Path to the PBO archive
    archive: PathBuf,

    /// Filter by path pattern (glob-style, case-insensitive)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Sort by: name, size, offset
    #[arg(long, default_value = "name")]
    sort: String,
}

#[derive(Args)]
struct ExtractArgs {
    /// Path to the PBO archive
    archive: PathBuf,

    /// Output directory
    #[arg(short, long)]
    output: PathBuf,

    /// Filter by path pattern (glob-style, case-insensitive)
    #[arg(short, long)]
    pattern: Option<String>,

    /// Extract specific entry names (can be repeated)
    #[arg(long)]
    file: Vec<String>,

    /// Overwrite existing files
    #[arg(long)]
    overwrite: bool,

    /// Dry run - show what would be extracted
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct InfoArgs {
    /// File on disk, or entry name with --archive
    path: String,

    /// Read the path from inside this PBO
    #[arg(short, long)]
    archive: Option<PathBuf>,
}

#[derive(Args)]
struct MeshArgs {
    /// P3D on disk, or entry name with --archive
    path: String,

    /// Read the path from inside this PBO
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Print every vertex and triangle
    #[arg(long)]
    geometry: bool,
}

#[derive(Args)]
struct ConfigArgs {
    /// Config on disk, or entry name with --archive
    path: String,

    /// Read the path from inside this PBO
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Show the effective properties of one class
    #[arg(long)]
    class: Option<String>,
}

#[derive(Args)]
struct ScanArgs {
    /// Mod folder or single PBO
    path: PathBuf,

    /// Keep full mesh geometry in JSON output
    #[arg(long)]
    geometry: bool,

    /// Skip texture and material lookup
    #[arg(long)]
    no_sidecars: bool,

    /// Only classes with a model
    #[arg(long)]
    models_only: bool,

    /// Keep only these sections (can be repeated)
    #[arg(long, value_parser = parse_section)]
    section: Vec<ConfigSection>,
}

#[derive(Args)]
struct StatsArgs {
    /// Path to the PBO archive
    archive: PathBuf,

    /// Show top N largest entries
    #[arg(long, default_value = "10")]
    top: usize,
}

fn parse_section(s: &str) -> Result<ConfigSection, String> {
    ConfigSection::from_name(s).ok_or_else(|| format!("Unknown section: {}", s))
}

fn setup_logging(verbosity: u8) {
    let config = TracingConfig {
        show_target: verbosity >= 2,
        show_file: verbosity >= 3,
        show_line_number: verbosity >= 3,
        ..TracingConfig::from_verbosity(verbosity)
    };
    logging::init_with_config(config);
}

/// Defaults, then the options file, then per-flag overrides
fn load_options(cli: &Cli) -> Result<ParseOptions> {
    let mut options = match &cli.options {
        Some(path) => {
            let text = fs::read_to_string(path).with_context(|| format!("Failed to read options file {:?}", path))?;
            ParseOptions::from_json(&text).with_context(|| format!("Invalid options file {:?}", path))?
        }
        None => ParseOptions::default(),
    };
    if let Some(max) = cli.max_triangles {
        options.mesh.max_triangles = max;
    }
    Ok(options)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let options = load_options(&cli)?;

    match cli.command {
        Commands::List(args) => cmd_list(args, &options, cli.format),
        Commands::Extract(args) => cmd_extract(args, &options),
        Commands::Info(args) => cmd_info(args, &options, cli.format),
        Commands::Mesh(args) => cmd_mesh(args, &options, cli.format),
        Commands::Config(args) => cmd_config(args, &options, cli.format),
        Commands::Scan(args) => cmd_scan(args, options, cli.format),
        Commands::Stats(args) => cmd_stats(args, &options, cli.format),
    }
}

fn open_archive(path: &Path, options: &ParseOptions) -> Result<PboArchive> {
    info!("Opening archive: {:?}", path);
    let data = read_source(path, options).with_context(|| format!("Failed to read {:?}", path))?;
    PboArchive::open_with_options(data, &options.archive).with_context(|| format!("Failed to open PBO {:?}", path))
}

/// Bytes of a file on disk, or of an entry inside `archive`
fn load_payload(path: &str, archive: Option<&Path>, options: &ParseOptions) -> Result<Bytes> {
    match archive {
        Some(archive_path) => {
            let archive = open_archive(archive_path, options)?;
            archive
                .extract_by_name(path)
                .with_context(|| format!("Failed to extract {} from {:?}", path, archive_path))
        }
        None => read_source(Path::new(path), options).with_context(|| format!("Failed to read {}", path)),
    }
}

fn cmd_list(args: ListArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    let archive = open_archive(&args.archive, options)?;

    let mut entries: Vec<&PboEntry> = match &args.pattern {
        Some(pattern) => archive.find(pattern),
        None => archive.list_entries().iter().collect(),
    };

    match args.sort.as_str() {
        "size" => entries.sort_by_key(|e| std::cmp::Reverse(e.original_size)),
        "offset" => entries.sort_by_key(|e| e.offset),
        _ => entries.sort_by_key(|e| e.folded_name()),
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if let Some(prefix) = archive.prefix() {
                println!("prefix: {}", prefix);
            }
            println!("{:<12} {:<12} {:<8} {:>10} Name", "Size", "Stored", "Packing", "Offset");
            println!("{:-<12} {:-<12} {:-<8} {:->10} {:-<40}", "", "", "", "", "");
            for entry in &entries {
                println!(
                    "{:<12} {:<12} {:<8} {:>10} {}",
                    format_bytes(u64::from(entry.original_size)),
                    format_bytes(u64::from(entry.data_size)),
                    entry.packing.to_string(),
                    entry.offset,
                    entry.name
                );
            }
            println!("\nTotal: {} entries", entries.len());
        }
    }

    Ok(())
}

fn cmd_extract(args: ExtractArgs, options: &ParseOptions) -> Result<()> {
    let archive = open_archive(&args.archive, options)?;

    let entries: Vec<&PboEntry> = if !args.file.is_empty() {
        args.file.iter().filter_map(|name| archive.get(name)).collect()
    } else if let Some(ref pattern) = args.pattern {
        archive.find(pattern)
    } else {
        archive.list_entries().iter().collect()
    };

    info!("Found {} files to extract", entries.len());

    if args.dry_run {
        println!("Dry run - would extract {} files:", entries.len());
        for entry in &entries {
            println!("  {}", entry.name);
        }
        return Ok(());
    }

    fs::create_dir_all(&args.output).context("Failed to create output directory")?;

    let mut extracted = 0;
    let mut skipped = 0;
    let mut errors = 0;

    for entry in entries {
        // Entry names use backslashes; never let them climb out of the output dir
        let relative: PathBuf = entry
            .name
            .split(['\\', '/'])
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
            .collect();
        let output_path = args.output.join(relative);

        if output_path.exists() && !args.overwrite {
            debug!("Skipping existing file: {:?}", output_path);
            skipped += 1;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        match archive.extract(entry) {
            Ok(data) => {
                fs::write(&output_path, &data)?;
                extracted += 1;
                debug!("Extracted: {}", entry.name);
            }
            Err(e) => {
                error!("Failed to extract {}: {}", entry.name, e);
                errors += 1;
            }
        }
    }

    println!("Extraction complete:");
    println!("  Extracted: {}", extracted);
    println!("  Skipped:   {}", skipped);
    println!("  Errors:    {}", errors);

    Ok(())
}

fn cmd_info(args: InfoArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    if args.archive.is_none() && !Path::new(&args.path).exists() {
        bail!("File not found: {}", args.path);
    }

    let data = load_payload(&args.path, args.archive.as_deref(), options)?;
    let detected = detect_named(&data, &args.path);
    let kind = FileKind::from_name(&args.path);

    if format == OutputFormat::Text {
        println!("Detected: {}", detected);
    }
    match (detected, kind) {
        (FileFormat::Archive, _) => {
            let archive = PboArchive::open_with_options(data, &options.archive)?;
            show_archive_info(&args.path, &archive, format)
        }
        (FileFormat::MlodMesh | FileFormat::OdolMesh, _) | (_, FileKind::Mesh) => {
            let (record, diagnostics) = parse_mesh(&data, &options.mesh).map_err(modbreaker_core::Error::from)?;
            print_value(format, &serde_json::json!({
                "type": "P3D",
                "variant": record.variant,
                "validity": record.validity.to_string(),
                "vertices": record.vertex_count(),
                "triangles": record.triangle_count(),
                "diagnostics": diagnostics,
            }))
        }
        (FileFormat::Config, _) | (_, FileKind::Config) => {
            let report = ConfigReader::with_options(options.config.clone()).read(&data);
            print_value(format, &serde_json::json!({
                "type": "config",
                "classes": report.hierarchy.len(),
                "diagnostics": report.diagnostics,
            }))
        }
        (FileFormat::Texture, _) | (_, FileKind::Texture) => {
            let texture = paa::read_info(&data)?;
            print_value(format, &serde_json::to_value(&texture)?)
        }
        (FileFormat::Material, _) | (_, FileKind::Material) => {
            let material = rvmat::read_material(&data, &options.config);
            print_value(format, &serde_json::to_value(&material)?)
        }
        (FileFormat::Xml, _) | (_, FileKind::Xml) => {
            let table = economy::read_types(&data)?;
            print_value(format, &serde_json::json!({
                "type": "types",
                "count": table.len(),
                "items": table,
            }))
        }
        _ => print_value(format, &serde_json::json!({
            "type": "unknown",
            "size": data.len(),
        })),
    }
}

fn show_archive_info(path: &str, archive: &PboArchive, format: OutputFormat) -> Result<()> {
    let stats = archive.statistics();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "type": "PBO",
                "path": path,
                "properties": archive.properties,
                "statistics": stats,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("PBO Archive: {}", path);
            for (key, value) in &archive.properties {
                println!("  {:<20}{}", format!("{}:", key), value);
            }
            println!("  Entries:            {}", stats.total_entries);
            println!("  Stored / packed:    {} / {}", stats.stored_count, stats.packed_count);
            println!("  Unsupported:        {}", stats.unsupported_count);
            println!("  Out of bounds:      {}", stats.out_of_bounds_count);
            println!("  Original size:      {}", format_bytes(stats.total_original));
            println!("  Stored size:        {}", format_bytes(stats.total_data));
        }
    }
    Ok(())
}

/// JSON as is; text as indented `key: value` lines
fn print_value(format: OutputFormat, value: &serde_json::Value) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print_text(value, 0),
    }
    Ok(())
}

fn print_text(value: &serde_json::Value, indent: usize) {
    let pad = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                match value {
                    serde_json::Value::Object(_) => {
                        println!("{}{}:", pad, key);
                        print_text(value, indent + 1);
                    }
                    other => println!("{}{}: {}", pad, key, other),
                }
            }
        }
        other => println!("{}{}", pad, other),
    }
}

fn cmd_mesh(args: MeshArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    let data = load_payload(&args.path, args.archive.as_deref(), options)?;
    let (record, diagnostics) = parse_mesh(&data, &options.mesh)
        .map_err(modbreaker_core::Error::from)
        .with_context(|| format!("Failed to parse {}", args.path))?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "path": args.path,
                "mesh": record,
                "diagnostics": diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Mesh: {}", args.path);
            println!("  Variant:            {:?}", record.variant);
            println!("  Validity:           {}", record.validity);
            println!("  Vertices:           {} (declared {})", record.vertex_count(), diagnostics.declared_vertices);
            println!("  Triangles:          {} (limit {})", record.triangle_count(), record.face_limit);
            println!("  Dropped triangles:  {}", diagnostics.dropped_triangles);
            println!("  Cut by limit:       {}", diagnostics.truncated_triangles);
            if let Some(bounds) = record.bounding_box {
                println!(
                    "  Bounds:             ({:.3}, {:.3}, {:.3}) - ({:.3}, {:.3}, {:.3})",
                    bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
                );
            }

            if args.geometry {
                println!("\nVertices:");
                for (i, [x, y, z]) in record.vertices.iter().enumerate() {
                    println!("  {:>6}: {:.4} {:.4} {:.4}", i, x, y, z);
                }
                println!("\nTriangles:");
                for [a, b, c] in &record.triangles {
                    println!("  {} {} {}", a, b, c);
                }
            }
        }
    }

    Ok(())
}

fn cmd_config(args: ConfigArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    let data = load_payload(&args.path, args.archive.as_deref(), options)?;
    let report = ConfigReader::with_options(options.config.clone()).read(&data);

    if let Some(name) = &args.class {
        return show_class(&report.hierarchy, name, format);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let diagnostics = &report.diagnostics;
            println!("Config: {}", args.path);
            println!("  Tier:               {}", diagnostics.tier);
            if let Some(reason) = &diagnostics.structured_failure {
                println!("  Structured failure: {}", reason);
            }
            if let Some(encoding) = &diagnostics.encoding {
                println!("  Encoding:           {}", encoding);
            }
            println!("  Classes:            {}", report.hierarchy.len());
            for (section, count) in &diagnostics.per_section {
                println!("    {:<18}{}", section, count);
            }

            println!();
            for (id, class) in report.hierarchy.iter() {
                let model = report.hierarchy.model_path(id).ok().flatten().unwrap_or_default();
                match &class.parent {
                    Some(parent) => println!("  [{}] {} : {}  {}", class.section, class.name, parent, model),
                    None => println!("  [{}] {}  {}", class.section, class.name, model),
                }
            }
        }
    }

    Ok(())
}

fn show_class(hierarchy: &ClassHierarchy, name: &str, format: OutputFormat) -> Result<()> {
    let Some(id) = hierarchy.find(name) else {
        bail!("No class named {}", name);
    };
    let resolved = hierarchy
        .effective_properties(id)
        .map_err(modbreaker_core::Error::from)
        .with_context(|| format!("Failed to resolve {}", name))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&resolved)?),
        OutputFormat::Text => {
            let chain: Vec<_> = resolved
                .chain
                .iter()
                .filter_map(|id| hierarchy.get(*id))
                .map(|c| c.name.as_str())
                .collect();
            println!("Class: {}", chain.join(" -> "));
            if let Some(parent) = &resolved.unresolved_parent {
                println!("  (parent {} not in this config)", parent);
            }
            for (key, value) in resolved.properties.iter() {
                println!("  {} = {}", key, value);
            }
        }
    }
    Ok(())
}

fn cmd_scan(args: ScanArgs, options: ParseOptions, format: OutputFormat) -> Result<()> {
    let builder = CatalogBuilder::new()
        .with_options(options)
        .with_catalog_options(CatalogOptions {
            include_geometry: args.geometry,
            resolve_sidecars: !args.no_sidecars,
            only_with_model: args.models_only,
            sections: args.section,
        });

    let catalog = if args.path.is_dir() {
        builder.build_folder(&args.path)
    } else {
        builder.build_archive(&args.path)
    }
    .with_context(|| format!("Failed to scan {:?}", args.path))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&catalog)?),
        OutputFormat::Text => print_catalog(&catalog),
    }
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    println!("{:<16} {:<32} {:<14} {:>8} {:>8} {:>4} Model", "Section", "Class", "Mesh", "Verts", "Tris", "Side");
    println!("{:-<16} {:-<32} {:-<14} {:->8} {:->8} {:->4} {:-<30}", "", "", "", "", "", "", "");
    for entry in catalog.iter() {
        let (validity, vertices, triangles) = match &entry.mesh {
            Some(mesh) => (mesh.validity.to_string(), mesh.vertex_count, mesh.triangle_count),
            None => (format!("{:?}", entry.join).to_lowercase(), 0, 0),
        };
        println!(
            "{:<16} {:<32} {:<14} {:>8} {:>8} {:>4} {}",
            entry.section().as_str(),
            entry.name(),
            validity,
            vertices,
            triangles,
            entry.sidecars.len(),
            entry.model.as_deref().unwrap_or("")
        );
    }
    println!("\n{} entries\n", catalog.len());
    println!("{}", catalog.diagnostics);
}

fn cmd_stats(args: StatsArgs, options: &ParseOptions, format: OutputFormat) -> Result<()> {
    let archive = open_archive(&args.archive, options)?;
    let stats = archive.statistics();

    let mut entries: Vec<_> = archive.list_entries().iter().collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.original_size));
    let largest: Vec<_> = entries.into_iter().take(args.top).collect();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "statistics": stats,
                "largest_files": largest.iter().map(|e| {
                    serde_json::json!({
                        "name": e.name,
                        "size": e.original_size,
                    })
                }).collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Archive Statistics: {:?}", args.archive);
            println!("============================================");
            println!("  Total entries:      {:>12}", stats.total_entries);
            println!("  Stored:             {:>12}", stats.stored_count);
            println!("  Packed:             {:>12}", stats.packed_count);
            println!("  Original size:      {:>12}", format_bytes(stats.total_original));
            println!("  Stored size:        {:>12}", format_bytes(stats.total_data));
            println!("  Compression ratio:  {:>11.1}%", stats.compression_ratio * 100.0);

            println!("\nTop {} Largest Files:", args.top);
            println!("-------------------------------------------");
            for (i, entry) in largest.iter().enumerate() {
                println!("  {}. {} ({})", i + 1, entry.name, format_bytes(u64::from(entry.original_size)));
            }

            println!("\nFile Types by Count:");
            println!("-------------------------------------------");
            let exts = stats.top_extensions(15);
            let max = exts.first().map_or(1, |(_, count)| *count).max(1);
            for (ext, count) in &exts {
                let bar = "█".repeat(count * 30 / max);
                println!("  .{:<8} {:>6} {}", ext, count, bar);
            }
        }
    }

    Ok(())
}
