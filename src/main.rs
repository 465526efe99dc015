//! Datkit CLI - Command-line tool for inspecting DAT asset containers.
//!
//! This is the main entry point for the datkit command-line application.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use datkit::format::texture::TextureKind;
use datkit::prelude::*;

/// Datkit - DAT asset container inspection tool
#[derive(Parser)]
#[command(name = "datkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command that decodes blobs.
#[derive(Args, Clone)]
struct DecodeArgs {
    /// Hex-encoded key for obfuscated zone sections
    #[arg(long)]
    key: Option<String>,

    /// Right-rotation applied to zone section bytes before the key
    #[arg(long, default_value_t = 0)]
    rotation: u32,

    /// Swap adjacent byte pairs after the key is applied
    #[arg(long)]
    swap_pairs: bool,

    /// Decode zone vertex colours as overbright
    #[arg(long)]
    zone_color_scale: bool,
}

impl DecodeArgs {
    fn options(&self, resource_name: &str) -> Result<ParseOptions> {
        let mut options =
            ParseOptions::new(resource_name).with_zone_color_scale(self.zone_color_scale);

        if self.key.is_some() || self.rotation != 0 || self.swap_pairs {
            let key = match &self.key {
                Some(hex) => parse_hex(hex).context("Invalid --key")?,
                None => Vec::new(),
            };
            options = options.with_deobfuscator(Arc::new(KeyedScramble::new(
                key,
                self.rotation,
                self.swap_pairs,
            )));
        }

        Ok(options)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the directory tree of a blob
    Tree {
        /// Path to the DAT file
        #[arg(short, long, env = "DATKIT_INPUT")]
        input: PathBuf,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// List resources, optionally of one kind
    List {
        /// Path to the DAT file
        #[arg(short, long, env = "DATKIT_INPUT")]
        input: PathBuf,

        /// Resource kind (texture, skeleton, zone, ...)
        #[arg(short, long)]
        kind: Option<String>,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Query the ground height of every zone at a position
    Ground {
        /// Path to the DAT file
        #[arg(short, long, env = "DATKIT_INPUT")]
        input: PathBuf,

        /// World X
        #[arg(long, allow_hyphen_values = true)]
        x: f32,

        /// World Z
        #[arg(long, allow_hyphen_values = true)]
        z: f32,

        /// Height to search down from
        #[arg(long, allow_hyphen_values = true)]
        from: Option<f32>,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Export every texture as DDS or PNG
    ExportTextures {
        /// Path to the DAT file
        #[arg(short, long, env = "DATKIT_INPUT")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "DATKIT_OUTPUT")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Dds)]
        format: ExportFormat,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Decode every file matching a glob pattern in parallel
    Scan {
        /// Glob pattern, e.g. "data/**/*.dat"
        pattern: String,

        #[command(flatten)]
        decode: DecodeArgs,
    },

    /// Write a JSON summary of a blob
    Dump {
        /// Path to the DAT file
        #[arg(short, long, env = "DATKIT_INPUT")]
        input: PathBuf,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        decode: DecodeArgs,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Dds,
    Png,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Tree { input, decode } => {
            cmd_tree(&input, &decode)?;
        }
        Commands::List { input, kind, decode } => {
            cmd_list(&input, kind.as_deref(), &decode)?;
        }
        Commands::Ground {
            input,
            x,
            z,
            from,
            decode,
        } => {
            cmd_ground(&input, x, z, from, &decode)?;
        }
        Commands::ExportTextures {
            input,
            output,
            format,
            decode,
        } => {
            cmd_export_textures(&input, &output, format, &decode)?;
        }
        Commands::Scan { pattern, decode } => {
            cmd_scan(&pattern, &decode)?;
        }
        Commands::Dump {
            input,
            output,
            decode,
        } => {
            cmd_dump(&input, output.as_deref(), &decode)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map a file and decode it into a fresh graph.
fn load_graph(path: &Path, decode: &DecodeArgs) -> Result<ResourceGraph> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // The map is only read while this function runs.
    let mmap = unsafe { Mmap::map(&file)? };

    let name = path.display().to_string();
    let options = decode.options(&name)?;
    ResourceGraph::load(&mmap, &options).with_context(|| format!("Failed to decode {name}"))
}

/// Every directory in the graph, roots first, each followed by its subtree.
fn all_directories(graph: &ResourceGraph) -> Vec<DirId> {
    graph
        .roots()
        .iter()
        .flat_map(|&root| std::iter::once(root).chain(graph.subdirectories(root)))
        .collect()
}

fn cmd_tree(input: &Path, decode: &DecodeArgs) -> Result<()> {
    let graph = load_graph(input, decode)?;

    for &root in graph.roots() {
        print_directory(&graph, root, 0);
    }

    Ok(())
}

fn print_directory(graph: &ResourceGraph, dir: DirId, depth: usize) {
    let indent = "  ".repeat(depth);
    let directory = graph.directory(dir);
    match directory.name() {
        Some(name) if !name.is_empty() => println!("{indent}[{}] {name}", directory.id()),
        _ => println!("{indent}[{}]", directory.id()),
    }

    for (_, _, child) in directory.children() {
        match child {
            Child::Directory(sub) => print_directory(graph, *sub, depth + 1),
            Child::Resource(resource) => println!("{indent}  {}", describe(resource)),
        }
    }
}

fn describe(resource: &Resource) -> String {
    let id = resource.id();
    match resource {
        Resource::Directory(_) => format!("{id} directory"),
        Resource::Texture(t) => {
            let compression = match t.compression {
                Compression::None => format!("{}-bit", t.bit_depth),
                Compression::Dxt1 => "DXT1".to_string(),
                Compression::Dxt3 => "DXT3".to_string(),
            };
            let kind = match t.kind {
                TextureKind::Texture2D => "",
                TextureKind::Alpha2D => " alpha",
                TextureKind::CubeFace => " cube-face",
            };
            format!(
                "{id} texture {:?} {}x{} {compression}{kind}",
                t.name, t.width, t.height
            )
        }
        Resource::Skeleton(s) => match s.height {
            Some(h) => format!("{id} skeleton {} joints, height {h:.3}", s.joints.len()),
            None => format!("{id} skeleton {} joints", s.joints.len()),
        },
        Resource::SkeletonMesh(m) => format!(
            "{id} skeleton-mesh {} meshes{}",
            m.meshes.len(),
            if m.symmetric { ", symmetric" } else { "" }
        ),
        Resource::SkeletonAnimation(a) => format!(
            "{id} animation {} frames, {} tracks, {:.2}s",
            a.frame_count,
            a.tracks.len(),
            a.duration()
        ),
        Resource::WeightedMesh(m) => format!(
            "{id} weighted-mesh {} chunks, {} vertices",
            m.chunks.len(),
            m.vertex_count()
        ),
        Resource::Zone(z) => format!(
            "{id} zone {} objects, {} culling tables, {}",
            z.objects.len(),
            z.culling_tables.len(),
            if z.collision.is_some() { "collision" } else { "no collision" }
        ),
        Resource::ZoneMesh(m) if m.is_hit_volume() => format!("{id} zone-mesh hit volume"),
        Resource::ZoneMesh(m) => format!("{id} zone-mesh {} parts", m.parts.len()),
        Resource::Environment(e) => format!(
            "{id} environment {}, draw distance {}",
            if e.indoor { "indoor" } else { "outdoor" },
            e.draw_distance
        ),
        Resource::Info(InfoResource::Mount(_)) => format!("{id} info mount"),
        Resource::Info(InfoResource::Character(c)) => {
            format!("{id} info character {:?}", c.movement_type)
        }
    }
}

fn cmd_list(input: &Path, kind: Option<&str>, decode: &DecodeArgs) -> Result<()> {
    let kind = match kind {
        Some(name) => match ResourceKind::from_name(name) {
            Some(kind) => Some(kind),
            None => {
                let known: Vec<_> = ResourceKind::ALL.iter().map(|k| k.name()).collect();
                bail!("Unknown resource kind {name:?}, expected one of: {}", known.join(", "));
            }
        },
        None => None,
    };

    let graph = load_graph(input, decode)?;

    let mut count = 0;
    for dir in all_directories(&graph) {
        for resource in graph.directory(dir).resources() {
            if kind.is_some_and(|k| k != resource.kind()) {
                continue;
            }
            println!("{:<24} {}", graph.path(dir), describe(resource));
            count += 1;
        }
    }

    println!("\nTotal: {count} resources");

    Ok(())
}

fn cmd_ground(input: &Path, x: f32, z: f32, from: Option<f32>, decode: &DecodeArgs) -> Result<()> {
    let graph = load_graph(input, decode)?;

    let mut zones = 0;
    for &root in graph.roots() {
        for (dir, resource) in graph.collect_kind(root, ResourceKind::Zone) {
            let Resource::Zone(zone) = resource else {
                continue;
            };
            zones += 1;

            let height = match from {
                Some(y) => zone.ground_height_from(x, y, z),
                None => zone.ground_height(x, z),
            };
            match height {
                Some(y) => println!("{}/{}: ground at y = {y}", graph.path(dir), zone.id),
                None if zone.collision.is_none() => {
                    println!("{}/{}: no collision data", graph.path(dir), zone.id)
                }
                None => println!("{}/{}: no ground below", graph.path(dir), zone.id),
            }
        }
    }

    if zones == 0 {
        bail!("No zone definitions in {}", input.display());
    }

    Ok(())
}

fn cmd_export_textures(
    input: &Path,
    output: &Path,
    format: ExportFormat,
    decode: &DecodeArgs,
) -> Result<()> {
    let graph = load_graph(input, decode)?;

    let textures: Vec<(DirId, &TextureResource)> = graph
        .roots()
        .iter()
        .flat_map(|&root| graph.collect_kind(root, ResourceKind::Texture))
        .filter_map(|(dir, r)| TextureResource::from_resource(r).map(|t| (dir, t)))
        .collect();

    println!("Exporting {} textures to {}...", textures.len(), output.display());
    fs::create_dir_all(output)?;

    let pb = ProgressBar::new(textures.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let mut exported = 0;
    let mut errors = 0;

    for (dir, texture) in &textures {
        let stem = format!("{}_{}", graph.path(*dir), texture.id).replace(['/', ' '], "_");
        let stem = stem.trim_end_matches('_');

        let result = match format {
            ExportFormat::Dds => export_dds(texture, &output.join(format!("{stem}.dds"))),
            ExportFormat::Png => export_png(texture, &output.join(format!("{stem}.png"))),
        };

        match result {
            Ok(()) => exported += 1,
            Err(e) => {
                pb.suspend(|| eprintln!("Error exporting {}: {e:#}", texture.name));
                errors += 1;
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Exported {exported} textures in {:?} ({errors} errors)", start.elapsed());

    Ok(())
}

fn export_dds(texture: &TextureResource, path: &Path) -> Result<()> {
    let bytes = to_dds_bytes(texture)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn export_png(texture: &TextureResource, path: &Path) -> Result<()> {
    if texture.compression != Compression::None {
        bail!("{:?} textures can only be exported as DDS", texture.compression);
    }
    if !texture.is_complete() {
        bail!("pixel data is truncated");
    }

    let (w, h) = (u32::from(texture.width), u32::from(texture.height));
    match texture.bit_depth {
        32 => image::RgbaImage::from_raw(w, h, texture.data.clone())
            .context("pixel buffer does not match dimensions")?
            .save(path)?,
        24 => image::RgbImage::from_raw(w, h, texture.data.clone())
            .context("pixel buffer does not match dimensions")?
            .save(path)?,
        other => bail!("{other}-bit textures can only be exported as DDS"),
    }

    Ok(())
}

#[derive(Serialize)]
struct BlobSummary {
    file: String,
    directories: usize,
    resources: BTreeMap<&'static str, usize>,
    tree: Vec<DirectorySummary>,
}

#[derive(Serialize)]
struct DirectorySummary {
    id: String,
    name: Option<String>,
    resources: Vec<ResourceSummary>,
    children: Vec<DirectorySummary>,
}

#[derive(Serialize)]
struct ResourceSummary {
    kind: &'static str,
    id: String,
    description: String,
}

fn summarize(file: &str, graph: &ResourceGraph) -> BlobSummary {
    let mut resources = BTreeMap::new();
    for dir in all_directories(graph) {
        for resource in graph.directory(dir).resources() {
            *resources.entry(resource.kind().name()).or_insert(0) += 1;
        }
    }

    BlobSummary {
        file: file.to_string(),
        directories: graph.directory_count(),
        resources,
        tree: graph
            .roots()
            .iter()
            .map(|&root| summarize_directory(graph, root))
            .collect(),
    }
}

fn summarize_directory(graph: &ResourceGraph, dir: DirId) -> DirectorySummary {
    let directory = graph.directory(dir);
    DirectorySummary {
        id: directory.id().to_string(),
        name: directory.name().map(str::to_string),
        resources: directory
            .resources()
            .map(|r| ResourceSummary {
                kind: r.kind().name(),
                id: r.id().to_string(),
                description: describe(r),
            })
            .collect(),
        children: directory
            .directories()
            .map(|sub| summarize_directory(graph, sub))
            .collect(),
    }
}

fn cmd_dump(input: &Path, output: Option<&Path>, decode: &DecodeArgs) -> Result<()> {
    let graph = load_graph(input, decode)?;
    let summary = summarize(&input.display().to_string(), &graph);
    let json = serde_json::to_string_pretty(&summary)?;

    match output {
        Some(path) => {
            fs::write(path, json).context("Failed to write output file")?;
            println!("Summary written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

fn cmd_scan(pattern: &str, decode: &DecodeArgs) -> Result<()> {
    let paths: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("Invalid glob pattern {pattern:?}"))?
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "unreadable glob entry");
                None
            }
        })
        .collect();

    if paths.is_empty() {
        bail!("No files match {pattern:?}");
    }

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let results: Vec<(PathBuf, Result<BlobSummary>)> = paths
        .into_par_iter()
        .map(|path| {
            let result = load_graph(&path, decode)
                .map(|graph| summarize(&path.display().to_string(), &graph));
            pb.inc(1);
            (path, result)
        })
        .collect();
    pb.finish_and_clear();

    let mut totals: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut failed = 0;

    println!("{:<48} {:>6} {:>9}  status", "file", "dirs", "resources");
    for (path, result) in &results {
        match result {
            Ok(summary) => {
                let count: usize = summary.resources.values().sum();
                println!("{:<48} {:>6} {:>9}  ok", path.display(), summary.directories, count);
                for (kind, n) in &summary.resources {
                    *totals.entry(kind).or_insert(0) += n;
                }
            }
            Err(e) => {
                println!("{:<48} {:>6} {:>9}  {e:#}", path.display(), "-", "-");
                failed += 1;
            }
        }
    }

    println!(
        "\nScanned {} files in {:?} ({failed} failed)",
        results.len(),
        start.elapsed()
    );
    for (kind, n) in &totals {
        println!("  {kind:<20} {n}");
    }

    Ok(())
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let s = s.trim_start_matches("0x");
    if !s.is_ascii() {
        bail!("hex string contains non-ASCII characters");
    }
    if s.len() % 2 != 0 {
        bail!("hex string has an odd number of digits");
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {:?}", &s[i..i + 2]))
        })
        .collect()
}
