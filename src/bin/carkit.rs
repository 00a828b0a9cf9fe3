use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;

use carkit::key::{Appearance, DisplayGamut, Idiom};
use carkit::storage::Provenance;
use carkit::{AssetStorage, BitmapSurface, Catalog, Config, OpenMode, Variant};

#[derive(Parser, Debug)]
#[command(name = "carkit", version)]
struct Cli {
    /// JSON config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty catalog, replacing any existing file.
    Create(CreateArgs),
    /// Print container statistics and provenance.
    Info(CatalogArg),
    /// List every rendition.
    List(ListArgs),
    /// Import an image, SVG or color under a name.
    Import(ImportArgs),
    /// Write the best variant of a named image as PNG.
    Extract(ExtractArgs),
    /// Remove every rendition of a name.
    Remove(RemoveArgs),
    /// Rewrite the container without superseded data.
    Compact(CatalogArg),
}

#[derive(Parser, Debug)]
struct CatalogArg {
    /// Catalog file.
    catalog: PathBuf,
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// Catalog file.
    catalog: PathBuf,

    /// Maximum attributes per key token.
    #[arg(long)]
    max_key_attributes: Option<u16>,

    /// Authoring tool recorded in the container.
    #[arg(long)]
    tool: Option<String>,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Catalog file.
    catalog: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct VariantArgs {
    /// Pixel scale.
    #[arg(long)]
    scale: Option<u16>,

    /// Appearance (`any`, `dark`, `light`, `high_contrast`, ...).
    #[arg(long, value_parser = parse_snake::<Appearance>)]
    appearance: Option<Appearance>,

    /// Idiom (`universal`, `phone`, `pad`, `mac_catalyst`, ...).
    #[arg(long, value_parser = parse_snake::<Idiom>)]
    idiom: Option<Idiom>,

    /// Display gamut (`srgb`, `p3`).
    #[arg(long, value_parser = parse_snake::<DisplayGamut>)]
    gamut: Option<DisplayGamut>,
}

impl VariantArgs {
    fn resolve(&self, base: Variant) -> Variant {
        Variant {
            scale: self.scale.unwrap_or(base.scale),
            appearance: self.appearance.unwrap_or(base.appearance),
            idiom: self.idiom.unwrap_or(base.idiom),
            gamut: self.gamut.unwrap_or(base.gamut),
        }
    }
}

#[derive(Parser, Debug)]
struct ImportArgs {
    /// Catalog file.
    catalog: PathBuf,

    /// Rendition name.
    #[arg(long)]
    name: String,

    /// Image or SVG file.
    #[arg(long, conflicts_with = "color", required_unless_present = "color")]
    file: Option<PathBuf>,

    /// Color as `r,g,b,a` components in 0..=1.
    #[arg(long, value_parser = parse_color)]
    color: Option<[f64; 4]>,

    #[command(flatten)]
    variant: VariantArgs,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Catalog file.
    catalog: PathBuf,

    /// Rendition name.
    #[arg(long)]
    name: String,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    variant: VariantArgs,
}

#[derive(Parser, Debug)]
struct RemoveArgs {
    /// Catalog file.
    catalog: PathBuf,

    /// Rendition name.
    #[arg(long)]
    name: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    match cli.cmd {
        Command::Create(args) => cmd_create(&config, args),
        Command::Info(args) => cmd_info(&config, &args.catalog),
        Command::List(args) => cmd_list(&config, args),
        Command::Import(args) => cmd_import(&config, args),
        Command::Extract(args) => cmd_extract(&config, args),
        Command::Remove(args) => cmd_remove(&config, args),
        Command::Compact(args) => cmd_compact(&config, &args.catalog),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_snake<T: DeserializeOwned>(s: &str) -> Result<T, String> {
    serde_json::from_value(serde_json::Value::String(s.replace('-', "_")))
        .map_err(|e| e.to_string())
}

fn parse_color(s: &str) -> Result<[f64; 4], String> {
    let parts = s
        .split(',')
        .map(|c| c.trim().parse::<f64>().map_err(|e| format!("'{c}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; 4]>::try_from(parts).map_err(|p| format!("expected 4 components, got {}", p.len()))
}

fn open(config: &Config, path: &Path, mode: OpenMode) -> anyhow::Result<Catalog> {
    Catalog::open_with_opts(path, mode, config.catalog_opts())
        .with_context(|| format!("open catalog '{}'", path.display()))
}

fn cmd_create(config: &Config, args: CreateArgs) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(max) = args.max_key_attributes {
        config.create.max_key_attributes = Some(max);
    }
    let provenance = Provenance {
        tool: args
            .tool
            .unwrap_or_else(|| config.create.provenance.tool.clone()),
        ..config.create.provenance.clone()
    };

    if let Some(parent) = args.catalog.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    AssetStorage::create_with_opts(
        &args.catalog,
        provenance,
        config.key_format(),
        config.storage,
    )?;

    eprintln!("wrote {}", args.catalog.display());
    Ok(())
}

fn cmd_info(config: &Config, path: &Path) -> anyhow::Result<()> {
    let catalog = open(config, path, OpenMode::ReadOnly)?;
    let storage = catalog.storage();
    let stats = storage.stats();
    let provenance = storage.provenance();

    println!("path:        {}", path.display());
    println!("generation:  {}", stats.generation);
    println!("segments:    {}", stats.segments);
    println!("file bytes:  {}", stats.file_len);
    println!("live bytes:  {}", stats.live_bytes);
    println!("reclaimable: {}", stats.reclaimable_bytes);
    println!("renditions:  {}", stats.entries);
    println!("names:       {}", catalog.all_rendition_names().len());
    println!(
        "key tokens:  {}",
        catalog.maximum_rendition_key_token_count()
    );
    println!("tool:        {}", provenance.tool);
    println!("thinning:    {}", provenance.thinning);
    Ok(())
}

#[derive(serde::Serialize)]
struct ListEntry {
    name: Option<String>,
    kind: carkit::RenditionKind,
    key: String,
    layout: String,
    width: u32,
    height: u32,
    scale: u32,
}

fn cmd_list(config: &Config, args: ListArgs) -> anyhow::Result<()> {
    let catalog = open(config, &args.catalog, OpenMode::ReadOnly)?;
    let groups = catalog.renditions_by_kind()?;

    let entries: Vec<ListEntry> = groups
        .iter()
        .flat_map(|(_, members)| members)
        .map(|r| ListEntry {
            name: r.name.clone(),
            kind: r.kind,
            key: r.key.to_string(),
            layout: r.csi.layout().to_string(),
            width: r.csi.canvas().width,
            height: r.csi.canvas().height,
            scale: r.csi.metadata().scale_factor,
        })
        .collect();

    if args.json {
        let out = serde_json::to_string_pretty(&entries).context("serialize listing")?;
        println!("{out}");
        return Ok(());
    }

    for (kind, members) in &groups {
        println!("{} ({})", kind, members.len());
        for r in members {
            println!(
                "  {:<32} {:>5}x{:<5} @{}x  {}",
                r.name.as_deref().unwrap_or("<unnamed>"),
                r.csi.canvas().width,
                r.csi.canvas().height,
                r.csi.metadata().scale_factor,
                r.key
            );
        }
    }
    Ok(())
}

fn load_surface(path: &Path, scale: u16) -> anyhow::Result<BitmapSurface> {
    let bytes = std::fs::read(path).with_context(|| format!("read '{}'", path.display()))?;
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if is_svg {
        let tree = carkit::surface::parse_svg(&bytes)?;
        let (w, h) = carkit::surface::svg_pixel_size(&tree, f32::from(scale.max(1)))?;
        let mut surface = BitmapSurface::new(w, h)?;
        let bounds = surface.canvas().bounds();
        surface.context().draw_svg(&tree, bounds)?;
        Ok(surface)
    } else {
        let prepared = carkit::surface::decode_image(&bytes)
            .with_context(|| format!("decode '{}'", path.display()))?;
        Ok(BitmapSurface::from_prepared(&prepared)?)
    }
}

fn cmd_import(config: &Config, args: ImportArgs) -> anyhow::Result<()> {
    let catalog = open(config, &args.catalog, OpenMode::ReadWrite)?;

    let key = match (&args.file, args.color) {
        (_, Some(rgba)) => catalog.insert_color(&args.name, rgba, false)?,
        (Some(file), None) => {
            let variant = args.variant.resolve(config.variant);
            let surface = load_surface(file, variant.scale)?;
            let key = catalog.insert_image(&args.name, &surface, &variant)?;
            catalog.save(false)?;
            key
        }
        (None, None) => anyhow::bail!("either --file or --color is required"),
    };

    eprintln!("stored {} as {key}", args.name);
    Ok(())
}

fn cmd_extract(config: &Config, args: ExtractArgs) -> anyhow::Result<()> {
    let catalog = open(config, &args.catalog, OpenMode::ReadOnly)?;
    let variant = args.variant.resolve(config.variant);
    let surface = catalog
        .image_for_name(&args.name, &variant)?
        .with_context(|| format!("no bitmap named '{}' for this variant", args.name))?;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &surface.to_straight_rgba8(),
        surface.width(),
        surface.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_remove(config: &Config, args: RemoveArgs) -> anyhow::Result<()> {
    let catalog = open(config, &args.catalog, OpenMode::ReadWrite)?;
    let keys = catalog
        .named_lookups()
        .find(|l| l.name == args.name)
        .map(|l| l.keys)
        .with_context(|| format!("no renditions named '{}'", args.name))?;

    for key in &keys {
        catalog.storage().remove(key)?;
    }
    catalog.save(true)?;

    eprintln!("removed {} rendition(s) of {}", keys.len(), args.name);
    Ok(())
}

fn cmd_compact(config: &Config, path: &Path) -> anyhow::Result<()> {
    let catalog = open(config, path, OpenMode::ReadWrite)?;
    let before = catalog.storage().stats().file_len;
    catalog.save(true)?;
    let after = catalog.storage().stats().file_len;
    eprintln!("compacted {}: {before} -> {after} bytes", path.display());
    Ok(())
}
