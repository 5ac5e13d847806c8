use crate::config::{Config, load_config};
use crate::export::{CancelToken, ExportFormat, ExportJob, ExportPayload, Exporter};
use crate::layout;
use crate::model::Badge;
use crate::normalize;
use crate::render::RenderOptions;
use crate::resolver::{StaticSource, SvgDirectorySource, TemplateResolver, TemplateSource};
use crate::text_metrics;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "badgesmith", version, about = "Render name badges to SVG, CDR or PNG")]
pub struct Args {
    /// Badge JSON file (one badge or an array) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. A single SVG badge goes to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Template directory (with templates.json) or template bundle JSON
    #[arg(short = 't', long = "templates")]
    pub templates: Option<PathBuf>,

    /// Render every badge on this template instead of its own
    #[arg(long = "template")]
    pub template: Option<String>,

    /// PNG scale factor
    #[arg(long = "scale")]
    pub scale: Option<f64>,

    /// Draw the cut outline
    #[arg(long = "outline")]
    pub outline: bool,

    /// List available template ids and exit
    #[arg(long = "list-templates")]
    pub list_templates: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Cdr,
    Png,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Svg => ExportFormat::Svg,
            OutputFormat::Cdr => ExportFormat::Cdr,
            OutputFormat::Png => ExportFormat::Png,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(scale) = args.scale {
        config.export.png_scale = scale;
    }
    for dir in &config.export.font_dirs {
        text_metrics::load_font_dir(dir);
    }

    let resolver = build_resolver(args.templates.as_deref(), &config)?;
    if args.list_templates {
        return list_templates(&resolver);
    }

    let input = read_input(args.input.as_deref())?;
    let badges = Badge::list_from_json(&input)?;
    if badges.is_empty() {
        return Err(anyhow::anyhow!("No badges found in input"));
    }
    let jobs = build_jobs(badges, &resolver, args.template.as_deref())?;

    let format = ExportFormat::from(args.output_format);
    let options = RenderOptions {
        show_outline: args.outline,
    };
    let exporter = Exporter::new(config.export.clone(), config.style.clone()).with_options(options);

    if jobs.len() == 1 {
        let job = &jobs[0];
        let payload = exporter.export(&job.badge, &job.template, format)?;
        let output = if format.is_vector() {
            args.output.clone()
        } else {
            Some(ensure_output(&args.output, format.ext())?)
        };
        return write_payload(payload, output.as_deref());
    }

    let (dir, base_name) = resolve_batch_base(args.output.as_deref());
    let entries = exporter.export_batch(&jobs, format, &base_name, &CancelToken::new(), |name, payload| {
        write_payload(payload, Some(&dir.join(name)))
    });

    let failures: Vec<String> = entries
        .iter()
        .filter_map(|entry| entry.failure_message(jobs.len()))
        .collect();
    for message in &failures {
        eprintln!("{message}");
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "{} of {} badges failed to export",
            failures.len(),
            jobs.len()
        ))
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn build_resolver(templates: Option<&Path>, config: &Config) -> Result<TemplateResolver> {
    let source: Arc<dyn TemplateSource> = match templates {
        Some(path) if path.is_dir() => Arc::new(SvgDirectorySource::open(path)?),
        Some(path) => Arc::new(StaticSource::from_json_file(path)?),
        None => Arc::new(StaticSource::builtin()),
    };
    Ok(TemplateResolver::new(source, config.templates.clone()))
}

fn list_templates(resolver: &TemplateResolver) -> Result<()> {
    let (templates, errors) = resolver.load_all();
    let mut stdout = io::stdout().lock();
    for template in &templates {
        writeln!(
            stdout,
            "{}\t{}\t{}x{} in",
            template.id, template.name, template.width_in, template.height_in
        )?;
    }
    for err in &errors {
        eprintln!("skipped template: {err}");
    }
    Ok(())
}

/// Resolves each badge's template and lays it out. With `template_override`
/// the badge is migrated from its own template to that one first.
fn build_jobs(badges: Vec<Badge>, resolver: &TemplateResolver, template_override: Option<&str>) -> Result<Vec<ExportJob>> {
    badges
        .into_iter()
        .map(|badge| -> Result<ExportJob> {
            let current = resolver.for_badge(&badge.template_id)?;
            let (badge, template) = match template_override {
                Some(target_id) if target_id != current.id => {
                    let target = resolver.for_badge(target_id)?;
                    let placed = layout::layout_if_unplaced(&badge, &current.design_box);
                    let (migrated, warnings) = normalize::migrate(&placed, &current, &target);
                    for warning in &warnings {
                        tracing::warn!(badge = %migrated.id, %warning, "template change");
                    }
                    (migrated, target)
                }
                _ => (badge, current),
            };
            let badge = layout::layout_if_unplaced(&badge, &template.design_box);
            Ok(ExportJob { badge, template })
        })
        .collect()
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(std::fs::read_to_string(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

/// Directory and base name for batch files. `out/team.svg` gives
/// `out/team_1.svg`, `out/team_2.svg`, ...; a directory gives `badge_1.svg`.
fn resolve_batch_base(output: Option<&Path>) -> (PathBuf, String) {
    let Some(base) = output else {
        return (PathBuf::from("."), "badge".to_string());
    };
    if base.is_dir() {
        return (base.to_path_buf(), "badge".to_string());
    }
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("badge")
        .to_string();
    let parent = base
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    (parent.to_path_buf(), stem)
}

fn write_payload(payload: ExportPayload, output: Option<&Path>) -> Result<()> {
    let bytes = match payload {
        ExportPayload::Vector(bytes) => bytes,
        ExportPayload::Raster(image) | ExportPayload::Page { image, .. } => image.png,
    };
    match output {
        Some(path) => std::fs::write(path, bytes)?,
        None => io::stdout().lock().write_all(&bytes)?,
    }
    Ok(())
}
