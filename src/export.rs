use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::model::Badge;
#[cfg(feature = "png")]
use crate::raster::Rasterizer;
use crate::render::{self, RenderOptions, ResolvedBadge};
use crate::style::RenderStyle;
use crate::template::Template;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Svg,
    /// The SVG document under a `.cdr` name, for cutters that import it.
    Cdr,
    Png,
    Pdf,
    Tiff,
}

impl ExportFormat {
    pub fn ext(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Cdr => "cdr",
            Self::Png => "png",
            Self::Pdf => "pdf",
            Self::Tiff => "tiff",
        }
    }

    pub fn is_vector(self) -> bool {
        matches!(self, Self::Svg | Self::Cdr)
    }
}

/// PNG-encoded bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportPayload {
    Vector(Vec<u8>),
    /// PNG output, or the bitmap a TIFF container encoder wraps.
    Raster(RasterImage),
    /// One PDF page: the bitmap plus its physical size.
    Page {
        image: RasterImage,
        width_mm: f64,
        height_mm: f64,
        landscape: bool,
    },
}

/// Bytes of a vector export: the rendered SVG unchanged. SVG and CDR share
/// the same content.
pub fn to_vector_file(svg: &str) -> Vec<u8> {
    svg.as_bytes().to_vec()
}

/// Cooperative cancellation flag shared between a caller and running exports.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One badge of a batch together with its resolved template.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub badge: Badge,
    pub template: Arc<Template>,
}

/// Outcome of a single batch item, in input order.
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub file_name: String,
    pub result: Result<(), ExportError>,
}

impl BatchEntry {
    /// "failed to export badge 2 of 3: ..." for failed items.
    pub fn failure_message(&self, total: usize) -> Option<String> {
        self.result.as_ref().err().map(|err| {
            format!(
                "failed to export badge {} of {}: {}",
                self.index + 1,
                total,
                err
            )
        })
    }
}

/// Output file name for batch item `index`: `{base}_{index+1}.{ext}`.
pub fn batch_file_name(base_name: &str, index: usize, format: ExportFormat) -> String {
    format!("{}_{}.{}", base_name, index + 1, format.ext())
}

/// Turns badges into export payloads.
#[derive(Debug, Clone)]
pub struct Exporter {
    config: ExportConfig,
    style: RenderStyle,
    options: RenderOptions,
    #[cfg(feature = "png")]
    rasterizer: Arc<Rasterizer>,
}

impl Exporter {
    pub fn new(config: ExportConfig, style: RenderStyle) -> Self {
        Self {
            #[cfg(feature = "png")]
            rasterizer: Arc::new(Rasterizer::new(&config)),
            config,
            style,
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn export(&self, badge: &Badge, template: &Template, format: ExportFormat) -> Result<ExportPayload, ExportError> {
        let resolved = render::resolve_badge(badge, template, &self.style);
        let payload = match format {
            ExportFormat::Svg | ExportFormat::Cdr => {
                let svg = render::render_resolved(&resolved, self.options, &self.style);
                ExportPayload::Vector(to_vector_file(&svg))
            }
            ExportFormat::Png => ExportPayload::Raster(self.rasterize(resolved, self.config.png_scale)?),
            ExportFormat::Tiff => ExportPayload::Raster(self.rasterize(resolved, self.config.tiff_scale)?),
            ExportFormat::Pdf => {
                let image = self.rasterize(resolved, self.config.pdf_scale)?;
                let (width_mm, height_mm) = template.page_size_mm();
                ExportPayload::Page {
                    image,
                    width_mm,
                    height_mm,
                    landscape: width_mm > height_mm,
                }
            }
        };
        tracing::debug!(badge = %badge.id, template = %template.id, format = format.ext(), "exported badge");
        Ok(payload)
    }

    #[cfg(feature = "png")]
    fn rasterize(&self, mut resolved: ResolvedBadge, scale: f64) -> Result<RasterImage, ExportError> {
        self.rasterizer.prepare(&mut resolved)?;
        let svg = render::render_resolved(&resolved, self.options, &self.style);
        let pad = self.style.padding.max(0.0);
        self.rasterizer.rasterize(
            &svg,
            resolved.width + 2.0 * pad,
            resolved.height + 2.0 * pad,
            scale,
        )
    }

    #[cfg(not(feature = "png"))]
    fn rasterize(&self, _resolved: ResolvedBadge, _scale: f64) -> Result<RasterImage, ExportError> {
        Err(ExportError::Rasterize(
            "raster output requires the `png` feature".to_string(),
        ))
    }

    /// Exports every job and hands each payload to `sink`.
    ///
    /// Items run on a pool of at most `max_concurrency` threads. One item's
    /// failure never stops the others; entries come back in input order.
    pub fn export_batch<F>(
        &self,
        jobs: &[ExportJob],
        format: ExportFormat,
        base_name: &str,
        cancel: &CancelToken,
        sink: F,
    ) -> Vec<BatchEntry>
    where
        F: Fn(&str, ExportPayload) -> anyhow::Result<()> + Sync,
    {
        let total = jobs.len();
        let run_one = |(index, job): (usize, &ExportJob)| {
            let file_name = batch_file_name(base_name, index, format);
            let result = self.export_item(job, format, cancel, &file_name, &sink);
            let entry = BatchEntry {
                index,
                file_name,
                result,
            };
            if let Some(message) = entry.failure_message(total) {
                tracing::warn!(file = %entry.file_name, "{message}");
            }
            entry
        };

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_concurrency.max(1))
            .build()
        {
            Ok(pool) => pool.install(|| jobs.par_iter().enumerate().map(run_one).collect()),
            Err(err) => {
                tracing::warn!(error = %err, "export pool unavailable, exporting sequentially");
                jobs.iter().enumerate().map(run_one).collect()
            }
        }
    }

    fn export_item<F>(
        &self,
        job: &ExportJob,
        format: ExportFormat,
        cancel: &CancelToken,
        file_name: &str,
        sink: &F,
    ) -> Result<(), ExportError>
    where
        F: Fn(&str, ExportPayload) -> anyhow::Result<()> + Sync,
    {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        let payload = self.export(&job.badge, &job.template, format)?;
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        sink(file_name, payload).map_err(|err| ExportError::Sink(err.to_string()))
    }

    /// Runs one export on a worker thread.
    pub fn spawn(&self, badge: Badge, template: Arc<Template>, format: ExportFormat) -> ExportHandle {
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();
        let exporter = self.clone();
        let token = cancel.clone();
        let worker = std::thread::spawn(move || {
            let result = if token.is_cancelled() {
                Err(ExportError::Cancelled)
            } else {
                exporter.export(&badge, &template, format)
            };
            let _ = tx.send(result);
        });
        ExportHandle {
            rx,
            cancel,
            worker: Some(worker),
        }
    }
}

/// A single export running off the calling thread.
#[derive(Debug)]
pub struct ExportHandle {
    rx: mpsc::Receiver<Result<ExportPayload, ExportError>>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl ExportHandle {
    /// Abandons the export; a later `wait` reports `Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Blocks until the export finishes.
    pub fn wait(mut self) -> Result<ExportPayload, ExportError> {
        let received = self.rx.recv();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        if self.cancel.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        received.unwrap_or_else(|_| Err(ExportError::Rasterize("export worker stopped".to_string())))
    }
}
