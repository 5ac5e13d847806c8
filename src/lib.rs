pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fonts;
pub mod geometry;
pub mod layout;
pub mod model;
pub mod normalize;
#[cfg(feature = "png")]
pub mod raster;
pub mod render;
pub mod resolver;
pub mod style;
pub mod template;
pub mod text_metrics;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, ExportConfig, ImagePolicy, ResolverConfig, load_config};
pub use error::{ExportError, ImageLoadError, SourceError, TemplateError};
pub use export::{BatchEntry, CancelToken, ExportFormat, ExportJob, ExportPayload, Exporter};
pub use model::{Align, Badge, BadgeImage, BadgeLine};
pub use render::{RenderOptions, render};
pub use resolver::{TemplateResolver, TemplateSource};
pub use style::{LayerOrder, RenderStyle};
pub use template::{Template, TemplateSpec};
