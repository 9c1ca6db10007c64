//! Regression testing of renderers against reference images.
//!
//! A node file is rendered with the software renderer and compared pixel by
//! pixel against a reference PNG. When they differ, the rendered image and a
//! diff image are written out for inspection.

mod compare;

pub use compare::{compare_images, generate_diff_image, CompareResult};

use image::RgbaImage;
use rendernode::{codec, Config, Display, Renderer, RendererKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompareError {
    #[error("Failed to render node file: {0}")]
    Render(#[from] rendernode::Error),
    #[error("Reference image not found: {0}")]
    ReferenceNotFound(PathBuf),
    #[error("Image sizes don't match: reference {reference:?} vs rendered {rendered:?}")]
    SizeMismatch {
        reference: (u32, u32),
        rendered: (u32, u32),
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CompareError>;

/// Configuration for a comparison
#[derive(Clone, Debug)]
pub struct CompareConfig {
    /// Largest per-channel difference still counted as equal (default 0)
    pub tolerance: u8,
    /// Where rendered and diff images go on failure
    pub output_dir: PathBuf,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            tolerance: 0,
            output_dir: std::env::temp_dir(),
        }
    }
}

/// Result of comparing a node file against its reference
#[derive(Debug)]
pub struct ComparisonOutcome {
    /// `None` when the image sizes differ
    pub result: Option<CompareResult>,
    pub rendered_size: (u32, u32),
    pub reference_size: (u32, u32),
    /// Rendered image, written on failure
    pub rendered_path: Option<PathBuf>,
    /// Diff image, written on failure when the sizes match
    pub diff_path: Option<PathBuf>,
}

impl ComparisonOutcome {
    pub fn passed(&self) -> bool {
        self.result.as_ref().is_some_and(CompareResult::passed)
    }
}

/// Render a node file with the software renderer.
pub fn render_node_file(path: &Path) -> Result<RgbaImage> {
    let node = codec::load(path)?;
    let mut renderer = Renderer::with_config(RendererKind::Software, Config::from_env());
    renderer
        .realize_for_display(&Display::software_only("compare-render"))
        .map_err(rendernode::Error::from)?;
    let texture = renderer
        .render_texture(&node, None)
        .map_err(rendernode::Error::from)?;
    renderer.unrealize();
    Ok(texture.to_rgba_image().map_err(rendernode::Error::from)?)
}

/// Get the path to the rendered output image for a node file
pub fn rendered_path(config: &CompareConfig, node_file: &Path) -> PathBuf {
    config.output_dir.join(format!("{}.out.png", file_name(node_file)))
}

/// Get the path to the diff image for a node file
pub fn diff_path(config: &CompareConfig, node_file: &Path) -> PathBuf {
    config.output_dir.join(format!("{}.diff.png", file_name(node_file)))
}

fn file_name(node_file: &Path) -> String {
    node_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "node".to_string())
}

/// Render `node_file` and compare it against `reference`
pub fn run_comparison(
    node_file: &Path,
    reference: &Path,
    config: &CompareConfig,
) -> Result<ComparisonOutcome> {
    if !reference.exists() {
        return Err(CompareError::ReferenceNotFound(reference.to_path_buf()));
    }

    let rendered = render_node_file(node_file)?;
    let reference_img = image::open(reference)?.to_rgba8();

    let result = match compare_images(&reference_img, &rendered, config.tolerance) {
        Ok(result) => Some(result),
        Err(CompareError::SizeMismatch { reference, rendered }) => {
            log::warn!(
                "Size mismatch for {}: reference {:?}, rendered {:?}",
                node_file.display(),
                reference,
                rendered
            );
            None
        }
        Err(e) => return Err(e),
    };

    let mut outcome = ComparisonOutcome {
        result,
        rendered_size: rendered.dimensions(),
        reference_size: reference_img.dimensions(),
        rendered_path: None,
        diff_path: None,
    };
    if outcome.passed() {
        return Ok(outcome);
    }

    std::fs::create_dir_all(&config.output_dir)?;
    let out = rendered_path(config, node_file);
    rendered.save(&out)?;
    outcome.rendered_path = Some(out);

    if outcome.result.is_some() {
        let diff = diff_path(config, node_file);
        generate_diff_image(&reference_img, &rendered, config.tolerance).save(&diff)?;
        outcome.diff_path = Some(diff);
    }

    Ok(outcome)
}
