//! Render a node file to a PNG image.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rendernode::{codec, BackendRequest, Config, Display, Renderer, RendererKind};

/// Render a node file to a PNG image
#[derive(Parser, Debug)]
#[command(name = "rendernode")]
#[command(version)]
struct Args {
    /// Node file written by the codec
    node_file: PathBuf,

    /// PNG image to write
    png_file: PathBuf,

    /// Use the software renderer
    #[arg(long)]
    fallback: bool,

    /// Backend to try first (gl, vulkan or software)
    #[arg(long, value_name = "KIND")]
    renderer: Option<RendererKind>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("rendernode: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> rendernode::Result<()> {
    let start = Instant::now();
    let node = codec::load(&args.node_file)?;
    println!("Loaded {} nodes in {:?}", node.node_count(), start.elapsed());

    let mut config = Config::from_env();
    if let Some(kind) = args.renderer {
        config = config.with_backend(BackendRequest::Kind(kind));
    }

    let start = Instant::now();
    let mut renderer = if args.fallback {
        let mut renderer = Renderer::with_config(RendererKind::Software, config);
        renderer.realize_for_display(&Display::software_only("rendernode"))?;
        renderer
    } else {
        Renderer::for_display(&Display::new("rendernode"), &config)
    };
    println!("Realized {} renderer in {:?}", renderer.kind(), start.elapsed());

    let start = Instant::now();
    let texture = renderer.render_texture(&node, None)?;
    println!(
        "Rendered {}x{} in {:?}",
        texture.width(),
        texture.height(),
        start.elapsed()
    );
    renderer.unrealize();

    let start = Instant::now();
    texture.save_png(&args.png_file)?;
    println!(
        "Saved {} in {:?}",
        args.png_file.display(),
        start.elapsed()
    );
    Ok(())
}
