//! Compare a rendered node file against a reference PNG.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use compare_render::{run_comparison, CompareConfig};

/// Render a node file and compare it against a reference image
#[derive(Parser, Debug)]
#[command(name = "compare-render")]
#[command(version)]
struct Args {
    /// Directory for the rendered and diff images [default: system temp dir]
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Largest per-channel difference still counted as equal
    #[arg(long, value_name = "N", default_value_t = 0)]
    tolerance: u8,

    /// Node file to render
    node_file: PathBuf,

    /// Reference PNG image
    reference: PathBuf,
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

    let mut config = CompareConfig {
        tolerance: args.tolerance,
        ..Default::default()
    };
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }

    let outcome = match run_comparison(&args.node_file, &args.reference, &config) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("compare-render: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(result) = &outcome.result {
        match result.similarity {
            Some(score) => println!("Similarity: {:.4}", score),
            None => println!("Similarity: n/a"),
        }
    }
    if outcome.passed() {
        println!("{}: OK", args.node_file.display());
        return ExitCode::SUCCESS;
    }

    match &outcome.result {
        Some(result) => eprintln!(
            "{}: {} pixels differ (max channel difference {}, tolerance {})",
            args.node_file.display(),
            result.differing_pixels,
            result.max_difference,
            config.tolerance
        ),
        None => eprintln!(
            "{}: rendered {:?} but reference is {:?}",
            args.node_file.display(),
            outcome.rendered_size,
            outcome.reference_size
        ),
    }
    if let Some(path) = &outcome.rendered_path {
        eprintln!("Rendered image: {}", path.display());
    }
    if let Some(path) = &outcome.diff_path {
        eprintln!("Diff image: {}", path.display());
    }
    ExitCode::FAILURE
}
