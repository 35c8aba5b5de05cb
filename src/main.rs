use anyhow::Result;
use clap::Parser;
use dexray::cli::Cli;
use dexray::detect::{FileKind, default_save_dir, detect_file_kind};
use dexray::dump;
use dexray::engine::{self, AnalysisOptions};
use dexray::pool::effective_thread_count;
use dexray::progress::Totals;
use dexray::render::{Render, SkeletonRenderer};
use dexray::task::RenderKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let kind = detect_file_kind(&cli.input)?;

    if cli.print {
        return dump::dump(&cli.input, kind);
    }

    let render_kind = if cli.smali {
        RenderKind::Assembly
    } else {
        RenderKind::Source
    };
    let renderer: Arc<dyn Render> = Arc::new(SkeletonRenderer);

    // a raw class file with no explicit output goes straight to stdout
    if kind == FileKind::Class && cli.output.is_none() {
        return engine::print_class(&cli.input, render_kind, renderer.as_ref());
    }

    let save_dir = cli
        .output
        .clone()
        .unwrap_or_else(|| default_save_dir(&cli.input));
    let opts = AnalysisOptions {
        save_dir: save_dir.clone(),
        thread_count: cli.threads,
        kind: render_kind,
        show_progress: !cli.quiet && !cli.json,
    };

    if !cli.quiet {
        print_banner(kind, &cli.input, &save_dir, opts.thread_count);
    }

    let totals = match kind {
        FileKind::Apk => engine::analyse_apk(&cli.input, &opts, renderer)?,
        FileKind::Jar => engine::analyse_jar(&cli.input, &opts, renderer)?,
        FileKind::Dex => engine::analyse_dex(&cli.input, &opts, renderer)?,
        FileKind::Class => engine::analyse_class(&cli.input, &opts, renderer)?,
    };

    report(&cli, totals)?;
    Ok(())
}

fn print_banner(kind: FileKind, input: &PathBuf, save_dir: &PathBuf, threads: usize) {
    println!("[dexray] {} file analysis", kind.describe());
    println!("File     : {}", input.display());
    println!("Save to  : {}", save_dir.display());
    println!("Thread   : {}", effective_thread_count(threads));
}

fn report(cli: &Cli, totals: Totals) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }
    if !cli.quiet {
        println!("\n[Done]");
        if totals.failed > 0 {
            eprintln!(
                "[dexray] {} of {} classes failed to render; see log output",
                totals.failed, totals.added
            );
        }
    }
    Ok(())
}
