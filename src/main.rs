// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Pyrium - ahead-of-time compiler for game-server mod scripts
//!
//! This is the main entry point for the pyrium CLI/REPL.
//!
//! ## Features
//!
//! - Compile scripts to `.pybc` modules, several files on a thread pool
//! - Disassemble compiled modules
//! - Interactive REPL that shows the lowered instructions

mod cli;
mod repl;

use anyhow::{Context, bail};
use clap::Parser;
use cli::{Cli, Commands, CompileArgs, DisasmArgs, EntryArgs, LowerArgs};
use owo_colors::OwoColorize;
use pyrium_aot::batch::{AsyncCompiler, ParallelCompiler};
use pyrium_aot::{Compiler, Config, artifact, disasm, pybc};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point - uses tokio runtime for async file I/O.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let default = if cli.verbose {
        "pyrium=debug,pyrium_aot=debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => Config::load_default().context("cannot load config")?,
    };
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Compile(args)) => compile(args, config, cli.quiet).await,
        Some(Commands::Disasm(args)) => disassemble(args),
        Some(Commands::Lower(args)) => lower(args, config),
        Some(Commands::Repl(args)) => run_repl(args, config),
        None => run_repl(&EntryArgs::default(), config),
    }
}

async fn compile(args: &CompileArgs, mut config: Config, quiet: bool) -> anyhow::Result<()> {
    args.entry.apply(&mut config);
    if let Some(dir) = &args.out_dir {
        config.out_dir = Some(dir.clone());
    }
    if let Some(dir) = &config.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create output directory {}", dir.display()))?;
    }

    if let Some(name) = &args.module_name {
        let [input] = args.files.as_slice() else {
            bail!("--module-name needs exactly one input file");
        };
        let source = std::fs::read_to_string(input)
            .with_context(|| format!("cannot read {}", input.display()))?;
        let bytes = Compiler::from_config(&config)
            .compile_source(&source, name)
            .with_context(|| input.display().to_string())?;
        let output = artifact::output_path(input, config.out_dir.as_deref());
        artifact::write_atomic(&output, &bytes)
            .with_context(|| format!("cannot write {}", output.display()))?;
        if !quiet {
            report_success(input, &output);
        }
        return Ok(());
    }

    let workers = ParallelCompiler::from_config(&config).context("cannot start compiler threads")?;
    tracing::debug!(threads = workers.threads(), "compiling on thread pool");
    let results = AsyncCompiler::from_config(&config)
        .compile_files_on(&workers, &args.files)
        .await;

    let mut failed = 0;
    for (input, result) in args.files.iter().zip(results) {
        match result {
            Ok(output) => {
                if !quiet {
                    report_success(input, &output);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("  {} {}: {}", "✗".red().bold(), input.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} files failed to compile", failed, args.files.len());
    }
    Ok(())
}

fn report_success(input: &std::path::Path, output: &std::path::Path) {
    println!(
        "  {} {} {} {}",
        "✓".green().bold(),
        input.display(),
        "→".dimmed(),
        output.display().cyan()
    );
}

fn disassemble(args: &DisasmArgs) -> anyhow::Result<()> {
    let file = std::fs::File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;
    let module = pybc::read_from(std::io::BufReader::new(file))
        .with_context(|| args.file.display().to_string())?;
    print!("{}", disasm::disassemble(&module));
    Ok(())
}

fn lower(args: &LowerArgs, mut config: Config) -> anyhow::Result<()> {
    args.entry.apply(&mut config);
    let source = std::fs::read_to_string(&args.file)
        .with_context(|| format!("cannot read {}", args.file.display()))?;
    let module = Compiler::from_config(&config)
        .lower_source(&source, &artifact::module_name(&args.file))
        .with_context(|| args.file.display().to_string())?;
    print!("{}", disasm::disassemble(&module));
    Ok(())
}

fn run_repl(args: &EntryArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    let mut repl = repl::Repl::new(&config).context("failed to initialize REPL")?;
    repl.run().context("REPL error")?;
    Ok(())
}
