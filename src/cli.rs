// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Command line interface for the pyrium binary.

use clap::{Args, Parser, Subcommand};
use pyrium_aot::Config;
use std::path::PathBuf;

/// pyrium - compile mod scripts into PYBC bytecode
#[derive(Parser, Debug)]
#[command(name = "pyrium")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ./pyrium.toml when present)
    #[arg(long, global = true, env = "PYRIUM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile scripts into .pybc modules
    #[command(alias = "c")]
    Compile(CompileArgs),

    /// Print the listing of a compiled module
    #[command(alias = "dis")]
    Disasm(DisasmArgs),

    /// Print the lowered instructions of a script without writing anything
    Lower(LowerArgs),

    /// Start the interactive REPL (default)
    Repl(EntryArgs),
}

/// Entry-point selection shared by the compiling commands
#[derive(Args, Debug, Default, Clone)]
pub struct EntryArgs {
    /// Function to lower; repeat for several (default: on_tick)
    #[arg(long = "entry", value_name = "NAME")]
    pub entry: Vec<String>,

    /// Lower every top-level function
    #[arg(long, conflicts_with = "entry")]
    pub all_functions: bool,
}

impl EntryArgs {
    /// Applies the flags on top of file and environment settings.
    pub fn apply(&self, config: &mut Config) {
        if !self.entry.is_empty() {
            config.entry_points = self.entry.clone();
            config.all_functions = false;
        }
        if self.all_functions {
            config.all_functions = true;
        }
    }
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Script files to compile
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Output directory (default: config out_dir, else next to each input)
    #[arg(short, long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Module name written into the artifact (single input only)
    #[arg(long, value_name = "NAME")]
    pub module_name: Option<String>,

    #[command(flatten)]
    pub entry: EntryArgs,
}

#[derive(Args, Debug)]
pub struct DisasmArgs {
    /// Compiled module to list
    #[arg(value_name = "FILE.pybc")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct LowerArgs {
    /// Script to lower
    pub file: PathBuf,

    #[command(flatten)]
    pub entry: EntryArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compile() {
        let cli = Cli::try_parse_from([
            "pyrium", "compile", "a.py", "b.py", "-o", "build", "--entry", "on_load", "--entry",
            "on_tick",
        ])
        .unwrap();
        let Some(Commands::Compile(args)) = cli.command else {
            panic!("expected compile");
        };
        assert_eq!(args.files, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
        assert_eq!(args.out_dir, Some(PathBuf::from("build")));
        assert_eq!(args.entry.entry, vec!["on_load", "on_tick"]);
    }

    #[test]
    fn test_compile_requires_files() {
        assert!(Cli::try_parse_from(["pyrium", "compile"]).is_err());
    }

    #[test]
    fn test_entry_conflicts_with_all_functions() {
        assert!(
            Cli::try_parse_from(["pyrium", "lower", "a.py", "--entry", "f", "--all-functions"])
                .is_err()
        );
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["pyrium", "-v"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.verbose);
    }

    #[test]
    fn test_entry_args_apply() {
        let mut config = Config::default();
        config.all_functions = true;
        EntryArgs {
            entry: vec!["on_load".into()],
            all_functions: false,
        }
        .apply(&mut config);
        assert_eq!(config.entry_points, vec!["on_load"]);
        assert!(!config.all_functions);
    }
}
