// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Interactive REPL for the Pyrium compiler.
//!
//! Each entered block is lowered as the body of the entry function and its
//! instruction listing is printed. Blocks that start with `def` are
//! compiled as written.

use owo_colors::OwoColorize;
use pyrium_aot::compiler::lower::{CALL_RULES, DEFAULT_ENTRY_POINT};
use pyrium_aot::{Compiler, Config, disasm, pybc};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Editor, Helper};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// REPL configuration constants
const HISTORY_FILE: &str = ".pyrium_history";
const MAX_HISTORY_SIZE: usize = 1000;
const MODULE_NAME: &str = "repl";

const KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const LITERALS: &[&str] = &["True", "False", "None"];

/// REPL commands that can be executed with a dot prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Exit,
    Clear,
    Version,
    Load,
    Bytes,
}

impl ReplCommand {
    /// Parse a REPL command from input string
    pub fn parse(input: &str) -> Option<(Self, Option<&str>)> {
        let input = input.trim();
        let rest = input.strip_prefix('.')?;

        let mut parts = rest.splitn(2, char::is_whitespace);
        let cmd = parts.next()?.to_lowercase();
        let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match cmd.as_str() {
            "help" | "h" | "?" => Some((ReplCommand::Help, arg)),
            "exit" | "quit" | "q" => Some((ReplCommand::Exit, arg)),
            "clear" | "cls" => Some((ReplCommand::Clear, arg)),
            "version" | "v" => Some((ReplCommand::Version, arg)),
            "load" | "l" => Some((ReplCommand::Load, arg)),
            "bytes" | "b" => Some((ReplCommand::Bytes, arg)),
            _ => None,
        }
    }

    /// Get all available commands for help/completion
    pub fn all_commands() -> &'static [(&'static str, &'static str)] {
        &[
            (".help", "Show this help message"),
            (".exit", "Exit the REPL"),
            (".clear", "Clear the screen"),
            (".version", "Show version information"),
            (".load <file>", "Compile a script file and list it"),
            (".bytes", "Hex dump of the last compiled module"),
        ]
    }
}

/// Helper struct for rustyline that provides completion, hints, and validation
#[derive(Default)]
struct PyriumHelper {
    /// Keywords, recognized calls and REPL commands
    words: Vec<String>,
}

impl PyriumHelper {
    fn new() -> Self {
        let words = KEYWORDS
            .iter()
            .chain(LITERALS)
            .copied()
            .chain(CALL_RULES.iter().map(|rule| rule.name))
            .chain(ReplCommand::all_commands().iter().map(|(cmd, _)| {
                cmd.split_whitespace().next().unwrap_or(cmd)
            }))
            .map(String::from)
            .collect();

        Self { words }
    }
}

fn word_start(line: &str) -> usize {
    line.rfind(|c: char| !c.is_alphanumeric() && c != '_' && c != '.')
        .map(|i| i + 1)
        .unwrap_or(0)
}

impl Completer for PyriumHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = word_start(&line[..pos]);
        let word = &line[start..pos];
        if word.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches: Vec<Pair> = self
            .words
            .iter()
            .filter(|w| w.starts_with(word))
            .map(|w| Pair {
                display: w.clone(),
                replacement: w[word.len()..].to_string(),
            })
            .collect();

        Ok((pos, matches))
    }
}

impl Hinter for PyriumHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        if pos < line.len() {
            return None;
        }

        let word = &line[word_start(line)..];
        if word.len() < 2 {
            return None;
        }

        self.words
            .iter()
            .find(|w| w.starts_with(word) && w.len() > word.len())
            .map(|w| w[word.len()..].to_string().dimmed().to_string())
    }
}

impl Highlighter for PyriumHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut current_word = String::new();

        for (i, c) in line.char_indices() {
            if c.is_alphanumeric() || c == '_' {
                current_word.push(c);
                continue;
            }
            if !current_word.is_empty() {
                result.push_str(&highlight_word(&current_word));
                current_word.clear();
            }
            if c == '#' {
                let comment = &line[i..];
                result.push_str(&comment.dimmed().to_string());
                return Cow::Owned(result);
            }
            let colored = match c {
                '(' | ')' | '[' | ']' | '{' | '}' | ':' => c.to_string().yellow().to_string(),
                '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' => {
                    c.to_string().cyan().to_string()
                }
                '"' | '\'' => c.to_string().green().to_string(),
                '.' if line.starts_with('.') => c.to_string().magenta().to_string(),
                _ => c.to_string(),
            };
            result.push_str(&colored);
        }

        if !current_word.is_empty() {
            result.push_str(&highlight_word(&current_word));
        }

        Cow::Owned(result)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn highlight_word(word: &str) -> String {
    if KEYWORDS.contains(&word) {
        word.magenta().bold().to_string()
    } else if LITERALS.contains(&word) {
        word.blue().to_string()
    } else if CALL_RULES.iter().any(|rule| rule.name == word) {
        word.cyan().to_string()
    } else if word.chars().all(|c| c.is_ascii_digit() || c == '.') {
        word.yellow().to_string()
    } else {
        word.to_string()
    }
}

impl Validator for PyriumHelper {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if is_complete(ctx.input()) {
            Ok(ValidationResult::Valid(None))
        } else {
            Ok(ValidationResult::Incomplete)
        }
    }
}

/// Whether an entered block is ready to compile.
///
/// A block stays open while brackets or strings are unclosed, after a line
/// ending in `:` or `\`, and, once it spans several lines, until a blank
/// line is entered.
fn is_complete(input: &str) -> bool {
    if input.trim_start().starts_with('.') {
        return true;
    }
    if !is_balanced(input) {
        return false;
    }

    let trimmed = input.trim_end();
    if trimmed.ends_with(':') || trimmed.ends_with('\\') {
        return false;
    }

    let last_line_blank = input
        .rsplit('\n')
        .next()
        .is_some_and(|line| line.trim().is_empty());
    !input.contains('\n') || last_line_blank
}

/// Check if brackets and quotes are balanced
fn is_balanced(input: &str) -> bool {
    let mut stack = Vec::new();
    let mut in_string = None;
    let mut escape_next = false;
    let mut in_comment = false;

    for c in input.chars() {
        if in_comment {
            in_comment = c != '\n';
            continue;
        }
        if escape_next {
            escape_next = false;
            continue;
        }

        if c == '\\' && in_string.is_some() {
            escape_next = true;
            continue;
        }

        match in_string {
            Some(quote) if c == quote => in_string = None,
            Some(_) => {}
            None => match c {
                '#' => in_comment = true,
                '"' | '\'' => in_string = Some(c),
                '(' => stack.push(')'),
                '[' => stack.push(']'),
                '{' => stack.push('}'),
                ')' | ']' | '}' => {
                    if stack.pop() != Some(c) {
                        return true; // Unbalanced but we should let the parser handle the error
                    }
                }
                _ => {}
            },
        }
    }

    stack.is_empty() && in_string.is_none()
}

/// Turns REPL input into a script: bare statements become the body of
/// `entry`.
fn wrap_block(input: &str, entry: &str) -> String {
    if input.trim_start().starts_with("def ") || input.trim_start().starts_with('@') {
        let mut source = input.to_string();
        source.push('\n');
        return source;
    }

    let mut source = format!("def {}():\n", entry);
    for line in input.lines() {
        source.push_str("    ");
        source.push_str(line);
        source.push('\n');
    }
    source
}

/// Formats bytes as a 16-column hex dump with offsets.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (row, chunk) in bytes.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{:02x}", b)).collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        out.push_str(&format!("{:08x}  {:<47}  {}\n", row * 16, hex.join(" "), ascii));
    }
    out
}

impl Helper for PyriumHelper {}

/// The interactive REPL
pub struct Repl {
    compiler: Compiler,
    entry: String,
    last_bytes: Option<Vec<u8>>,
    editor: Editor<PyriumHelper, DefaultHistory>,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(config: &Config) -> rustyline::Result<Self> {
        let editor_config = rustyline::Config::builder()
            .history_ignore_dups(true)?
            .history_ignore_space(true)
            .max_history_size(MAX_HISTORY_SIZE)?
            .auto_add_history(true)
            .build();

        let mut editor = Editor::with_config(editor_config)?;
        editor.set_helper(Some(PyriumHelper::new()));

        // Determine history file path
        let history_path = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pyrium")
            .join(HISTORY_FILE);

        // Create parent directory if it doesn't exist
        if let Some(parent) = history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        // Load history
        let _ = editor.load_history(&history_path);

        let entry = config
            .entry_points
            .first()
            .cloned()
            .unwrap_or_else(|| DEFAULT_ENTRY_POINT.to_string());

        Ok(Self {
            compiler: Compiler::from_config(config),
            entry,
            last_bytes: None,
            editor,
            history_path,
        })
    }

    /// Run the REPL main loop
    pub fn run(&mut self) -> rustyline::Result<()> {
        self.print_banner();

        loop {
            let prompt = self.format_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    // Check for REPL commands
                    if let Some((cmd, arg)) = ReplCommand::parse(&line) {
                        match self.execute_command(cmd, arg) {
                            CommandResult::Continue => continue,
                            CommandResult::Exit => break,
                        }
                    }

                    self.compile_and_print(&line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C".dimmed());
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("{}", "^D".dimmed());
                    break;
                }
                Err(err) => {
                    eprintln!("{}: {:?}", "Error".red().bold(), err);
                    break;
                }
            }
        }

        // Save history
        let _ = self.editor.save_history(&self.history_path);

        println!();
        Ok(())
    }

    fn print_banner(&self) {
        let version = env!("CARGO_PKG_VERSION");
        println!();
        println!(
            "  {} {} {}",
            "Pyrium AOT Compiler".white().bold(),
            "v".dimmed(),
            version.bright_yellow()
        );
        println!(
            "  {} {}{}",
            "Statements are lowered as the body of".dimmed(),
            self.entry.cyan(),
            "()".cyan()
        );
        println!();
        println!(
            "  {} {} {}",
            "Type".dimmed(),
            ".help".cyan(),
            "for available commands".dimmed()
        );
        println!();
    }

    fn format_prompt(&self) -> String {
        format!("{} ", "pyrium>".bright_green().bold())
    }

    fn execute_command(&mut self, cmd: ReplCommand, arg: Option<&str>) -> CommandResult {
        match cmd {
            ReplCommand::Help => self.print_help(),
            ReplCommand::Exit => return CommandResult::Exit,
            ReplCommand::Clear => print!("\x1B[2J\x1B[H"),
            ReplCommand::Version => self.print_version(),
            ReplCommand::Load => match arg {
                Some(path) => self.load_file(Path::new(path)),
                None => eprintln!(
                    "{}: {} {}",
                    "Error".red().bold(),
                    ".load".cyan(),
                    "requires a file path".dimmed()
                ),
            },
            ReplCommand::Bytes => match &self.last_bytes {
                Some(bytes) => print!("{}", hex_dump(bytes)),
                None => println!("{}", "nothing compiled yet".dimmed()),
            },
        }
        CommandResult::Continue
    }

    fn print_help(&self) {
        println!();
        println!("{}", "REPL Commands:".white().bold());
        println!();

        for (cmd, desc) in ReplCommand::all_commands() {
            println!("  {:16} {}", cmd.cyan(), desc.dimmed());
        }

        println!();
        println!("{}", "Recognized calls:".white().bold());
        println!();
        for rule in CALL_RULES {
            println!(
                "  {:28} {} {}",
                rule.name.cyan(),
                rule.opcode.to_string().yellow(),
                format!("(min {} args)", rule.arity).dimmed()
            );
        }

        println!();
        println!("{}", "Keyboard Shortcuts:".white().bold());
        println!();
        println!("  {:16} {}", "Ctrl+C".yellow(), "Cancel current input".dimmed());
        println!("  {:16} {}", "Ctrl+D".yellow(), "Exit REPL".dimmed());
        println!("  {:16} {}", "Tab".yellow(), "Autocomplete".dimmed());
        println!("  {:16} {}", "Enter twice".yellow(), "Finish a block".dimmed());
        println!();
    }

    fn print_version(&self) {
        println!();
        println!(
            "{}: {}",
            "Pyrium".bright_cyan().bold(),
            env!("CARGO_PKG_VERSION").yellow()
        );
        println!("{}: {}", "PYBC format".dimmed(), pybc::VERSION);
        println!();
    }

    fn load_file(&mut self, path: &Path) {
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let name = pyrium_aot::artifact::module_name(path);
                self.compile_source(&source, &name);
            }
            Err(e) => print_error(&format!("{}: {}", path.display(), e)),
        }
    }

    fn compile_and_print(&mut self, input: &str) {
        let source = wrap_block(input, &self.entry);
        self.compile_source(&source, MODULE_NAME);
    }

    fn compile_source(&mut self, source: &str, name: &str) {
        let module = match self.compiler.lower_source(source, name) {
            Ok(module) => module,
            Err(e) => return print_error(&e.to_string()),
        };

        match pybc::encode(&module) {
            Ok(bytes) => {
                print!("{}", colorize_listing(&disasm::disassemble(&module)));
                println!(
                    "{}",
                    format!(
                        "{} instructions, {} pooled strings, {} bytes",
                        module.instruction_count(),
                        module.string_pool.len(),
                        bytes.len()
                    )
                    .dimmed()
                );
                self.last_bytes = Some(bytes);
            }
            Err(e) => print_error(&e.to_string()),
        }
    }
}

/// Result of executing a REPL command
enum CommandResult {
    Continue,
    Exit,
}

/// Highlights opcode names in a listing
fn colorize_listing(listing: &str) -> String {
    let mut out = String::with_capacity(listing.len() * 2);
    for line in listing.lines() {
        let body = line.trim_start();
        match body.split_once("  ") {
            Some((index, rest)) if index.len() == 4 && index.chars().all(|c| c.is_ascii_digit()) => {
                let indent = &line[..line.len() - body.len()];
                let pad = &rest[..rest.len() - rest.trim_start().len()];
                let rest = rest.trim_start();
                let (name, operands) = rest.split_once(' ').unwrap_or((rest, ""));
                out.push_str(&format!(
                    "{}{}  {}{} {}\n",
                    indent,
                    index.dimmed(),
                    pad,
                    name.yellow().bold(),
                    operands
                ));
            }
            _ => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    out
}

/// Print a formatted error message
fn print_error(message: &str) {
    eprintln!("{}: {}", "Error".red().bold(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repl_command_parse() {
        assert!(matches!(
            ReplCommand::parse(".help"),
            Some((ReplCommand::Help, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".exit"),
            Some((ReplCommand::Exit, None))
        ));
        assert!(matches!(
            ReplCommand::parse(".load mods/zombies.py"),
            Some((ReplCommand::Load, Some("mods/zombies.py")))
        ));
        assert!(matches!(
            ReplCommand::parse(".bytes"),
            Some((ReplCommand::Bytes, None))
        ));
        assert!(ReplCommand::parse("log('x')").is_none());
        assert!(ReplCommand::parse(".unknown").is_none());
    }

    #[test]
    fn test_is_balanced() {
        assert!(is_balanced("log('x')"));
        assert!(is_balanced("give_item('a', 'b', 1)"));
        assert!(!is_balanced("give_item('a',"));
        assert!(!is_balanced("log('unterminated"));
        assert!(is_balanced("log('with (paren')"));
        assert!(is_balanced("pass  # comment with ("));
    }

    #[test]
    fn test_is_complete() {
        assert!(is_complete("log('x')"));
        assert!(!is_complete("if x > 1:"));
        assert!(!is_complete("if x > 1:\n    log('a')"));
        assert!(is_complete("if x > 1:\n    log('a')\n"));
        assert!(is_complete(".load file.py"));
    }

    #[test]
    fn test_wrap_block() {
        assert_eq!(
            wrap_block("log('a')\nlog('b')", "on_tick"),
            "def on_tick():\n    log('a')\n    log('b')\n"
        );
        assert_eq!(wrap_block("def on_load(): pass", "on_tick"), "def on_load(): pass\n");
    }

    #[test]
    fn test_wrapped_block_compiles() {
        let source = wrap_block("if hp < 5:\n    log('low')\n", "on_tick");
        let module = Compiler::new().lower_source(&source, MODULE_NAME).unwrap();
        assert_eq!(module.instruction_count(), 3);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(
            hex_dump(b"PYBC\x00\x00\x00\x02"),
            "00000000  50 59 42 43 00 00 00 02                          PYBC....\n"
        );
    }
}
