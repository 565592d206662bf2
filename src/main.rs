mod debug_report;

use std::io::{self, IsTerminal, Read};
use std::process::ExitCode;
use tokenrules::{Document, Expression, Options, Registry, RuleSet, TokenPattern, WordList};

fn main() -> ExitCode {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if config.debug || std::env::var_os("TOKENRULES_DEBUG").is_some_and(|v| !v.is_empty() && v != "0") {
        StderrLogger::install();
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(config: &CliConfig) -> tokenrules::Result<()> {
    let mut registry = Registry::new();
    for (name, path) in &config.lexicons {
        registry = registry.with_lexicon(name, WordList::from_path(path)?);
    }

    let mut doc = Document::from_tagged("input", config.input.trim());
    let palette = debug_report::Palette::new(config.color);
    match &config.mode {
        Mode::Program(path) => {
            let rules = RuleSet::from_path(path, &registry)?;
            let options = Options { scope: config.scope.clone() };
            let report = rules.execute_with(&mut doc, &options);
            debug_report::print_run(&doc, &report, &palette);
        }
        Mode::Pattern(text) => {
            let pattern = TokenPattern::compile_with(text, &registry)?;
            let matches: Vec<_> = match &config.scope {
                None => pattern.matcher(&doc).collect(),
                Some(scope) => doc
                    .annotations_of(scope)
                    .filter_map(|a| doc.annotation_span(a.id()))
                    .flat_map(|span| pattern.matcher_in(&span).collect::<Vec<_>>())
                    .collect(),
            };
            debug_report::print_matches(&doc, &pattern, &matches, &palette);
        }
        Mode::Expr(text) => {
            let expr = Expression::compile_with(text, &registry)?;
            debug_report::print_expression(&doc, &expr, &palette);
        }
    }
    Ok(())
}

enum Mode {
    Program(String),
    Pattern(String),
    Expr(String),
}

struct CliConfig {
    mode: Mode,
    input: String,
    lexicons: Vec<(String, String)>,
    scope: Option<String>,
    color: bool,
    debug: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut mode: Option<Mode> = None;
    let mut input: Option<String> = None;
    let mut lexicons = Vec::new();
    let mut scope = None;
    let mut color = io::stdout().is_terminal();
    let mut debug = false;
    let mut args = std::env::args().skip(1).peekable();

    let mut set_mode = |value: Mode| -> Result<(), String> {
        if mode.is_some() {
            return Err("error: use only one of --program, --pattern and --expr".to_string());
        }
        mode = Some(value);
        Ok(())
    };

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
            _ => (arg.clone(), None),
        };
        let mut value = |name: &str| -> Result<String, String> {
            inline.clone().or_else(|| args.next()).ok_or_else(|| format!("error: {name} expects a value"))
        };
        match flag.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("tokenrules {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--debug" => debug = true,
            "--program" | "-p" => set_mode(Mode::Program(value("--program")?))?,
            "--pattern" => set_mode(Mode::Pattern(value("--pattern")?))?,
            "--expr" | "-e" => set_mode(Mode::Expr(value("--expr")?))?,
            "--scope" => scope = Some(value("--scope")?),
            "--lexicon" => {
                let spec = value("--lexicon")?;
                let (name, path) = spec
                    .split_once('=')
                    .ok_or_else(|| format!("error: --lexicon expects name=path, got '{spec}'"))?;
                lexicons.push((name.to_string(), path.to_string()));
            }
            "--input" | "-i" => {
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(value("--input")?);
            }
            "--" => {
                let rest = args.by_ref().collect::<Vec<_>>().join(" ");
                if !rest.trim().is_empty() {
                    if input.is_some() {
                        return Err("error: input provided multiple times".to_string());
                    }
                    input = Some(rest);
                }
                break;
            }
            _ if arg.starts_with('-') => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => {
                let rest = std::iter::once(arg).chain(args.by_ref()).collect::<Vec<_>>().join(" ");
                if input.is_some() {
                    return Err("error: input provided multiple times".to_string());
                }
                input = Some(rest);
                break;
            }
        }
    }

    let Some(mode) = mode else {
        return Err(format!("error: one of --program, --pattern or --expr is required\n\n{}", help_text()));
    };

    let input = match input {
        Some(value) => value,
        None => read_stdin_input()?,
    };

    if input.trim().is_empty() {
        return Err(format!("error: no input provided\n\n{}", help_text()));
    }

    Ok(CliConfig { mode, input, lexicons, scope, color, debug })
}

fn read_stdin_input() -> Result<String, String> {
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|err| format!("error: failed to read stdin: {err}"))?;
    Ok(buffer)
}

/// Minimal `log` backend: every record at `debug` and above goes to stderr.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl StderrLogger {
    fn install() {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Debug);
        }
    }
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::Debug
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{:>5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "tokenrules {version}

Run expressions, token patterns or rule programs over a tagged sentence.

Usage:
  tokenrules --program <file> [OPTIONS] [--] <input...>
  tokenrules --pattern <text> [OPTIONS] [--] <input...>
  tokenrules --expr <text> [OPTIONS] [--] <input...>

Input is whitespace separated tokens, each `word`, `word/TAG` or
`word/TAG/lemma`. If no input arguments are given, stdin is read.

Options:
  -p, --program <file>       Rule program to execute.
      --pattern <text>       Token pattern to match.
  -e, --expr <text>          Expression to evaluate on every token.
      --lexicon <name=path>  Register a word list (one entry per line) as %name.
                             May be repeated.
      --scope <type>         Match inside each annotation of this type.
  -i, --input <text>         Input text.
      --color                Force ANSI color output.
      --no-color             Disable ANSI color output.
      --debug                Print engine decisions to stderr
                             (also enabled by TOKENRULES_DEBUG=1).
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Exit codes:
  0  Success.
  1  Compile or IO error.
  2  Invalid arguments or missing input.
",
        version = env!("CARGO_PKG_VERSION"),
    )
}
