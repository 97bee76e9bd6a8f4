#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

fn main() { entry::main(); }

mod entry {
    use std::{
        fs,
        io::{self, prelude::*},
        path::{Path, PathBuf},
    };

    use anyhow::{Context, Result};
    use clap::Parser;
    use lexgen::{Lexer, LexerDfa, PriorityTable, rules::Session};
    use tracing::info;
    use tracing_subscriber::{EnvFilter, filter::LevelFilter, prelude::*};

    #[derive(Debug, Parser)]
    #[command(version, author, about)]
    struct Opts {
        /// Print more verbose logs
        #[arg(short, long, action = clap::ArgAction::Count, global = true)]
        verbose: u8,

        /// Log filter, using env_logger-like syntax.  Overrides --verbose.
        #[arg(long, env = "RUST_LOG", global = true)]
        log_filter: Option<String>,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Debug, clap::Subcommand)]
    enum Command {
        /// Compile a rule file into a scanner automaton and priority table
        Build {
            /// Rule file to compile
            #[arg(long, env = "LEXGEN_RULES")]
            rules: PathBuf,

            /// Output path for the scanner automaton
            #[arg(long, env = "LEXGEN_DFA")]
            dfa: PathBuf,

            /// Output path for the token priority table
            #[arg(long, env = "LEXGEN_PRIORITIES")]
            priorities: PathBuf,

            /// Also write the automaton as JSON to this path
            #[arg(long)]
            json: Option<PathBuf>,

            /// Number of times to retry a rule waiting on a forward reference
            #[arg(long, default_value_t = lexgen::rules::MAX_ATTEMPTS)]
            max_attempts: usize,
        },

        /// Tokenize a program using a previously built scanner
        Scan {
            /// Scanner automaton written by `build`
            #[arg(long, env = "LEXGEN_DFA")]
            dfa: PathBuf,

            /// Token priority table written by `build`
            #[arg(long, env = "LEXGEN_PRIORITIES")]
            priorities: PathBuf,

            /// Write the token names, one per line, to this path instead of
            /// printing each token
            #[arg(short, long)]
            output: Option<PathBuf>,

            /// Program to tokenize
            program: PathBuf,
        },

        /// Print a stored scanner automaton as JSON
        Json {
            /// Scanner automaton written by `build`
            #[arg(long, env = "LEXGEN_DFA")]
            dfa: PathBuf,
        },
    }

    macro_rules! init_error {
        ($($args:tt)*) => ({
            ::tracing::error!($($args)*);
            ::std::process::exit(1);
        })
    }

    fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
    where S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(false)
            .with_line_number(false)
            .with_writer(io::stderr)
    }

    #[inline]
    pub fn main() {
        let tmp_logger =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(fmt_layer()));

        let opts = Opts::parse();

        let filter = if let Some(filter) = opts.log_filter.as_deref() {
            EnvFilter::try_new(filter)
                .unwrap_or_else(|e| init_error!("Invalid log filter {filter:?}: {e}"))
        } else {
            EnvFilter::default().add_directive(
                match (cfg!(debug_assertions), opts.verbose) {
                    (false, 0) => LevelFilter::INFO,
                    (false, 1) | (true, 0) => LevelFilter::DEBUG,
                    _ => LevelFilter::TRACE,
                }
                .into(),
            )
        };

        drop(tmp_logger);
        tracing_subscriber::registry()
            .with(fmt_layer())
            .with(filter)
            .try_init()
            .unwrap_or_else(|e| init_error!("Error initializing logger: {e}"));

        tracing::debug!("{opts:#?}");

        std::process::exit(run(opts).map_or_else(
            |e| {
                tracing::error!("{e:?}");
                1
            },
            |()| 0,
        ));
    }

    fn read(path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("Error reading {}", path.display()))
    }

    fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
        fs::write(path, contents).with_context(|| format!("Error writing {}", path.display()))
    }

    fn load(dfa: &Path, priorities: &Path) -> Result<Lexer> {
        let dfa = LexerDfa::load(&read(dfa)?)
            .with_context(|| format!("Invalid scanner automaton in {}", dfa.display()))?;
        let prio: PriorityTable = read(priorities)?
            .parse()
            .with_context(|| format!("Invalid priority table in {}", priorities.display()))?;

        Ok(Lexer::new(dfa, prio))
    }

    #[inline]
    fn run(Opts { command, .. }: Opts) -> Result<()> {
        match command {
            Command::Build {
                rules,
                dfa,
                priorities,
                json,
                max_attempts,
            } => {
                let src = read(&rules)?;
                let lexer = Lexer::generate_with(&src, Session::with_max_attempts(max_attempts))
                    .with_context(|| format!("Error compiling rules from {}", rules.display()))?;

                write(&dfa, lexer.dfa().store())?;
                write(&priorities, lexer.priorities().to_string())?;

                if let Some(json) = json {
                    let text = lexer
                        .dfa()
                        .to_json()
                        .context("Error rendering automaton as JSON")?;
                    write(&json, text)?;
                }

                info!(
                    states = lexer.dfa().as_automaton().len(),
                    tokens = lexer.priorities().len(),
                    dfa = %dfa.display(),
                    "Scanner written"
                );
            },
            Command::Scan {
                dfa,
                priorities,
                output,
                program,
            } => {
                let lexer = load(&dfa, &priorities)?;
                let text = read(&program)?;

                if let Some(output) = output {
                    let mut names = String::new();
                    for tok in lexer.scan(&text) {
                        names.push_str(&tok.name);
                        names.push('\n');
                    }
                    write(&output, names)?;
                } else {
                    let mut stdout = io::stdout().lock();
                    for tok in lexer.scan(&text) {
                        writeln!(stdout, "{}: {}", tok.name, tok.lexeme)
                            .context("Error writing to stdout")?;
                    }
                }
            },
            Command::Json { dfa } => {
                let dfa = LexerDfa::load(&read(&dfa)?)
                    .with_context(|| format!("Invalid scanner automaton in {}", dfa.display()))?;
                println!("{}", dfa.to_json().context("Error rendering automaton as JSON")?);
            },
        }

        Ok(())
    }
}
