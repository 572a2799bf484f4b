//! Command-line driver.
//!
//! Loads a root source file, resolves and analyzes it, locates the main
//! process, and prepares the initial execution state. The module search
//! path is assembled from `-I` flags, the `CHP_PATH` environment variable,
//! and the user configuration file, in that order. `--interactive` drops
//! into a command prompt that scans with the lexer's command mode.

use std::error::Error;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use serde::Deserialize;

use crate::ast::print::print_module;
use crate::ast::NodeKind;
use crate::exec::{find_main, prepare_exec, read_source};
use crate::intern::Interner;
use crate::lexer::{LexFlags, Lexer};
use crate::modules::{Driver, ModuleId};
use crate::token::{TokenKind, TokenValue};

#[derive(ClapParser)]
#[command(name = "chpsim")]
#[command(about = "CHP simulator front end", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Root source file (stdin when omitted in interactive mode)
    pub file: Option<PathBuf>,

    /// Add a directory to the module search path (repeatable)
    #[arg(short = 'I', long = "include")]
    pub include: Vec<PathBuf>,

    /// Name of the main process
    #[arg(long)]
    pub main: Option<String>,

    /// Refuse the lexer's operator fix-ups instead of continuing
    #[arg(long)]
    pub strict: bool,

    /// Report each file as it is read
    #[arg(short, long)]
    pub verbose: bool,

    /// Pretty-print the analyzed root module
    #[arg(long)]
    pub print: bool,

    /// Drop into the command prompt after loading
    #[arg(short, long)]
    pub interactive: bool,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    search: SearchConfig,
}

#[derive(Deserialize, Default)]
struct SearchConfig {
    #[serde(default)]
    path: Vec<String>,
}

fn load_config() -> Config {
    let Some(dir) = dirs::config_dir() else {
        return Config::default();
    };
    let path = dir.join("chpsim").join("config.toml");
    let Ok(text) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&text).unwrap_or_default()
}

/// Assemble the search path: flags first, then `CHP_PATH`, then the
/// configuration file.
fn search_path(cli: &Cli) -> Vec<PathBuf> {
    let mut path: Vec<PathBuf> = cli.include.clone();
    if let Ok(env) = std::env::var("CHP_PATH") {
        for p in env.split(':').filter(|p| !p.is_empty()) {
            path.push(PathBuf::from(p));
        }
    }
    for p in load_config().search.path {
        path.push(PathBuf::from(p));
    }
    path
}

pub fn run_cli() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut d = Driver::new();
    d.verbose = cli.verbose;
    d.strict = cli.strict;
    d.path = search_path(&cli);

    if cli.file.is_none() && !cli.interactive {
        return Err("no source file (use --interactive for the command prompt)".into());
    }

    let mut loaded = None;
    if let Some(file) = &cli.file {
        loaded = Some(load(&mut d, &file.display().to_string(), cli.main.as_deref())?);
        if cli.print {
            let (_, root) = loaded.unwrap();
            let node = d.module(root).node;
            print!("{}", print_module(&d.ast, &d.interner, node));
        }
    }

    if cli.interactive {
        command_loop(&mut d, loaded.map(|(_, root)| root), cli.main.as_deref())?;
    }
    Ok(())
}

/// Load and analyze one root file, report the main process.
fn load(
    d: &mut Driver,
    file: &str,
    main_id: Option<&str>,
) -> Result<(usize, ModuleId), Box<dyn Error>> {
    let (order, root) = read_source(d, Some(file))?;
    if d.verbose {
        eprintln!("{}: {} module(s) analyzed", file, order.len());
    }
    if let Some(dp) = find_main(d, root, main_id, false) {
        let st = prepare_exec(d, dp);
        let id = match &d.ast[dp].kind {
            NodeKind::ProcessDef { id, .. } => d.interner.resolve(*id).to_string(),
            _ => String::new(),
        };
        println!(
            "{}: main process '{}' prepared at '{}' ({} meta, {} variable slot(s))",
            file,
            id,
            st.main.nm,
            st.main.meta.len(),
            st.main.var.len()
        );
    }
    Ok((order.len(), root))
}

/// The interactive prompt. Commands are scanned in the lexer's command
/// mode: keywords are not recognized (so `step` can name a variable),
/// newline is a token, and `/a/b[3]` is an instance path.
fn command_loop(
    d: &mut Driver,
    mut root: Option<ModuleId>,
    main_id: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let mut interner = Interner::new();
    let mut lex = Lexer::new(&mut interner);
    lex.fin_nm = "(command)".to_string();
    lex.use_stdin();
    if atty_stdin() {
        lex.use_readline();
    }
    let mut main_buf = main_id.map(String::from);
    loop {
        let t = match lex.prompt_cmnd("(chp) ") {
            Ok(t) => t,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };
        match t {
            TokenKind::Eof => break,
            TokenKind::Newline => continue,
            TokenKind::Instance => {
                let s = lex.curr.val.as_sym();
                println!("no running simulation for {}", lex.interner.resolve(s));
                continue;
            }
            TokenKind::Id => {}
            _ => {
                eprintln!("unknown command; try load, main, print, run, path, quit");
                continue;
            }
        }
        let word = lex.interner.resolve(lex.curr.val.as_sym()).to_string();
        match word.as_str() {
            "quit" | "exit" => break,
            "load" => {
                lex.flags |= LexFlags::FILENAME;
                let r = lex.next();
                lex.flags &= !LexFlags::FILENAME;
                if let Err(e) = r {
                    eprintln!("{}", e);
                    continue;
                }
                let file = match &lex.curr.val {
                    TokenValue::Str(s) if !s.is_empty() => s.clone(),
                    _ => {
                        eprintln!("load: expected a file name");
                        continue;
                    }
                };
                match load(d, &file, main_buf.as_deref()) {
                    Ok((_, r)) => root = Some(r),
                    Err(e) => eprintln!("{}", e),
                }
            }
            "main" => {
                if let Err(e) = lex.next() {
                    eprintln!("{}", e);
                    continue;
                }
                match &lex.curr.val {
                    TokenValue::Sym(s) => {
                        main_buf = Some(lex.interner.resolve(*s).to_string());
                    }
                    _ => eprintln!("main: expected a process name"),
                }
            }
            "path" => {
                lex.flags |= LexFlags::FILENAME;
                let r = lex.next();
                lex.flags &= !LexFlags::FILENAME;
                if let Err(e) = r {
                    eprintln!("{}", e);
                    continue;
                }
                if let TokenValue::Str(s) = &lex.curr.val {
                    d.path.push(PathBuf::from(s));
                }
            }
            "print" => match root {
                Some(r) => {
                    let node = d.module(r).node;
                    print!("{}", print_module(&d.ast, &d.interner, node));
                }
                None => eprintln!("nothing loaded"),
            },
            "run" => match root {
                Some(r) => {
                    if let Some(dp) = find_main(d, r, main_buf.as_deref(), false) {
                        let st = prepare_exec(d, dp);
                        println!(
                            "prepared '{}' with {} meta and {} variable slot(s); \
                             execution is handled by the simulator core",
                            st.main.nm,
                            st.main.meta.len(),
                            st.main.var.len()
                        );
                    }
                }
                None => eprintln!("nothing loaded"),
            },
            _ => eprintln!("unknown command: {}", word),
        }
    }
    Ok(())
}

fn atty_stdin() -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        // SAFETY: isatty only inspects the descriptor
        unsafe { libc_isatty(std::io::stdin().as_raw_fd()) }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(unix)]
unsafe fn libc_isatty(fd: i32) -> bool {
    extern "C" {
        fn isatty(fd: i32) -> i32;
    }
    isatty(fd) != 0
}
