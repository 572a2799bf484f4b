//! chpsim entry point.

fn main() {
    if let Err(e) = chpsim::cli::run_cli() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
