use clap::Parser;
use tracing_subscriber::EnvFilter;

use semeval::cli::Cli;
use semeval::error::EvalError;
use semeval::runner::run;

fn main() {
    init_tracing();

    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn real_main() -> Result<i32, EvalError> {
    let cli = Cli::parse();
    run(&cli)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
