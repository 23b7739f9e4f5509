use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = snapback_cli::Cli::parse();
    match snapback_cli::run(cli) {
        Ok(status) => std::process::exit(snapback_cli::exit_code(status)),
        Err(err) => {
            eprintln!("snapback: {err:#}");
            std::process::exit(snapback_cli::exit_code(
                snapback_core::status::RunStatus::Failed,
            ));
        }
    }
}
