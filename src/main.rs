use clap::Parser;

use neobookings_mcp::{
    cli::{self, Cli},
    harness::{EXIT_INTERRUPTED, EXIT_OK},
    logging,
};
use tracing::info;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = cli::parse_error_exit_code(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };

    logging::init_logging();

    let serving = cli.is_serve();
    let code = tokio::select! {
        code = cli::run(cli) => code,
        _ = tokio::signal::ctrl_c() => {
            if serving {
                info!("shutdown requested");
                EXIT_OK
            } else {
                eprintln!("interrupted");
                EXIT_INTERRUPTED
            }
        }
    };

    std::process::exit(code);
}
