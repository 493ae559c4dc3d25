use std::env;

use boxart_dl::cli::{self, Command};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match cli::parse_args(env::args().skip(1)) {
        Ok(Command::Run(args)) => args,
        Ok(Command::Help) => {
            cli::print_usage();
            std::process::exit(0);
        }
        Err(msg) => {
            eprintln!("Error: {msg}");
            cli::print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = cli::run(args).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}
