use clap::Parser;
use fundplan::api::{Cli, Command, run_cli_plan, run_http_server};
use fundplan::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("Warning: failed to initialize logging: {e}");
    }

    match cli.command {
        Command::Serve { port } => {
            if let Err(e) = run_http_server(port).await {
                eprintln!("Server error: {e}");
                std::process::exit(1);
            }
        }
        Command::Plan(args) => match run_cli_plan(args) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}
