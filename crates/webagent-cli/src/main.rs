use clap::Parser;
use webagent_cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match webagent_cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}
