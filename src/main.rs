// src/main.rs

use rollout::{cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("rollout error: {err:?}");
        std::process::exit(1);
    }

    let code = match run(args).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("rollout error: {err}");
            eprintln!("hint: {}", err.hint());
            err.exit_code()
        }
    };
    std::process::exit(code);
}
