use routeloop::cli::run_cli;
use routeloop::logging::{init_logging_with_config, LogConfig};

fn main() {
    let _guard = match init_logging_with_config(&LogConfig::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run_cli() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
