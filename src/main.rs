use sitelens::app::{run_with_overrides, DEFAULT_CONFIG_PATH};
use sitelens::cli::CliOverrides;
use sitelens::config::AppConfig;
use sitelens::logging;

fn main() {
    let cli = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    logging::init();
    let config_path = cli.config_path().cloned().unwrap_or_else(|| DEFAULT_CONFIG_PATH.into());
    let config = AppConfig::load_or_default(&config_path);
    if let Err(err) = run_with_overrides(config, cli.into_config_overrides()) {
        tracing::error!(error = ?err, "application error");
        std::process::exit(1);
    }
}
