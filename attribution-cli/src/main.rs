use std::fs;

use attribution::{AttributionConfig, CompiledBundle};
use config::Config;
use envconfig::Envconfig;
use eyre::{Result, WrapErr};

mod config;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::init_from_env().wrap_err("failed to load configuration from env")?;

    let attribution_config = match &config.config_path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read config document {path}"))?;
            AttributionConfig::from_json(&json)
                .wrap_err_with(|| format!("invalid config document {path}"))?
        }
        None => {
            tracing::info!("no config document given, using core defaults");
            AttributionConfig::core()
        }
    };

    let bundle = CompiledBundle::compile(&attribution_config, config.brand_code.as_deref())
        .wrap_err("configuration failed validation")?;
    let rendered = bundle.render();

    match &config.output_path {
        Some(path) => {
            fs::write(path, &rendered).wrap_err_with(|| format!("failed to write {path}"))?;
            tracing::info!(path, bytes = rendered.len(), "wrote attribution bundle");
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
