use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    /// Path to the deployment's JSON override document. Unset means
    /// core defaults only.
    #[envconfig(from = "CONFIG_PATH")]
    pub config_path: Option<String>,

    /// Brand code gating brand-specific custom channel rules.
    #[envconfig(from = "BRAND_CODE")]
    pub brand_code: Option<String>,

    /// Where to write the rendered SQL. Unset writes to stdout.
    #[envconfig(from = "OUTPUT_PATH")]
    pub output_path: Option<String>,
}
