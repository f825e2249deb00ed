use env_logger::Env;

/// Install the global logger once. `RUST_LOG` wins over `level` when set.
pub fn init(level: Option<&str>) {
    let level = level.unwrap_or("info");
    // HTTP client internals stay quiet unless asked for through RUST_LOG
    let default = format!("{level},reqwest=warn,hyper=warn,hyper_util=warn,rustls=warn");
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or(default))
        .format_target(false)
        .try_init();
}
