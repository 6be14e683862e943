/// Sets up `env_logger` with timestamped lines. `RUST_LOG` wins when set.
pub fn init_logging(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    init_logging_with_filter(filter);
}

pub fn init_logging_with_filter(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "[{}] {} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        })
        .init();
}
