use std::io::Write;

/// Installs an `env_logger` configured from `RUST_LOG`, printing millisecond timestamps,
/// level and source location. Meant for demos and tests, calling it twice panics.
pub fn setup_logger() {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - [{}] {}:{} {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or_default(),
                record.line().unwrap_or_default(),
                record.args()
            )
        })
        .init();
}
