/// Initialize the global tracing subscriber.
///
/// `log_level` is used as the `EnvFilter` directive when `RUST_LOG` is not
/// set. `log_file`, when present, redirects output to a rolling file
/// appender instead of stdout; the guard must be kept alive for the life of
/// the process or the writer is dropped.
pub fn init(log_level: &str, log_file: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("miner_gateway={level},miner_mlts={level},miner_admission={level},miner_backend={level}", level = log_level).into());

    match log_file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().map(|f| f.to_string_lossy().to_string()).unwrap_or_else(|| "miner.log".to_string());
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}
