use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `-v` 或 `settings.verbose` 開啟時使用 debug 等級
pub fn filter_directives(verbose: bool) -> &'static str {
    if verbose {
        "phone_tracer=debug,info"
    } else {
        "phone_tracer=info"
    }
}

pub fn init_cli_logger(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(verbose)));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        // 批次模式下方便其他工具解析
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_selects_debug_filter() {
        assert_eq!(filter_directives(false), "phone_tracer=info");
        assert_eq!(filter_directives(true), "phone_tracer=debug,info");
    }
}
