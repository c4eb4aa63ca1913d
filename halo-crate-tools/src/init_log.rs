use std::io::Write;

/// 安装全局 logger
///
/// 默认等级为 Info，可以通过 `RUST_LOG` 覆盖
pub fn init_log() {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let level_color = match record.level() {
                log::Level::Error => Some(anstyle::AnsiColor::Red),
                log::Level::Warn => Some(anstyle::AnsiColor::Yellow),
                log::Level::Info => Some(anstyle::AnsiColor::Green),
                log::Level::Debug => Some(anstyle::AnsiColor::Cyan),
                log::Level::Trace => None,
            };
            let level_style =
                buf.default_level_style(record.level()).fg_color(level_color.map(anstyle::Color::Ansi));
            let location_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

            let file = record.file().map(short_file_name).unwrap_or("");
            let line = record.line().unwrap_or(0);
            let time = chrono::Local::now().format("%H:%M:%S");

            writeln!(
                buf,
                "{level_style}[{time}] {:<5}{level_style:#} {location_style}[{file}:{line}]{location_style:#} {}",
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info);

    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    // 测试或者多次初始化时，logger 已经存在，忽略即可
    let _ = builder.try_init();
}

/// 只保留文件名，兼容 windows 的路径分隔符
fn short_file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_file_name_strips_both_separators() {
        assert_eq!(short_file_name("src/frame/mod.rs"), "mod.rs");
        assert_eq!(short_file_name("src\\frame\\mod.rs"), "mod.rs");
        assert_eq!(short_file_name("lib.rs"), "lib.rs");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_log();
        init_log();
        log::info!("logger ready");
    }
}
