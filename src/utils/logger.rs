use std::io::Write;

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Инициализация логгера для консольного приложения.
///
/// `verbose` включает DEBUG-сообщения библиотеки; RUST_LOG имеет приоритет.
pub fn init_logger(verbose: bool) {
    let default_filter = if verbose {
        "warn,dialogue_video=debug"
    } else {
        "warn,dialogue_video=info"
    };
    let env = Env::default().filter_or("RUST_LOG", default_filter);

    let mut builder = Builder::from_env(env);
    builder
        // Декодеры изображений слишком разговорчивы
        .filter_module("png", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr);

    // Повторная инициализация (например, из тестов) не является ошибкой
    let _ = builder.try_init();
}
