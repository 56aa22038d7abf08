//! Вспомогательные модули
//!
//! Запуск внешних процессов, повторы с задержкой, рабочие каталоги задач
//! и настройка логирования.

pub mod ffmpeg;
pub mod logger;
pub mod retry;
pub mod temp;
