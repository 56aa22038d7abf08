//! Модуль для работы с внешними процессами
//!
//! Каждый вызов возвращает [`ProcessOutput`] только при нулевом коде выхода;
//! иначе ошибка содержит код и перехваченный stderr. Stdout не сохраняется:
//! результат работы программ читается из файлов, которые они создают.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{DialogueVideoError, Result};

/// Результат успешного запуска внешнего процесса
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

/// Запуск внешней программы с проверкой кода выхода
pub fn run_process<I, S>(program: &str, args: I) -> Result<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            DialogueVideoError::Configuration(format!("Failed to start {}: {}", program, e))
        })?;

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    if !output.status.success() {
        return Err(DialogueVideoError::Process {
            program: program.to_string(),
            status: output.status,
            stderr: tail(&stderr, 20),
        });
    }

    log::trace!("{} finished: {}", program, tail(&stderr, 5));
    Ok(ProcessOutput {
        status: output.status,
        stderr,
    })
}

/// Запуск FFmpeg с проверкой, что выходной файл создан и не пуст
pub fn run_ffmpeg<I, S>(program: &str, args: I, expected_output: &Path) -> Result<ProcessOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    log::debug!("Running {} -> {}", program, expected_output.display());
    let output = run_process(program, args)?;
    ensure_output(expected_output)?;
    Ok(output)
}

/// Проверка, что файл существует и имеет ненулевой размер
pub fn ensure_output(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        _ => Err(DialogueVideoError::MissingOutput(path.to_path_buf())),
    }
}

/// Проверка наличия программы в PATH
pub fn check_tool_installed(program: &str) -> Result<PathBuf> {
    which::which(program).map_err(|_| {
        DialogueVideoError::Configuration(format!("{} was not found in PATH", program))
    })
}

/// Экранирование пути для файлов инструкций concat-демультиплексора
pub fn concat_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', "'\\''"))
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
