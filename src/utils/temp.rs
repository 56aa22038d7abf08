//! Модуль для работы с временными файлами
//!
//! Каждая задача рендеринга получает собственный рабочий каталог. Каталог
//! удаляется вместе со всем содержимым при уничтожении объекта.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// Рабочий каталог одной задачи
pub struct TaskWorkspace {
    /// Временная директория
    dir: TempDir,
}

impl TaskWorkspace {
    /// Создать рабочий каталог внутри `parent`
    pub fn new_in(parent: &Path, label: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{}-", label))
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    /// Путь для нового файла с уникальным именем (сам файл не создаётся)
    pub fn file_path(&self, prefix: &str, extension: &str) -> PathBuf {
        let file_name = format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), extension);
        self.dir.path().join(file_name)
    }

    /// Получить путь к рабочему каталогу
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Удалить каталог, сообщив об ошибке удаления
    pub fn close(self) -> Result<()> {
        self.dir.close()?;
        Ok(())
    }
}
