//! Модуль для отслеживания прогресса рендеринга
//!
//! Реализация паттерна Observer: наблюдатели получают уведомление при смене
//! этапа любого диалога. Диалоги рендерятся параллельно, поэтому состояние
//! хранится отдельно для каждого индекса.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Информация о прогрессе выполнения
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressInfo {
    /// Индекс диалога, к которому относится событие
    pub conversation: Option<usize>,
    /// Текущий этап
    pub step: String,
    /// Общий процент выполнения задания (0.0 - 100.0)
    pub total_progress: f32,
    /// Дополнительная информация
    pub details: Option<String>,
}

/// Трейт для наблюдателя, получающего уведомления о прогрессе
pub trait ProgressObserver: Send + Sync {
    fn on_progress_update(&self, progress: ProgressInfo);
}

/// Этапы рендеринга одного диалога
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStep {
    /// Распознавание слов и выравнивание предложений
    Aligning,
    /// Сборка дорожки с повторами
    BuildingTrack,
    /// Отрисовка кадров
    RenderingFrames,
    /// Кодирование клипа
    Encoding,
    /// Клип готов
    Done,
    /// Рендеринг диалога прерван ошибкой
    Failed,
}

impl RenderStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligning => "Выравнивание текста по аудио",
            Self::BuildingTrack => "Сборка аудиодорожки",
            Self::RenderingFrames => "Отрисовка кадров",
            Self::Encoding => "Кодирование клипа",
            Self::Done => "Готово",
            Self::Failed => "Ошибка",
        }
    }

    /// Доля работы (в процентах), выполненная к началу этапа.
    /// Упавший диалог больше не выполняется и считается завершённым.
    pub fn completed_weight(&self) -> f32 {
        match self {
            Self::Aligning => 0.0,
            Self::BuildingTrack => 25.0,
            Self::RenderingFrames => 50.0,
            Self::Encoding => 65.0,
            Self::Done | Self::Failed => 100.0,
        }
    }
}

/// Трекер прогресса для всего задания
#[derive(Default)]
pub struct ProgressTracker {
    observers: RwLock<HashMap<usize, Box<dyn ProgressObserver>>>,
    next_id: AtomicUsize,
    /// Текущий этап каждого диалога
    steps: RwLock<HashMap<usize, RenderStep>>,
    conversations: AtomicUsize,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавить наблюдателя; возвращает идентификатор для удаления
    pub fn add_observer(&self, observer: Box<dyn ProgressObserver>) -> usize {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().insert(id, observer);
        id
    }

    pub fn remove_observer(&self, id: usize) -> Option<Box<dyn ProgressObserver>> {
        self.observers.write().remove(&id)
    }

    /// Начать новое задание из `conversations` диалогов
    pub fn start(&self, conversations: usize) {
        self.steps.write().clear();
        self.conversations.store(conversations, Ordering::SeqCst);
        self.report(None, "Запуск", Some(format!("{} conversation(s)", conversations)));
    }

    /// Установить текущий этап диалога
    pub fn set_step(&self, conversation: usize, step: RenderStep) {
        self.steps.write().insert(conversation, step);
        self.report(Some(conversation), step.as_str(), None);
    }

    /// Отметить диалог как упавший
    pub fn fail(&self, conversation: usize, reason: impl Into<String>) {
        self.steps.write().insert(conversation, RenderStep::Failed);
        self.report(
            Some(conversation),
            RenderStep::Failed.as_str(),
            Some(reason.into()),
        );
    }

    /// Отметить завершение задания
    pub fn complete(&self, details: impl Into<String>) {
        let total = self.conversations.load(Ordering::SeqCst);
        {
            let mut steps = self.steps.write();
            for index in 0..total {
                steps.insert(index, RenderStep::Done);
            }
        }
        self.report(None, RenderStep::Done.as_str(), Some(details.into()));
    }

    /// Общий прогресс по всем диалогам
    pub fn total_progress(&self) -> f32 {
        let total = self.conversations.load(Ordering::SeqCst);
        if total == 0 {
            return 0.0;
        }
        let sum: f32 = self
            .steps
            .read()
            .values()
            .map(|step| step.completed_weight())
            .sum();
        (sum / total as f32).clamp(0.0, 100.0)
    }

    fn report(&self, conversation: Option<usize>, step: &str, details: Option<String>) {
        let progress = ProgressInfo {
            conversation,
            step: step.to_string(),
            total_progress: self.total_progress(),
            details,
        };
        for observer in self.observers.read().values() {
            observer.on_progress_update(progress.clone());
        }
    }
}

/// Наблюдатель, пишущий прогресс в лог
pub struct LogProgressObserver;

impl ProgressObserver for LogProgressObserver {
    fn on_progress_update(&self, progress: ProgressInfo) {
        match progress.conversation {
            Some(index) => log::info!(
                "[{:>5.1}%] conversation {}: {}{}",
                progress.total_progress,
                index + 1,
                progress.step,
                progress
                    .details
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default()
            ),
            None => log::info!(
                "[{:>5.1}%] {}{}",
                progress.total_progress,
                progress.step,
                progress
                    .details
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default()
            ),
        }
    }
}
