//! Background tasks: question workers and timers
//!
//! Every background task goes through one [`TaskRegistry`] so the process
//! can see what is running, reap finished work and stop everything on
//! shutdown. Question workers share a small pool of permits; timers do not.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use crate::Result;
use crate::answer::AnswerService;
use crate::events::{Event, PresentationSink};
use crate::translate::Translator;
use crate::voice::Speech;

/// Kind of background task, used for labels and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Question,
    Timer,
}

impl TaskKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Timer => "timer",
        }
    }
}

#[derive(Default)]
struct Tasks {
    set: JoinSet<()>,
    labels: HashMap<Id, String>,
}

/// Tracks background tasks spawned on one runtime
///
/// Tasks may be registered from any thread; they always run on the
/// runtime whose handle the registry was created with.
pub struct TaskRegistry {
    handle: Handle,
    tasks: Mutex<Tasks>,
    question_slots: Arc<Semaphore>,
}

impl TaskRegistry {
    /// Create a registry spawning onto `handle`
    ///
    /// At most `max_questions` question workers run at once (minimum 1).
    #[must_use]
    pub fn new(handle: Handle, max_questions: usize) -> Self {
        Self {
            handle,
            tasks: Mutex::new(Tasks::default()),
            question_slots: Arc::new(Semaphore::new(max_questions.max(1))),
        }
    }

    /// Create a registry on the current runtime
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime
    #[must_use]
    pub fn current(max_questions: usize) -> Self {
        Self::new(Handle::current(), max_questions)
    }

    /// Register a task; its error, if any, is logged with the task label
    ///
    /// Returns the task label.
    pub fn spawn<F>(&self, kind: TaskKind, future: F) -> String
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.reap();

        let label = format!("{}-{}", kind.prefix(), uuid::Uuid::new_v4().as_simple());
        let task_label = label.clone();
        let slots = (kind == TaskKind::Question).then(|| Arc::clone(&self.question_slots));

        let task = async move {
            // Held until the task finishes
            let _permit = match slots {
                Some(slots) => match slots.acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => return,
                },
                None => None,
            };

            tracing::debug!(task = %task_label, "task started");
            if let Err(e) = future.await {
                tracing::error!(task = %task_label, error = %e, "task failed");
            }
        };

        match self.tasks.lock() {
            Ok(mut tasks) => {
                let abort = tasks.set.spawn_on(task, &self.handle);
                tasks.labels.insert(abort.id(), label.clone());
            }
            Err(_) => tracing::error!(task = %label, "task registry poisoned, task dropped"),
        }

        label
    }

    /// Register a timer task
    pub fn spawn_timer<F>(&self, future: F) -> String
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.spawn(TaskKind::Timer, future)
    }

    /// Register a question worker, queued behind the concurrency limit
    pub fn spawn_question<F>(&self, future: F) -> String
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.spawn(TaskKind::Question, future)
    }

    /// Collect finished tasks, logging panics; returns how many were reaped
    pub fn reap(&self) -> usize {
        let Ok(mut tasks) = self.tasks.lock() else {
            return 0;
        };

        let mut reaped = 0;
        while let Some(result) = tasks.set.try_join_next_with_id() {
            reaped += 1;
            match result {
                Ok((id, ())) => {
                    tasks.labels.remove(&id);
                }
                Err(e) => {
                    let label = tasks.labels.remove(&e.id()).unwrap_or_default();
                    if e.is_panic() {
                        tracing::error!(task = %label, "task panicked");
                    } else {
                        tracing::debug!(task = %label, "task cancelled");
                    }
                }
            }
        }
        reaped
    }

    /// Number of registered tasks not yet reaped
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.set.len()).unwrap_or_default()
    }

    /// Whether no task is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of registered tasks
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.tasks
            .lock()
            .map(|t| t.labels.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Wait for every registered task to finish on its own
    ///
    /// Tasks registered while draining are not waited for.
    pub async fn drain(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => return,
        };

        while let Some(result) = tasks.set.join_next_with_id().await {
            if let Err(e) = result
                && e.is_panic()
            {
                let label = tasks.labels.remove(&e.id()).unwrap_or_default();
                tracing::error!(task = %label, "task panicked");
            }
        }
    }

    /// Abort every task and wait for them to finish
    pub async fn shutdown(&self) {
        let mut tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => return,
        };

        let count = tasks.set.len();
        tasks.set.abort_all();
        while tasks.set.join_next().await.is_some() {}

        tracing::debug!(count, "background tasks stopped");
    }
}

/// Answers typed questions in the background
///
/// Each submission is independent; replies are shown and spoken in the
/// order their workers finish.
#[derive(Clone)]
pub struct QuestionWorker {
    sink: Arc<dyn PresentationSink>,
    speech: Arc<dyn Speech>,
    translator: Arc<dyn Translator>,
    answers: Arc<AnswerService>,
}

impl QuestionWorker {
    #[must_use]
    pub fn new(
        sink: Arc<dyn PresentationSink>,
        speech: Arc<dyn Speech>,
        translator: Arc<dyn Translator>,
        answers: Arc<AnswerService>,
    ) -> Self {
        Self {
            sink,
            speech,
            translator,
            answers,
        }
    }

    /// Show the question, answer it, show and speak the reply
    pub async fn run(&self, question: &str) -> String {
        self.sink.emit(Event::user(question));

        let translated = self.translator.translate(question).await;
        tracing::debug!(question, translated = %translated, "answering question");

        let reply = self.answers.answer(&translated).await;
        self.sink.emit(Event::reply(reply.clone()));
        self.speech.speak(&reply).await;
        reply
    }

    /// Run a question on the registry; blank input is ignored
    pub fn submit(&self, tasks: &TaskRegistry, question: &str) -> Option<String> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        let worker = self.clone();
        let question = question.to_string();
        Some(tasks.spawn_question(async move {
            worker.run(&question).await;
            Ok(())
        }))
    }
}
