use serde::Serialize;

use vidseek_core::types::SegmentId;

/// A committed segment waiting for its vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddingTask {
    pub id: SegmentId,
    pub text: String,
}

/// Run-wide backlog of segments to embed, in commit order.
#[derive(Debug, Default)]
pub struct EmbeddingQueue {
    tasks: Vec<EmbeddingTask>,
}

impl EmbeddingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: EmbeddingTask) {
        self.tasks.push(task);
    }

    pub fn extend(&mut self, tasks: impl IntoIterator<Item = EmbeddingTask>) {
        self.tasks.extend(tasks);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[EmbeddingTask] {
        &self.tasks
    }
}

impl FromIterator<EmbeddingTask> for EmbeddingQueue {
    fn from_iter<I: IntoIterator<Item = EmbeddingTask>>(iter: I) -> Self {
        Self { tasks: iter.into_iter().collect() }
    }
}
