//! Cancellable tasks sharing one token.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A set of spawned tasks that are cancelled together.
///
/// The group's token is a child of the token it was created from, so
/// cancelling the parent cancels every task, while cancelling or dropping
/// the group leaves the parent untouched.
///
/// # Examples
///
/// ```
/// use tokio_util::sync::CancellationToken;
/// use lumen_recall::TaskGroup;
///
/// # #[tokio::main]
/// # async fn main() {
/// let parent = CancellationToken::new();
/// let group = TaskGroup::new(&parent);
/// let task = group.spawn(async { 21 * 2 });
/// assert_eq!(task.join().await, Some(42));
/// # }
/// ```
#[derive(Debug)]
pub struct TaskGroup {
    token: CancellationToken,
}

/// Handle to one task of a [`TaskGroup`].
#[derive(Debug)]
pub struct GroupTask<T> {
    handle: JoinHandle<Option<T>>,
}

impl TaskGroup {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
        }
    }

    /// The token observed by every task of the group.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Spawn `future`; it is dropped as soon as the group is cancelled.
    pub fn spawn<T, F>(&self, future: F) -> GroupTask<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let token = self.token.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                value = future => Some(value),
            }
        });
        GroupTask { handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> GroupTask<T> {
    /// Wait for the task. `None` when it was cancelled or panicked.
    pub async fn join(self) -> Option<T> {
        match self.handle.await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "recall task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn parent_cancellation_stops_tasks() {
        let parent = CancellationToken::new();
        let group = TaskGroup::new(&parent);
        let slow = group.spawn(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            1
        });
        let fast = group.spawn(async { 2 });
        assert_eq!(fast.join().await, Some(2));
        parent.cancel();
        assert_eq!(slow.join().await, None);
        assert!(group.is_cancelled());
    }

    #[tokio::test]
    async fn dropping_the_group_cancels_only_the_group() {
        let parent = CancellationToken::new();
        let task = {
            let group = TaskGroup::new(&parent);
            group.spawn(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
            })
        };
        assert_eq!(task.join().await, None);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn panics_join_as_none() {
        let parent = CancellationToken::new();
        let group = TaskGroup::new(&parent);
        let task = group.spawn(async {
            if true {
                panic!("boom");
            }
            0u8
        });
        assert_eq!(task.join().await, None);
    }
}
