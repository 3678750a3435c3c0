//! Per-run shared state
//!
//! Values are addressed through typed [`ContextKey`]s instead of raw strings, so
//! each fan-out branch owns a distinct, compile-time named slot. Counters back
//! the fan-in guards. One Context belongs to exactly one run; parent runs and
//! their sub-workflow runs never share it.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

/// Typed address of a Context value
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> std::fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

#[derive(Default)]
struct ContextState {
    values: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
    counters: HashMap<String, usize>,
    expected: HashMap<String, usize>,
    released: HashSet<String>,
}

/// Handle to a run's mutable key/value store and completion counters
#[derive(Clone)]
pub struct Context {
    id: Uuid,
    state: Arc<RwLock<ContextState>>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(RwLock::new(ContextState::default())),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn set<T>(&self, key: &ContextKey<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.state.write().await.values.insert(key.name, Box::new(value));
    }

    pub async fn get<T>(&self, key: &ContextKey<T>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.state
            .read()
            .await
            .values
            .get(key.name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub async fn contains<T>(&self, key: &ContextKey<T>) -> bool {
        self.state.read().await.values.contains_key(key.name)
    }

    /// Read-modify-write a value under a single lock acquisition.
    pub async fn update<T, F>(&self, key: &ContextKey<T>, f: F)
    where
        T: Default + Send + Sync + 'static,
        F: FnOnce(&mut T),
    {
        let mut state = self.state.write().await;
        let slot = state
            .values
            .entry(key.name)
            .or_insert_with(|| Box::new(T::default()));

        match slot.downcast_mut::<T>() {
            Some(value) => f(value),
            None => {
                // A different type already lives under this name; replace it
                tracing::warn!("[CONTEXT] Type mismatch for key '{}', resetting", key.name);
                let mut value = T::default();
                f(&mut value);
                *slot = Box::new(value);
            }
        }
    }

    /// Increment a named counter and return the new value.
    pub async fn increment(&self, counter: &str) -> usize {
        let mut state = self.state.write().await;
        let value = state.counters.entry(counter.to_string()).or_insert(0);
        *value += 1;
        *value
    }

    pub async fn counter(&self, counter: &str) -> usize {
        self.state
            .read()
            .await
            .counters
            .get(counter)
            .copied()
            .unwrap_or(0)
    }

    /// Record how many sibling completions a guard should wait for.
    pub async fn expect_completions(&self, guard: &str, count: usize) {
        self.state
            .write()
            .await
            .expected
            .insert(guard.to_string(), count);
    }

    pub async fn expected_completions(&self, guard: &str) -> Option<usize> {
        self.state.read().await.expected.get(guard).copied()
    }

    /// Release a guard exactly once: returns the completion count if the counter
    /// has reached `required` and the guard was not released before.
    pub async fn try_release(&self, guard: &str, required: usize) -> Option<usize> {
        let mut state = self.state.write().await;
        let completed = state.counters.get(guard).copied().unwrap_or(0);
        if completed < required || state.released.contains(guard) {
            return None;
        }
        state.released.insert(guard.to_string());
        Some(completed)
    }

    pub async fn is_released(&self, guard: &str) -> bool {
        self.state.read().await.released.contains(guard)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK: ContextKey<String> = ContextKey::new("task");
    const HISTORY: ContextKey<Vec<String>> = ContextKey::new("history");

    #[tokio::test]
    async fn test_typed_values_round_trip() {
        let ctx = Context::new();
        assert_eq!(ctx.get(&TASK).await, None);

        ctx.set(&TASK, "electric vehicles".to_string()).await;
        assert_eq!(ctx.get(&TASK).await.as_deref(), Some("electric vehicles"));
        assert!(ctx.contains(&TASK).await);
    }

    #[tokio::test]
    async fn test_update_appends_in_place() {
        let ctx = Context::new();
        ctx.update(&HISTORY, |h| h.push("first".to_string())).await;
        ctx.update(&HISTORY, |h| h.push("second".to_string())).await;

        assert_eq!(
            ctx.get(&HISTORY).await.unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[tokio::test]
    async fn test_release_happens_once() {
        let ctx = Context::new();
        assert_eq!(ctx.try_release("slides_completed", 2).await, None);

        ctx.increment("slides_completed").await;
        assert_eq!(ctx.try_release("slides_completed", 2).await, None);

        assert_eq!(ctx.increment("slides_completed").await, 2);
        assert_eq!(ctx.try_release("slides_completed", 2).await, Some(2));
        assert_eq!(ctx.try_release("slides_completed", 2).await, None);
        assert!(ctx.is_released("slides_completed").await);
    }

    #[tokio::test]
    async fn test_contexts_are_independent() {
        let parent = Context::new();
        let child = Context::new();
        parent.set(&TASK, "parent".to_string()).await;

        assert_eq!(child.get(&TASK).await, None);
        assert_ne!(parent.id(), child.id());
    }
}
