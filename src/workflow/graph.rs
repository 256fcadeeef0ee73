//! Workflow Graph
//!
//! A small directed-graph engine: named steps, unconditional and conditional
//! edges, one entry step and one or more terminal steps. Steps run strictly one
//! after another; each returns a patch that is merged into the state before the
//! next transition is chosen.

use crate::error::{AgentError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// State that can be threaded through a `WorkflowGraph`.
pub trait GraphState: Send + Sync {
    type Patch: Send;

    fn apply(&mut self, patch: Self::Patch);
}

#[async_trait]
pub trait Step<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S) -> Result<S::Patch>;
}

/// Adapter for steps that are plain synchronous functions of the state.
pub struct FnStep<F>(pub F);

#[async_trait]
impl<S, F> Step<S> for FnStep<F>
where
    S: GraphState,
    F: Fn(&S) -> Result<S::Patch> + Send + Sync,
{
    async fn run(&self, state: &S) -> Result<S::Patch> {
        (self.0)(state)
    }
}

/// Decision function evaluated against the merged state.
pub type Predicate<S> = fn(&S) -> bool;

enum Transition<S> {
    Next(String),
    Branch {
        predicate: Predicate<S>,
        on_true: String,
        on_false: String,
    },
}

pub struct WorkflowGraph<S: GraphState> {
    steps: HashMap<String, Arc<dyn Step<S>>>,
    transitions: HashMap<String, Transition<S>>,
    entry: Option<String>,
    terminals: HashSet<String>,
}

impl<S: GraphState> Default for WorkflowGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> WorkflowGraph<S> {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            transitions: HashMap::new(),
            entry: None,
            terminals: HashSet::new(),
        }
    }

    pub fn register<T>(&mut self, name: impl Into<String>, step: T) -> &mut Self
    where
        T: Step<S> + 'static,
    {
        self.steps.insert(name.into(), Arc::new(step));
        self
    }

    pub fn edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        self.transitions.insert(from.into(), Transition::Next(to.into()));
        self
    }

    pub fn conditional_edge(
        &mut self,
        from: impl Into<String>,
        predicate: Predicate<S>,
        on_true: impl Into<String>,
        on_false: impl Into<String>,
    ) -> &mut Self {
        self.transitions.insert(
            from.into(),
            Transition::Branch {
                predicate,
                on_true: on_true.into(),
                on_false: on_false.into(),
            },
        );
        self
    }

    pub fn set_entry(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry = Some(name.into());
        self
    }

    pub fn set_terminal(&mut self, name: impl Into<String>) -> &mut Self {
        self.terminals.insert(name.into());
        self
    }

    /// Check that every referenced step exists and every non-terminal step can move on.
    pub fn validate(&self) -> Result<()> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| AgentError::Graph("no entry step declared".to_string()))?;
        self.require_step(entry)?;

        if self.terminals.is_empty() {
            return Err(AgentError::Graph("no terminal step declared".to_string()));
        }
        for terminal in &self.terminals {
            self.require_step(terminal)?;
        }

        for (from, transition) in &self.transitions {
            self.require_step(from)?;
            match transition {
                Transition::Next(to) => self.require_step(to)?,
                Transition::Branch { on_true, on_false, .. } => {
                    self.require_step(on_true)?;
                    self.require_step(on_false)?;
                }
            }
        }

        for name in self.steps.keys() {
            if !self.terminals.contains(name) && !self.transitions.contains_key(name) {
                return Err(AgentError::Graph(format!(
                    "step '{}' has no outgoing edge and is not terminal",
                    name
                )));
            }
        }
        Ok(())
    }

    fn require_step(&self, name: &str) -> Result<()> {
        if self.steps.contains_key(name) {
            Ok(())
        } else {
            Err(AgentError::Graph(format!("unknown step '{}'", name)))
        }
    }

    /// Run from the entry step until a terminal step completes.
    pub async fn run(&self, state: S, max_steps: usize) -> Result<S> {
        self.run_traced(state, max_steps).await.map(|(state, _)| state)
    }

    /// Like `run`, also returning the names of the steps in execution order.
    pub async fn run_traced(&self, mut state: S, max_steps: usize) -> Result<(S, Vec<String>)> {
        self.validate()?;

        let mut current = self.entry.clone().unwrap_or_default();
        let mut path: Vec<String> = Vec::new();

        loop {
            if path.len() >= max_steps {
                return Err(AgentError::ExecutorExhausted { max_steps });
            }

            let step = self
                .steps
                .get(&current)
                .ok_or_else(|| AgentError::Graph(format!("unknown step '{}'", current)))?;

            debug!(step = %current, index = path.len(), "Running workflow step");
            let patch = step
                .run(&state)
                .await
                .map_err(|e| AgentError::step_failed(current.clone(), e))?;
            state.apply(patch);
            path.push(current.clone());

            if self.terminals.contains(&current) {
                return Ok((state, path));
            }

            current = match self.transitions.get(&current) {
                Some(Transition::Next(to)) => to.clone(),
                Some(Transition::Branch {
                    predicate,
                    on_true,
                    on_false,
                }) => {
                    if predicate(&state) {
                        on_true.clone()
                    } else {
                        on_false.clone()
                    }
                }
                None => {
                    return Err(AgentError::Graph(format!(
                        "step '{}' has no outgoing edge and is not terminal",
                        current
                    )))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct Counter {
        value: u32,
        log: Vec<&'static str>,
    }

    struct Add(u32, &'static str);

    impl GraphState for Counter {
        type Patch = Add;

        fn apply(&mut self, patch: Add) {
            self.value += patch.0;
            self.log.push(patch.1);
        }
    }

    fn below_three(state: &Counter) -> bool {
        state.value < 3
    }

    fn looping_graph() -> WorkflowGraph<Counter> {
        let mut graph = WorkflowGraph::new();
        graph
            .register("start", FnStep(|_: &Counter| Ok(Add(0, "start"))))
            .register("inc", FnStep(|_: &Counter| Ok(Add(1, "inc"))))
            .register("done", FnStep(|_: &Counter| Ok(Add(0, "done"))))
            .edge("start", "inc")
            .conditional_edge("inc", below_three, "inc", "done")
            .set_entry("start")
            .set_terminal("done");
        graph
    }

    #[tokio::test]
    async fn test_conditional_loop_runs_to_terminal() {
        let graph = looping_graph();
        let (state, path) = graph.run_traced(Counter::default(), 20).await.unwrap();

        assert_eq!(state.value, 3);
        assert_eq!(path, vec!["start", "inc", "inc", "inc", "done"]);
        assert_eq!(state.log, vec!["start", "inc", "inc", "inc", "done"]);
    }

    #[tokio::test]
    async fn test_step_bound_enforced() {
        let mut graph: WorkflowGraph<Counter> = WorkflowGraph::new();
        graph
            .register("spin", FnStep(|_: &Counter| Ok(Add(1, "spin"))))
            .register("never", FnStep(|_: &Counter| Ok(Add(0, "never"))))
            .edge("spin", "spin")
            .set_entry("spin")
            .set_terminal("never");

        let err = graph.run(Counter::default(), 5).await.unwrap_err();
        assert!(matches!(err, AgentError::ExecutorExhausted { max_steps: 5 }));
    }

    #[tokio::test]
    async fn test_bound_counts_terminal_step() {
        let graph = looping_graph();
        // start, inc x3, done = 5 steps
        assert!(graph.run(Counter::default(), 5).await.is_ok());
        assert!(graph.run(Counter::default(), 4).await.is_err());
    }

    #[tokio::test]
    async fn test_step_failure_is_tagged_and_stops_run() {
        let mut graph: WorkflowGraph<Counter> = WorkflowGraph::new();
        graph
            .register("ok", FnStep(|_: &Counter| Ok(Add(1, "ok"))))
            .register(
                "boom",
                FnStep(|_: &Counter| Err(AgentError::Llm("service unavailable".to_string()))),
            )
            .register("end", FnStep(|_: &Counter| Ok(Add(0, "end"))))
            .edge("ok", "boom")
            .edge("boom", "end")
            .set_entry("ok")
            .set_terminal("end");

        let err = graph.run(Counter::default(), 10).await.unwrap_err();
        assert_eq!(err.failed_step(), Some("boom"));
        assert!(matches!(err.root_cause(), AgentError::Llm(_)));
    }

    #[test]
    fn test_validate_rejects_unknown_target() {
        let mut graph: WorkflowGraph<Counter> = WorkflowGraph::new();
        graph
            .register("a", FnStep(|_: &Counter| Ok(Add(0, "a"))))
            .edge("a", "missing")
            .set_entry("a")
            .set_terminal("a");

        assert!(matches!(graph.validate(), Err(AgentError::Graph(_))));
    }

    #[test]
    fn test_validate_rejects_dead_end() {
        let mut graph: WorkflowGraph<Counter> = WorkflowGraph::new();
        graph
            .register("a", FnStep(|_: &Counter| Ok(Add(0, "a"))))
            .register("b", FnStep(|_: &Counter| Ok(Add(0, "b"))))
            .register("c", FnStep(|_: &Counter| Ok(Add(0, "c"))))
            .edge("a", "b")
            .set_entry("a")
            .set_terminal("c");

        assert!(matches!(graph.validate(), Err(AgentError::Graph(m)) if m.contains("'b'")));
    }

    #[test]
    fn test_validate_requires_entry() {
        let graph: WorkflowGraph<Counter> = WorkflowGraph::new();
        assert!(graph.validate().is_err());
    }
}
