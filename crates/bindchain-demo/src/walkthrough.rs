#![forbid(unsafe_code)]

//! Scripted two-object walkthrough.
//!
//! 1. Report both objects untouched.
//! 2. Assign the initial value to the source before any chain exists.
//! 3. Wire two chains from the source's `Id`:
//!    - `Id % 2`, distinct, written into the target's `Id` with a
//!      notification;
//!    - `Id` written silently into the target's `Age`.
//! 4. Assign each scripted value and report after every step.
//!
//! Every step records the change notifications observed on either object
//! while it ran.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use bindchain_core::{
    AsChangeChain, ChainError, ChainRegistry, ChangeListeners, StreamExt, SubscriptionHandle,
    Unsubscribe,
};
use serde::Serialize;
use tracing::{debug, info_span};

use crate::model::{Source, Target};

/// What happened right before a [`Step`] was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing yet.
    Initial,
    /// The source was assigned a value.
    Assign,
    /// The chains were wired.
    Chained,
}

/// Snapshot of both objects after one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    pub phase: Phase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned: Option<i32>,
    pub source_id: i32,
    pub target_id: i32,
    pub target_age: i32,
    /// Notifications seen during the step, as `"<object>.<field>"`.
    pub events: Vec<String>,
}

impl Step {
    /// One JSON object, no trailing newline.
    ///
    /// # Errors
    ///
    /// Whatever `serde_json` reports; a `Step` has no non-string map keys, so
    /// in practice this does not fail.
    pub fn to_jsonl(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.assigned) {
            (Phase::Initial, _) => writeln!(f, "--- untouched ---")?,
            (Phase::Chained, _) => writeln!(f, "--- chains wired ---")?,
            (Phase::Assign, Some(v)) => writeln!(f, "source.id <= {v}")?,
            (Phase::Assign, None) => writeln!(f, "source.id <= ?")?,
        }
        for event in &self.events {
            writeln!(f, "  {event} changed")?;
        }
        write!(
            f,
            "  source.id={} target.id={} target.age={}",
            self.source_id, self.target_id, self.target_age
        )
    }
}

/// Parameters for [`run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    /// Value assigned before the chains are wired.
    pub initial: i32,
    /// Values assigned afterwards, in order.
    pub values: Vec<i32>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            initial: 123,
            values: vec![1, 1, 2, 3, 5, 6, 7],
        }
    }
}

struct Stage {
    source: Rc<Source>,
    target: Rc<Target>,
    events: Rc<RefCell<Vec<String>>>,
    _watches: Vec<Unsubscribe>,
}

impl Stage {
    fn new() -> Result<Self, ChainError> {
        let source = Source::new();
        let target = Target::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let watches = vec![
            watch(source.listeners(), "source", &events)?,
            watch(target.listeners(), "target", &events)?,
        ];
        Ok(Self {
            source,
            target,
            events,
            _watches: watches,
        })
    }

    fn record(&self, phase: Phase, assigned: Option<i32>) -> Step {
        Step {
            phase,
            assigned,
            source_id: self.source.id(),
            target_id: self.target.id(),
            target_age: self.target.age(),
            events: self.events.borrow_mut().drain(..).collect(),
        }
    }
}

fn watch(
    listeners: &ChangeListeners,
    object: &'static str,
    events: &Rc<RefCell<Vec<String>>>,
) -> Result<Unsubscribe, ChainError> {
    let events: Weak<RefCell<Vec<String>>> = Rc::downgrade(events);
    listeners.subscribe(move |n| {
        if let Some(events) = events.upgrade() {
            events
                .borrow_mut()
                .push(format!("{object}.{}", n.field_name()));
        }
    })
}

/// Wire the two walkthrough chains from `chain` into `target`.
///
/// # Errors
///
/// Propagates field resolution failures; with the bundled model types this
/// does not happen.
pub fn wire(
    chain: &ChainRegistry<Source>,
    target: &Rc<Target>,
) -> Result<Vec<SubscriptionHandle>, ChainError> {
    let parity = chain
        .request_field_stream::<i32>("Id")?
        .map(|id: &i32| id % 2)
        .distinct_until_changed()
        .assign_and_raise_changed(target, "Id")?;
    let age = chain
        .request_field_stream::<i32>("Id")?
        .assign_to(target, "Age")?;
    Ok(vec![parity, age])
}

/// Run the walkthrough, calling `on_step` after every step.
///
/// # Errors
///
/// Any [`ChainError`] raised while wiring.
pub fn run(script: &Script, mut on_step: impl FnMut(&Step)) -> Result<Vec<Step>, ChainError> {
    let _span = info_span!("walkthrough", initial = script.initial, steps = script.values.len())
        .entered();
    let stage = Stage::new()?;
    let mut steps = Vec::with_capacity(script.values.len() + 3);
    let mut push = |step: Step| {
        on_step(&step);
        steps.push(step);
    };

    push(stage.record(Phase::Initial, None));

    stage.source.set_id(script.initial);
    push(stage.record(Phase::Assign, Some(script.initial)));

    let chain = stage.source.change_chain()?;
    let _sinks = wire(&chain, &stage.target)?;
    debug!(entries = chain.entry_count(), "walkthrough chains wired");
    push(stage.record(Phase::Chained, None));

    for &value in &script.values {
        stage.source.set_id(value);
        push(stage.record(Phase::Assign, Some(value)));
    }

    chain.dispose();
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    fn default_script_matches_parity_chain() {
        let steps = run(&Script::default(), |_| {}).unwrap();
        assert_eq!(steps.len(), 10);

        let before: Vec<_> = steps[..3]
            .iter()
            .map(|s| (s.phase, s.source_id, s.target_id, s.target_age))
            .collect();
        assert_eq!(
            before,
            vec![
                (Phase::Initial, 0, 0, 0),
                (Phase::Assign, 123, 0, 0),
                (Phase::Chained, 123, 1, 123),
            ]
        );
        assert_eq!(steps[1].events, vec!["source.Id"]);
        assert_eq!(steps[2].events, vec!["target.Id"]);

        let ids: Vec<i32> = steps[3..].iter().map(|s| s.target_id).collect();
        let ages: Vec<i32> = steps[3..].iter().map(|s| s.target_age).collect();
        assert_eq!(ids, vec![1, 1, 0, 1, 1, 0, 1]);
        assert_eq!(ages, vec![1, 1, 2, 3, 5, 6, 7]);
    }

    #[test]
    fn repeated_value_raises_nothing() {
        let steps = run(&Script::default(), |_| {}).unwrap();
        // Second assignment of 1.
        assert!(steps[4].events.is_empty());
        // 2 flips the parity.
        assert_eq!(steps[5].events, vec!["source.Id", "target.Id"]);
        // 5 after 3 changes the source but not the parity.
        assert_eq!(steps[7].events, vec!["source.Id"]);
    }

    #[test]
    fn on_step_sees_every_step_in_order() {
        let mut phases = Vec::new();
        let steps = run(
            &Script {
                initial: 4,
                values: vec![9],
            },
            |s| phases.push(s.phase),
        )
        .unwrap();
        assert_eq!(
            phases,
            vec![Phase::Initial, Phase::Assign, Phase::Chained, Phase::Assign]
        );
        assert_eq!(steps.last().map(|s| s.target_id), Some(1));
    }

    #[test]
    fn display_lists_events_and_state() {
        let step = Step {
            phase: Phase::Assign,
            assigned: Some(2),
            source_id: 2,
            target_id: 0,
            target_age: 2,
            events: vec!["source.Id".into(), "target.Id".into()],
        };
        assert_eq!(
            step.to_string(),
            "source.id <= 2\n  source.Id changed\n  target.Id changed\n  \
             source.id=2 target.id=0 target.age=2"
        );
    }

    #[test]
    fn jsonl_omits_missing_assignment() {
        let step = Step {
            phase: Phase::Initial,
            assigned: None,
            source_id: 0,
            target_id: 0,
            target_age: 0,
            events: Vec::new(),
        };
        let line = step.to_jsonl().unwrap();
        assert_eq!(
            line,
            r#"{"phase":"initial","source_id":0,"target_id":0,"target_age":0,"events":[]}"#
        );
    }

    #[traced_test]
    #[test]
    fn wiring_is_logged() {
        run(&Script::default(), |_| {}).unwrap();
        assert!(logs_contain("walkthrough chains wired"));
    }
}
