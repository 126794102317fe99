//! Phase ordering for a single TDD cycle.
//!
//! The pipeline is a fixed sequence, but each transition is still checked
//! against an explicit table so a step can never run before the artifact it
//! consumes exists. Artifacts are recorded separately from events, once the
//! file is actually on disk.

use serde::{Deserialize, Serialize};

/// Where a task currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Pending,
    Stub,
    Red,
    Green,
    Done,
}

/// What just happened, driving the next transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Start the cycle.
    Begin,
    /// The stub file was written.
    StubWritten,
    /// The test file was written.
    TestsWritten,
    /// The implementation was written over the stub.
    ImplementationWritten,
}

/// A file one of the steps produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Stub,
    Tests,
    Implementation,
}

/// Artifacts produced so far, consulted by transition guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub stub: bool,
    pub tests: bool,
    pub implementation: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("no transition from {from:?} on {event:?}")]
    IllegalTransition { from: Phase, event: PhaseEvent },
    #[error("cannot leave {from:?} on {event:?}: required artifact missing")]
    GuardRejected { from: Phase, event: PhaseEvent },
}

struct Transition {
    from: Phase,
    event: PhaseEvent,
    to: Phase,
    guard: fn(&Artifacts) -> bool,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        from: Phase::Pending,
        event: PhaseEvent::Begin,
        to: Phase::Stub,
        guard: |_| true,
    },
    Transition {
        from: Phase::Stub,
        event: PhaseEvent::StubWritten,
        to: Phase::Red,
        guard: |a| a.stub,
    },
    Transition {
        from: Phase::Red,
        event: PhaseEvent::TestsWritten,
        to: Phase::Green,
        guard: |a| a.stub && a.tests,
    },
    Transition {
        from: Phase::Green,
        event: PhaseEvent::ImplementationWritten,
        to: Phase::Done,
        guard: |a| a.tests && a.implementation,
    },
];

/// Phases reachable from `from` by any event, ignoring guards.
pub fn allowed_transitions(from: Phase) -> Vec<Phase> {
    TRANSITIONS
        .iter()
        .filter(|t| t.from == from)
        .map(|t| t.to)
        .collect()
}

/// Tracks the current phase and the artifacts recorded along the way.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: Phase,
    artifacts: Artifacts,
    history: Vec<Phase>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            current: Phase::Pending,
            artifacts: Artifacts::default(),
            history: vec![Phase::Pending],
        }
    }
}

impl PhaseMachine {
    pub fn current(&self) -> Phase {
        self.current
    }

    /// Phases entered so far, starting with `Pending`.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn artifacts(&self) -> Artifacts {
        self.artifacts
    }

    /// Note that `artifact` has been written.
    pub fn record(&mut self, artifact: Artifact) {
        match artifact {
            Artifact::Stub => self.artifacts.stub = true,
            Artifact::Tests => self.artifacts.tests = true,
            Artifact::Implementation => self.artifacts.implementation = true,
        }
    }

    /// Advance on `event` if the transition exists and its guard holds.
    pub fn fire(&mut self, event: PhaseEvent) -> Result<Phase, PhaseError> {
        let transition = TRANSITIONS
            .iter()
            .find(|t| t.from == self.current && t.event == event)
            .ok_or(PhaseError::IllegalTransition {
                from: self.current,
                event,
            })?;

        if !(transition.guard)(&self.artifacts) {
            return Err(PhaseError::GuardRejected {
                from: self.current,
                event,
            });
        }

        self.current = transition.to;
        self.history.push(transition.to);
        Ok(transition.to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_runs_stub_red_green() {
        let mut machine = PhaseMachine::default();
        machine.fire(PhaseEvent::Begin).expect("begin");
        machine.record(Artifact::Stub);
        machine.fire(PhaseEvent::StubWritten).expect("stub");
        machine.record(Artifact::Tests);
        machine.fire(PhaseEvent::TestsWritten).expect("red");
        machine.record(Artifact::Implementation);
        machine
            .fire(PhaseEvent::ImplementationWritten)
            .expect("green");

        assert_eq!(machine.current(), Phase::Done);
        assert_eq!(
            machine.history(),
            [
                Phase::Pending,
                Phase::Stub,
                Phase::Red,
                Phase::Green,
                Phase::Done
            ]
        );
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut machine = PhaseMachine::default();
        machine.fire(PhaseEvent::Begin).expect("begin");

        let err = machine
            .fire(PhaseEvent::TestsWritten)
            .expect_err("red before stub");
        assert_eq!(
            err,
            PhaseError::IllegalTransition {
                from: Phase::Stub,
                event: PhaseEvent::TestsWritten
            }
        );
        assert_eq!(machine.current(), Phase::Stub);
    }

    /// Verifies an event is refused until its artifact has been recorded.
    #[test]
    fn missing_artifact_is_rejected_by_guard() {
        let mut machine = PhaseMachine::default();
        machine.fire(PhaseEvent::Begin).expect("begin");

        let err = machine
            .fire(PhaseEvent::StubWritten)
            .expect_err("no stub recorded");
        assert_eq!(
            err,
            PhaseError::GuardRejected {
                from: Phase::Stub,
                event: PhaseEvent::StubWritten
            }
        );
        assert_eq!(machine.current(), Phase::Stub);

        machine.record(Artifact::Stub);
        machine.fire(PhaseEvent::StubWritten).expect("stub");
        machine.record(Artifact::Implementation);
        let err = machine
            .fire(PhaseEvent::TestsWritten)
            .expect_err("tests not recorded");
        assert!(matches!(err, PhaseError::GuardRejected { from: Phase::Red, .. }));
        assert!(!machine.artifacts().tests);
    }

    #[test]
    fn done_is_terminal() {
        assert!(allowed_transitions(Phase::Done).is_empty());
        assert_eq!(allowed_transitions(Phase::Pending), [Phase::Stub]);
        assert_eq!(allowed_transitions(Phase::Red), [Phase::Green]);
    }

    #[test]
    fn every_phase_has_at_most_one_successor() {
        for phase in [
            Phase::Pending,
            Phase::Stub,
            Phase::Red,
            Phase::Green,
            Phase::Done,
        ] {
            assert!(allowed_transitions(phase).len() <= 1, "{phase:?}");
        }
    }
}
