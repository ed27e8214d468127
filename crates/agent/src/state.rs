//! Turn state machine.
//!
//! ```text
//! Idle → BuildingContext → AwaitingInference → ParsingPlan → ExecutingActions
//!                               ↑                                  │
//!                               └──────────── Continue ◄───────────┤
//!                                                                  ├─► Done
//!                                                                  └─► Aborted
//! ```
//!
//! `TurnState::next` is pure: the agent loop feeds it events and acts on the
//! state it gets back, so every transition is testable without an endpoint.

use deo_config::LoopMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    BuildingContext,
    AwaitingInference,
    ParsingPlan,
    ExecutingActions,
    Continue,
    Done,
    Aborted,
}

/// What just happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    Submit,
    ContextBuilt,
    ResponseReceived,
    TransportFailed,
    PlanAccepted,
    /// `budget_left`: another inference round is allowed.
    PlanRejected { budget_left: bool },
    ActionsApplied {
        done_signalled: bool,
        budget_left: bool,
        fatal: bool,
    },
    NextRound,
}

impl TurnState {
    /// The state after `event`, or `None` if `event` is not valid here.
    pub fn next(self, event: TurnEvent, mode: LoopMode) -> Option<TurnState> {
        use TurnEvent as E;
        use TurnState as S;

        let next = match (self, event) {
            (S::Idle, E::Submit) => S::BuildingContext,
            (S::BuildingContext, E::ContextBuilt) => S::AwaitingInference,
            (S::AwaitingInference, E::ResponseReceived) => S::ParsingPlan,
            (S::AwaitingInference, E::TransportFailed) => S::Aborted,
            (S::ParsingPlan, E::PlanAccepted) => S::ExecutingActions,
            (S::ParsingPlan, E::PlanRejected { budget_left }) => match mode {
                LoopMode::SingleShot => S::Aborted,
                LoopMode::Iterative if budget_left => S::Continue,
                LoopMode::Iterative => S::Done,
            },
            (
                S::ExecutingActions,
                E::ActionsApplied {
                    done_signalled,
                    budget_left,
                    fatal,
                },
            ) => {
                if fatal {
                    S::Aborted
                } else if mode == LoopMode::SingleShot || done_signalled || !budget_left {
                    S::Done
                } else {
                    S::Continue
                }
            }
            (S::Continue, E::NextRound) => S::AwaitingInference,
            _ => return None,
        };
        Some(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IT: LoopMode = LoopMode::Iterative;
    const SS: LoopMode = LoopMode::SingleShot;

    #[test]
    fn happy_path_single_shot() {
        let mut s = TurnState::Idle;
        for event in [
            TurnEvent::Submit,
            TurnEvent::ContextBuilt,
            TurnEvent::ResponseReceived,
            TurnEvent::PlanAccepted,
        ] {
            s = s.next(event, SS).unwrap();
        }
        assert_eq!(s, TurnState::ExecutingActions);

        let end = s
            .next(
                TurnEvent::ActionsApplied {
                    done_signalled: false,
                    budget_left: true,
                    fatal: false,
                },
                SS,
            )
            .unwrap();
        assert_eq!(end, TurnState::Done);
        assert!(end.is_terminal());
    }

    #[test]
    fn iterative_continues_until_done_or_budget() {
        let applied = |done_signalled, budget_left| TurnEvent::ActionsApplied {
            done_signalled,
            budget_left,
            fatal: false,
        };
        let s = TurnState::ExecutingActions;
        assert_eq!(s.next(applied(false, true), IT), Some(TurnState::Continue));
        assert_eq!(s.next(applied(true, true), IT), Some(TurnState::Done));
        assert_eq!(s.next(applied(false, false), IT), Some(TurnState::Done));
        assert_eq!(
            TurnState::Continue.next(TurnEvent::NextRound, IT),
            Some(TurnState::AwaitingInference)
        );
    }

    #[test]
    fn transport_failure_aborts_in_both_modes() {
        for mode in [IT, SS] {
            assert_eq!(
                TurnState::AwaitingInference.next(TurnEvent::TransportFailed, mode),
                Some(TurnState::Aborted)
            );
        }
    }

    #[test]
    fn parse_failure_depends_on_mode() {
        let rejected = |budget_left| TurnEvent::PlanRejected { budget_left };
        let s = TurnState::ParsingPlan;
        assert_eq!(s.next(rejected(true), IT), Some(TurnState::Continue));
        assert_eq!(s.next(rejected(false), IT), Some(TurnState::Done));
        assert_eq!(s.next(rejected(true), SS), Some(TurnState::Aborted));
    }

    #[test]
    fn fatal_action_aborts() {
        let event = TurnEvent::ActionsApplied {
            done_signalled: false,
            budget_left: true,
            fatal: true,
        };
        assert_eq!(TurnState::ExecutingActions.next(event, IT), Some(TurnState::Aborted));
        assert_eq!(TurnState::ExecutingActions.next(event, SS), Some(TurnState::Aborted));
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert_eq!(TurnState::Idle.next(TurnEvent::ResponseReceived, IT), None);
        assert_eq!(TurnState::Done.next(TurnEvent::NextRound, IT), None);
        assert_eq!(TurnState::Aborted.next(TurnEvent::Submit, SS), None);
        assert_eq!(TurnState::ParsingPlan.next(TurnEvent::ContextBuilt, IT), None);
    }
}
