use crate::error::InvalidAnswer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Safe,
    Dangerous,
}

impl Phase {
    pub fn alphabet(self) -> &'static str {
        match self {
            Phase::Safe => "y/n/a/N",
            Phase::Dangerous => "y/n/N",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            Phase::Safe => {
                "y = replace this string, n = leave it, a = replace this and every remaining safe match, N = stop this pass"
            }
            Phase::Dangerous => "y = replace this string, n = leave it, N = stop this pass",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Safe => "safe",
            Phase::Dangerous => "dangerous",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    All,
    Abort,
}

impl Answer {
    /// Answers are case-sensitive: `n` skips one match, `N` stops the pass.
    pub fn parse(input: &str, phase: Phase) -> Result<Self, InvalidAnswer> {
        match (input.trim(), phase) {
            ("y", _) => Ok(Answer::Yes),
            ("n", _) => Ok(Answer::No),
            ("N", _) => Ok(Answer::Abort),
            ("a", Phase::Safe) => Ok(Answer::All),
            (other, _) => Err(InvalidAnswer {
                input: other.to_string(),
                allowed: phase.alphabet(),
            }),
        }
    }
}

/// How answers are obtained for a whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Interactive,
    AssumeYes,
    AssumeNo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    AwaitingAnswer,
    AcceptAll,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Accept,
    Skip,
    Abort,
}

/// Pure step of a review pass: the session feeds an answer in and acts on
/// the returned [`Action`].
pub fn transition(state: PhaseState, answer: Answer) -> (PhaseState, Action) {
    match (state, answer) {
        (PhaseState::Stopped, _) => (PhaseState::Stopped, Action::Abort),
        (PhaseState::AcceptAll, _) => (PhaseState::AcceptAll, Action::Accept),
        (PhaseState::AwaitingAnswer, Answer::Yes) => (PhaseState::AwaitingAnswer, Action::Accept),
        (PhaseState::AwaitingAnswer, Answer::No) => (PhaseState::AwaitingAnswer, Action::Skip),
        (PhaseState::AwaitingAnswer, Answer::All) => (PhaseState::AcceptAll, Action::Accept),
        (PhaseState::AwaitingAnswer, Answer::Abort) => (PhaseState::Stopped, Action::Abort),
    }
}

/// State of one pass over either the safe or the dangerous set.
#[derive(Debug, Clone, Copy)]
pub struct PhaseMachine {
    phase: Phase,
    mode: Mode,
    state: PhaseState,
}

impl PhaseMachine {
    pub fn new(phase: Phase, mode: Mode) -> Self {
        let state = match mode {
            Mode::AssumeYes => PhaseState::AcceptAll,
            Mode::Interactive | Mode::AssumeNo => PhaseState::AwaitingAnswer,
        };
        Self { phase, mode, state }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// The action to take without asking, or `None` when the operator must
    /// answer.
    pub fn automatic_action(&self) -> Option<Action> {
        match (self.state, self.mode) {
            (PhaseState::Stopped, _) => Some(Action::Abort),
            (PhaseState::AcceptAll, _) => Some(Action::Accept),
            (PhaseState::AwaitingAnswer, Mode::AssumeNo) => Some(Action::Skip),
            (PhaseState::AwaitingAnswer, Mode::AssumeYes) => Some(Action::Accept),
            (PhaseState::AwaitingAnswer, Mode::Interactive) => None,
        }
    }

    pub fn answer(&mut self, answer: Answer) -> Action {
        let (next, action) = transition(self.state, answer);
        self.state = next;
        action
    }

    /// Ends the pass as if the operator had aborted, e.g. on closed input.
    pub fn stop(&mut self) {
        self.state = PhaseState::Stopped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAnswer {
    Commit,
    Abandon,
}

impl GateAnswer {
    pub const ALPHABET: &'static str = "y/n";

    pub fn parse(input: &str) -> Result<Self, InvalidAnswer> {
        match input.trim() {
            "y" => Ok(GateAnswer::Commit),
            "n" => Ok(GateAnswer::Abandon),
            other => Err(InvalidAnswer {
                input: other.to_string(),
                allowed: Self::ALPHABET,
            }),
        }
    }

    pub fn automatic(mode: Mode) -> Option<Self> {
        match mode {
            Mode::AssumeYes => Some(GateAnswer::Commit),
            Mode::AssumeNo => Some(GateAnswer::Abandon),
            Mode::Interactive => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_phase_accepts_full_alphabet() {
        assert_eq!(Answer::parse("y", Phase::Safe), Ok(Answer::Yes));
        assert_eq!(Answer::parse(" n\n", Phase::Safe), Ok(Answer::No));
        assert_eq!(Answer::parse("a", Phase::Safe), Ok(Answer::All));
        assert_eq!(Answer::parse("N", Phase::Safe), Ok(Answer::Abort));
    }

    #[test]
    fn dangerous_phase_has_no_blanket_accept() {
        let err = Answer::parse("a", Phase::Dangerous).unwrap_err();
        assert_eq!(err.allowed, "y/n/N");
        assert!(Answer::parse("Y", Phase::Safe).is_err());
        assert!(Answer::parse("", Phase::Safe).is_err());
    }

    #[test]
    fn accept_all_is_sticky() {
        let (state, action) = transition(PhaseState::AwaitingAnswer, Answer::All);
        assert_eq!((state, action), (PhaseState::AcceptAll, Action::Accept));
        for answer in [Answer::No, Answer::Abort, Answer::Yes] {
            assert_eq!(transition(state, answer), (PhaseState::AcceptAll, Action::Accept));
        }
    }

    #[test]
    fn abort_stops_the_pass() {
        let mut machine = PhaseMachine::new(Phase::Safe, Mode::Interactive);
        assert_eq!(machine.automatic_action(), None);
        assert_eq!(machine.answer(Answer::Abort), Action::Abort);
        assert_eq!(machine.state(), PhaseState::Stopped);
        assert_eq!(machine.automatic_action(), Some(Action::Abort));
    }

    #[test]
    fn assume_modes_never_prompt() {
        let yes = PhaseMachine::new(Phase::Dangerous, Mode::AssumeYes);
        assert_eq!(yes.automatic_action(), Some(Action::Accept));
        let no = PhaseMachine::new(Phase::Safe, Mode::AssumeNo);
        assert_eq!(no.automatic_action(), Some(Action::Skip));
    }

    #[test]
    fn gate_follows_mode() {
        assert_eq!(GateAnswer::automatic(Mode::AssumeYes), Some(GateAnswer::Commit));
        assert_eq!(GateAnswer::automatic(Mode::AssumeNo), Some(GateAnswer::Abandon));
        assert_eq!(GateAnswer::parse("y"), Ok(GateAnswer::Commit));
        assert!(GateAnswer::parse("a").is_err());
    }
}
