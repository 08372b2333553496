//! Winner resolution for a single round.
//!
//! Pure functions only. Scores are applied by [`Room::resolve_round`],
//! never here.
//!
//! [`Room::resolve_round`]: crate::Room::resolve_round

use roshambo_protocol::Choice;

/// How a round came out as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// All three choices were present: everyone is a winner.
    Draw,
    /// Exactly two choices were present and this one dominated.
    Winner(Choice),
    /// Everyone picked the same thing (or nobody picked anything).
    NoDecision,
}

/// Classifies a fully-populated set of choices.
pub fn verdict(choices: &[Choice]) -> Verdict {
    let present: Vec<Choice> = Choice::ALL
        .into_iter()
        .filter(|c| choices.contains(c))
        .collect();

    match present.as_slice() {
        [a, b] if a.beats(*b) => Verdict::Winner(*a),
        [a, b] if b.beats(*a) => Verdict::Winner(*b),
        [_, _, _] => Verdict::Draw,
        _ => Verdict::NoDecision,
    }
}

/// Returns the indices (into `choices`) of the winning players.
///
/// Full draw returns every index; no decision returns none.
pub fn winners(choices: &[Choice]) -> Vec<usize> {
    match verdict(choices) {
        Verdict::Draw => (0..choices.len()).collect(),
        Verdict::Winner(best) => choices
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == best)
            .map(|(i, _)| i)
            .collect(),
        Verdict::NoDecision => Vec::new(),
    }
}

/// What one player is told about a resolved round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    /// `Draw` if every player won, `Win` if this player is among a
    /// partial winner set, `Lose` otherwise.
    pub fn classify(is_winner: bool, winner_count: usize, player_count: usize) -> Self {
        if winner_count == player_count && player_count > 0 {
            Outcome::Draw
        } else if is_winner {
            Outcome::Win
        } else {
            Outcome::Lose
        }
    }
}
