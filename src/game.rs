//! Rock, Paper, Scissors rules.
//!
//! The referee turns a polled `Prediction` and the computer's random pick into
//! a round result. Every decided round ends the game (ties included) until the
//! referee is reset.

use rand::Rng;
use std::fmt;
use std::str::FromStr;

use crate::classify::Prediction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hand {
    Rock,
    Paper,
    Scissors,
}

impl Hand {
    pub const ALL: [Hand; 3] = [Hand::Rock, Hand::Paper, Hand::Scissors];

    /// True when `self` defeats `other`.
    pub fn beats(self, other: Hand) -> bool {
        matches!(
            (self, other),
            (Hand::Rock, Hand::Scissors) | (Hand::Paper, Hand::Rock) | (Hand::Scissors, Hand::Paper)
        )
    }

    pub fn random<R: Rng>(rng: &mut R) -> Hand {
        Hand::ALL[rng.gen_range(0..Hand::ALL.len())]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Rock => "rock",
            Hand::Paper => "paper",
            Hand::Scissors => "scissors",
        }
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Class name that is not one of the three hands (e.g. "nothing").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotAHand(pub String);

impl fmt::Display for NotAHand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not rock, paper or scissors", self.0)
    }
}

impl std::error::Error for NotAHand {}

impl FromStr for Hand {
    type Err = NotAHand;

    /// Case-insensitive. Tolerates the `"<index> <name>"` form that image
    /// classifier exports write to `labels.txt`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim();
        match name.to_ascii_lowercase().as_str() {
            "rock" => Ok(Hand::Rock),
            "paper" => Ok(Hand::Paper),
            "scissors" => Ok(Hand::Scissors),
            _ => Err(NotAHand(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Tie,
    UserWins,
    ComputerWins,
}

impl Outcome {
    pub fn between(user: Hand, computer: Hand) -> Outcome {
        if user == computer {
            Outcome::Tie
        } else if user.beats(computer) {
            Outcome::UserWins
        } else {
            Outcome::ComputerWins
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoundResult {
    pub user: Hand,
    pub computer: Hand,
    pub confidence: f32,
    pub outcome: Outcome,
}

impl RoundResult {
    /// Short banner for the game-over screen.
    pub fn headline(&self) -> &'static str {
        match self.outcome {
            Outcome::Tie => "It's a tie!",
            Outcome::UserWins => "You win!",
            Outcome::ComputerWins => "Computer wins!",
        }
    }
}

impl fmt::Display for RoundResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Computer chose {}, you chose {} ({:.0}%). {}",
            self.computer,
            self.user,
            self.confidence * 100.0,
            self.headline()
        )
    }
}

/// Game state between resets.
#[derive(Clone, Debug)]
pub struct Referee {
    min_confidence: f32,
    game_over: bool,
}

impl Referee {
    pub fn new() -> Self {
        Self {
            min_confidence: 0.0,
            game_over: false,
        }
    }

    /// Ignore predictions scoring below `min_confidence`.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn computer_choice<R: Rng>(&self, rng: &mut R) -> Hand {
        Hand::random(rng)
    }

    /// Decide a round from the user's prediction and the computer's hand.
    ///
    /// Returns `None`, leaving the game running, when the game is already
    /// over, when the predicted class is not a hand, or when it is not
    /// confident enough.
    pub fn determine_winner(
        &mut self,
        prediction: &Prediction,
        computer: Hand,
    ) -> Option<RoundResult> {
        if self.game_over || prediction.confidence < self.min_confidence {
            return None;
        }
        let user = match prediction.class_name.parse::<Hand>() {
            Ok(hand) => hand,
            Err(err) => {
                log::debug!("round skipped: {}", err);
                return None;
            }
        };
        self.game_over = true;
        Some(RoundResult {
            user,
            computer,
            confidence: prediction.confidence,
            outcome: Outcome::between(user, computer),
        })
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn reset(&mut self) {
        self.game_over = false;
    }
}

impl Default for Referee {
    fn default() -> Self {
        Self::new()
    }
}
