use std::collections::BTreeMap;

pub type Guesses = BTreeMap<String, u64>;

#[derive(Debug, PartialEq)]
pub enum GuessResult {
    Recorded,
    AlreadyGuessed(u64),
    Closed,
}

#[derive(Debug, PartialEq)]
pub enum UpdateResult {
    Updated,
    NoGuess,
    Closed,
}

#[derive(Debug, PartialEq)]
pub enum CheckResult {
    /// Everyone who guessed the number exactly, by name.
    Winners(Vec<String>),

    /// Nobody was exact: everyone tied for the smallest distance, ordered by
    /// guess and then name.
    Closest(Vec<(String, u64)>),

    NoGuesses,
}

/// The death count guesses for one run.
///
/// Guessing starts closed. `reset` keeps the guesses it clears as a
/// snapshot that `restore` brings back; only the latest snapshot is kept.
#[derive(Debug, Default)]
pub struct GuessRegistry {
    is_open: bool,
    guesses: Guesses,
    previous_guesses: Option<Guesses>,
}

impl GuessRegistry {
    pub fn new(guesses: Guesses) -> Self {
        GuessRegistry {
            guesses,
            ..GuessRegistry::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn guesses(&self) -> &Guesses {
        &self.guesses
    }

    pub fn previous_guesses(&self) -> Option<&Guesses> {
        self.previous_guesses.as_ref()
    }

    pub fn guess(&mut self, name: &str, guess: u64) -> GuessResult {
        if !self.is_open {
            return GuessResult::Closed;
        }

        if let Some(existing) = self.guesses.get(name) {
            return GuessResult::AlreadyGuessed(*existing);
        }

        self.guesses.insert(name.to_string(), guess);
        GuessResult::Recorded
    }

    pub fn update(&mut self, name: &str, guess: u64) -> UpdateResult {
        if !self.is_open {
            return UpdateResult::Closed;
        }

        match self.guesses.get_mut(name) {
            Some(existing) => {
                *existing = guess;
                UpdateResult::Updated
            }

            None => UpdateResult::NoGuess,
        }
    }

    pub fn reset(&mut self) {
        self.previous_guesses = Some(std::mem::take(&mut self.guesses));
    }

    /// Brings back the guesses cleared by the last `reset`. The snapshot is
    /// kept. Returns `false`, leaving the guesses alone, when nothing was
    /// reset yet.
    pub fn restore(&mut self) -> bool {
        let Some(previous_guesses) = &self.previous_guesses else {
            return false;
        };

        self.guesses = previous_guesses.clone();
        true
    }

    pub fn check(&self, number: u64) -> CheckResult {
        if self.guesses.is_empty() {
            return CheckResult::NoGuesses;
        }

        let winners: Vec<String> = self
            .guesses
            .iter()
            .filter(|(_, guess)| **guess == number)
            .map(|(name, _)| name.clone())
            .collect();

        if !winners.is_empty() {
            return CheckResult::Winners(winners);
        }

        let best_delta = self
            .guesses
            .values()
            .map(|guess| guess.abs_diff(number))
            .min()
            .unwrap_or(u64::MAX);

        let mut closest: Vec<(String, u64)> = self
            .guesses
            .iter()
            .filter(|(_, guess)| guess.abs_diff(number) == best_delta)
            .map(|(name, guess)| (name.clone(), *guess))
            .collect();
        closest.sort_by(|(a_name, a_guess), (b_name, b_guess)| a_guess.cmp(b_guess).then_with(|| a_name.cmp(b_name)));

        CheckResult::Closest(closest)
    }
}
