use std::{
    error::Error,
    fs,
    io::ErrorKind,
    path::PathBuf,
};

use crate::utils::get_data_directory;

use super::guesses::Guesses;

const GUESSES_FILE: &str = "guesses.txt";

/// Where guesses live between runs.
pub trait GuessStore {
    fn save(&self, guesses: &Guesses) -> Result<(), Box<dyn Error>>;
    fn load(&self) -> Result<Guesses, Box<dyn Error>>;
}

/// Keeps guesses in a text file, one `name:guess` record per line.
#[derive(Debug, Clone)]
pub struct FileGuessStore {
    path: PathBuf,
}

impl FileGuessStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileGuessStore { path: path.into() }
    }

    /// The store in the app's data directory.
    pub fn in_data_directory() -> Result<Self, Box<dyn Error>> {
        let mut path = get_data_directory(Some("guesses"))?;
        path.push(GUESSES_FILE);

        Ok(FileGuessStore::new(path))
    }
}

impl GuessStore for FileGuessStore {
    fn save(&self, guesses: &Guesses) -> Result<(), Box<dyn Error>> {
        let file_contents: String = guesses
            .iter()
            .map(|(name, guess)| format!("{name}:{guess}\n"))
            .collect();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&self.path, file_contents)?;

        Ok(())
    }

    fn load(&self) -> Result<Guesses, Box<dyn Error>> {
        let file_contents = match fs::read_to_string(&self.path) {
            Ok(file_contents) => file_contents,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Guesses::new()),
            Err(error) => return Err(error.into()),
        };

        Ok(parse_guesses(&file_contents))
    }
}

fn parse_guesses(file_contents: &str) -> Guesses {
    let mut guesses = Guesses::new();

    for line in file_contents.lines() {
        let pieces: Vec<&str> = line.trim().split(':').collect();
        let [name, guess] = pieces.as_slice() else {
            continue;
        };

        if guess.is_empty() || !guess.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        if let Ok(guess) = guess.parse() {
            guesses.insert(name.to_string(), guess);
        }
    }

    guesses
}
