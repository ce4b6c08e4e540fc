use descape::UnescapeExt;
use std::{borrow::Cow, error::Error, fs::OpenOptions, io::Write, path::PathBuf};

use directories::ProjectDirs;
use serde::Serialize;
use time::OffsetDateTime;

pub fn get_data_directory(path: Option<&str>) -> Result<PathBuf, Box<dyn Error>> {
    if let Some(project_directories) = ProjectDirs::from("com", "deathcount", "DeathCount") {
        let mut data_directory = project_directories.data_dir().to_path_buf();
        if let Some(path) = path {
            data_directory.push(path);
        }

        if !data_directory.exists() {
            std::fs::create_dir_all(&data_directory)?;
        }

        return Ok(data_directory);
    }

    Err("Could not get data directory".into())
}

/// Decodes an IRCv3 tag value. Twitch encodes spaces in tag values as `\s`.
pub fn unescape(escaped_str: &str) -> String {
    let unescaped = escaped_str
        .to_unescaped()
        .unwrap_or(Cow::Borrowed(escaped_str));

    unescaped.replace(r"\s", " ").trim().to_string()
}

/// What was being processed when an error was logged.
#[derive(Debug, Serialize)]
pub struct ErrorContext<'a> {
    pub channel: &'a str,
    pub line: Option<&'a str>,
}

impl ErrorContext<'_> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

pub fn send_to_error_log(err: String, json: String) {
    let now = OffsetDateTime::now_utc();
    let log = format!("{now} - {err}: {json}\n");

    let Ok(mut error_log) = get_data_directory(Some("error_log")) else {
        eprint!("{log}");
        return;
    };
    error_log.push("log.txt");

    match OpenOptions::new().create(true).append(true).open(error_log) {
        Ok(mut file) => {
            let _ = file.write_all(log.as_bytes());
        }

        Err(_) => eprint!("{log}"),
    }
}

#[test]
fn test_unescape() {
    let test_string = r"7\\sraiders\\sfrom\\sMatisseTec\\shave\\sjoined!";

    assert_eq!(unescape(test_string), r"7 raiders from MatisseTec have joined!");
}

#[test]
fn test_unescape_display_name_with_spaces() {
    assert_eq!(unescape(r"Some\sStreamer "), "Some Streamer");
}

#[test]
fn test_error_context_json() {
    let context = ErrorContext {
        channel: "#bounceyboy",
        line: Some("PING :tmi.twitch.tv"),
    };

    assert_eq!(
        context.to_json(),
        r##"{"channel":"#bounceyboy","line":"PING :tmi.twitch.tv"}"##
    );
}
