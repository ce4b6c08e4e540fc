use colored::*;
use hex_rgb::Color;

use crate::twitch::parse::{ChatMessage, Tags};

const DEFAULT_NICKNAME_COLOR: (u8, u8, u8) = (255, 153, 18);

pub fn print_message(message: &ChatMessage) {
    let (r, g, b) = get_nickname_color(message.tags.get("color").unwrap_or(""));
    let nick = message.display_name.truecolor(r, g, b).bold();

    println!("{nick}: {}", message.text.trim());
}

pub fn print_whisper(tags: &Tags, text: &str) {
    let sender = tags.display_name().unwrap_or_else(|| "someone".to_string());
    let whisper = "💬 Whisper from".to_string().truecolor(255, 255, 0).bold();

    println!("{whisper} {sender}: {}", text.trim());
}

pub fn print_connected() {
    println!("{}", "Connected.".green().bold());
}

/// Prints a bot event. Fancy events get a box drawn around them.
pub fn log(message: &str, fancy: bool) {
    if fancy {
        let border = "-".repeat(message.chars().count() + 2);
        println!("{border}");
        println!("|{message}|");
        println!("{border}");
    } else {
        println!("{message}");
    }
}

fn get_nickname_color(color: &str) -> (u8, u8, u8) {
    // Users who never picked a colour get an empty tag
    if color.is_empty() {
        return DEFAULT_NICKNAME_COLOR;
    }

    Color::new(color).map_or(DEFAULT_NICKNAME_COLOR, |color| (color.red, color.green, color.blue))
}
