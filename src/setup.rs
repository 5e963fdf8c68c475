//! Interactive first-run setup wizard (`tutor setup`)

use std::path::{Path, PathBuf};

use dialoguer::{Confirm, Input, Password, Select};

use crate::config::file::{
    SessionFileConfig, TutorConfigFile, config_file_path, load_config_file, write_config_file,
};
use crate::session::{DEFAULT_VOICE, Language};

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if user input fails or config cannot be written
pub fn run_setup(path: Option<&Path>) -> anyhow::Result<()> {
    println!("Voice Tutor Setup\n");

    let config_path = path
        .map(Path::to_path_buf)
        .or_else(config_file_path)
        .unwrap_or_else(|| PathBuf::from("~/.config/voice-tutor/config.toml"));

    // Load existing config if present
    let existing = load_config_file(Some(&config_path));
    if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
    }

    // 1. API key
    let masked = existing.api_key.as_deref().map(mask_key);
    let prompt = masked.as_ref().map_or_else(
        || "Gemini API key (GEMINI_API_KEY)".to_string(),
        |m| format!("Gemini API key (current: {m}, leave blank to keep)"),
    );
    let key_input = Password::new()
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()?;
    let api_key = if key_input.trim().is_empty() {
        existing.api_key
    } else {
        Some(key_input.trim().to_string())
    };

    // 2. Language
    let labels: Vec<String> = Language::ALL
        .iter()
        .map(|l| format!("{} ({})", l.name(), l.code()))
        .collect();
    let current = existing.session.language.unwrap_or_default();
    let default_idx = Language::ALL
        .iter()
        .position(|&l| l == current)
        .unwrap_or(0);
    let language_idx = Select::new()
        .with_prompt("Spoken language")
        .items(&labels)
        .default(default_idx)
        .interact()?;
    let language = Language::ALL[language_idx];

    // 3. Teaching mode
    let teaching_mode = Confirm::new()
        .with_prompt(format!("Start in teaching mode ({})?", language.name()))
        .default(existing.session.teaching_mode.unwrap_or(false))
        .interact()?;

    // 4. Voice
    let voice: String = Input::new()
        .with_prompt("Voice name")
        .default(
            existing
                .session
                .voice
                .clone()
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
        )
        .interact_text()?;

    let config = TutorConfigFile {
        api_key,
        session: SessionFileConfig {
            model: existing.session.model,
            voice: Some(voice),
            language: Some(language),
            teaching_mode: Some(teaching_mode),
        },
        audio: existing.audio,
        endpoints: existing.endpoints,
    };

    write_config_file(&config_path, &config)?;
    println!("\nConfig written to {}", config_path.display());
    println!("\nSetup complete! Run `tutor` to start a conversation.");

    Ok(())
}

/// Show only the ends of a key
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        "****".to_string()
    }
}
