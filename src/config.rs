use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use clap_complete::Shell;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_PROMPT: &str = "Generate a one line summary of the following text.";
pub const DEFAULT_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";
pub const DEFAULT_BUFFER_TIME: u64 = 1;

// CLI argument structure. Unset options fall back to the config file, then defaults
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "inlama", version)]
#[command(about = "Pipe stdin to an Ollama model and stream the answer to stdout")]
pub struct Args {
    /// Stream input to the model, one request per buffer window
    #[arg(short = 'f', long)]
    pub follow: bool,

    /// System prompt for the model
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Use the configured system prompt preset with this index
    #[arg(long, value_name = "INDEX", conflicts_with = "prompt")]
    pub preset: Option<usize>,

    /// Buffer time for streaming input (in seconds)
    #[arg(short, long, value_name = "SECS")]
    pub buffer_time: Option<u64>,

    /// Url of the Ollama server
    #[arg(short, long)]
    pub url: Option<String>,

    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Send the pending batch when input closes instead of dropping it
    #[arg(long)]
    pub flush_on_close: bool,

    /// Config file (TOML)
    #[arg(short, long, env = "CONFIG_FILE", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More logging on stderr (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long)]
    pub metrics: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_name = "SHELL")]
    pub completion: Option<Shell>,
}

// On-disk config, every key optional
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    pub stream: Option<bool>,
    pub prompt: Option<String>,
    pub buffer_time: Option<u64>,
    pub url: Option<String>,
    pub model: Option<String>,
    pub presets: Option<Vec<String>>,
    pub flush_on_close: Option<bool>,
}

// Fully resolved settings, fixed for the whole run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub stream: bool,
    pub system_prompt: String,
    pub buffer_window: Duration,
    pub url: String,
    pub model: String,
    pub flush_on_close: bool,
}

/// Finds and parses the config file, then layers the CLI arguments on top.
pub fn load(args: &Args) -> Result<Config, ConfigError> {
    let file = match find_config_file(args.config.as_deref()) {
        Some(path) => read_config_file(&path)?,
        None => FileConfig::default(),
    };
    resolve(args, file)
}

/// Merges CLI > file > defaults and validates the result.
pub fn resolve(args: &Args, file: FileConfig) -> Result<Config, ConfigError> {
    let presets = file
        .presets
        .unwrap_or_else(|| vec![DEFAULT_PROMPT.to_string()]);

    let system_prompt = match (args.preset, &args.prompt) {
        (Some(index), _) => presets
            .get(index)
            .cloned()
            .ok_or(ConfigError::UnknownPreset {
                index,
                available: presets.len(),
            })?,
        (None, Some(prompt)) => prompt.clone(),
        (None, None) => file.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_string()),
    };

    let stream = args.follow || file.stream.unwrap_or(false);
    let buffer_time = args
        .buffer_time
        .or(file.buffer_time)
        .unwrap_or(DEFAULT_BUFFER_TIME);
    if stream && buffer_time == 0 {
        return Err(ConfigError::ZeroBufferWindow);
    }

    let url = args
        .url
        .clone()
        .or(file.url)
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    if let Err(e) = reqwest::Url::parse(&url) {
        return Err(ConfigError::InvalidUrl {
            url,
            reason: e.to_string(),
        });
    }

    Ok(Config {
        stream,
        system_prompt,
        buffer_window: Duration::from_secs(buffer_time),
        url,
        model: args
            .model
            .clone()
            .or(file.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        flush_on_close: args.flush_on_close || file.flush_on_close.unwrap_or(false),
    })
}

pub fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(file)
}

// Explicit path first, then ~/.config/inlama/config.toml, then ~/.inlama.toml
fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let path = expand_home(path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!(path = %path.display(), "config file not found, ignoring");
    }

    let home = dirs::home_dir()?;
    [
        home.join(".config").join("inlama").join("config.toml"),
        home.join(".inlama.toml"),
    ]
    .into_iter()
    .find(|path| path.exists())
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("inlama").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let config = resolve(&args(&[]), FileConfig::default()).unwrap();

        assert!(!config.stream);
        assert_eq!(config.system_prompt, DEFAULT_PROMPT);
        assert_eq!(config.buffer_window, Duration::from_secs(1));
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!config.flush_on_close);
    }

    #[test]
    fn flags_override_file() {
        let file = FileConfig {
            prompt: Some("from file".to_string()),
            model: Some("mistral".to_string()),
            buffer_time: Some(5),
            ..FileConfig::default()
        };
        let config = resolve(&args(&["-f", "-m", "phi3", "-b", "2"]), file).unwrap();

        assert!(config.stream);
        assert_eq!(config.model, "phi3");
        assert_eq!(config.buffer_window, Duration::from_secs(2));
        assert_eq!(config.system_prompt, "from file");
    }

    #[test]
    fn preset_selects_prompt() {
        let file = FileConfig {
            presets: Some(vec!["one".to_string(), "two".to_string()]),
            ..FileConfig::default()
        };
        let config = resolve(&args(&["--preset", "1"]), file).unwrap();

        assert_eq!(config.system_prompt, "two");
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let err = resolve(&args(&["--preset", "3"]), FileConfig::default()).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::UnknownPreset {
                index: 3,
                available: 1
            }
        ));
    }

    #[test]
    fn preset_and_prompt_conflict() {
        let parsed = Args::try_parse_from(["inlama", "--preset", "0", "-p", "x"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn zero_buffer_time_rejected_when_following() {
        let err = resolve(&args(&["-f", "-b", "0"]), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroBufferWindow));

        // one-shot mode never looks at the window
        assert!(resolve(&args(&["-b", "0"]), FileConfig::default()).is_ok());
    }

    #[test]
    fn invalid_url_rejected() {
        let err = resolve(&args(&["-u", "not a url"]), FileConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
stream = true
buffer_time = 3
model = "mistral"
presets = ["Translate to French.", "List the errors."]
flush_on_close = true
"#
        )
        .unwrap();

        let parsed = read_config_file(file.path()).unwrap();
        assert_eq!(parsed.stream, Some(true));
        assert_eq!(parsed.buffer_time, Some(3));
        assert_eq!(parsed.presets.as_ref().map(Vec::len), Some(2));

        let config = resolve(&args(&["--preset", "1"]), parsed).unwrap();
        assert!(config.stream);
        assert!(config.flush_on_close);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.system_prompt, "List the errors.");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_time = \"soon\"").unwrap();

        let err = read_config_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn explicit_config_path_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "model = \"gemma\"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = load(&args(&["-c", &path])).unwrap();
        assert_eq!(config.model, "gemma");
    }
}
