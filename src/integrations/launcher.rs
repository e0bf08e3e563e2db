//! Application launch and web search through the host OS

use std::collections::{BTreeMap, HashMap};
use std::process::{Command, Stdio};

use crate::{Error, Result};

/// Built-in application aliases (canonical name → spoken aliases)
const DEFAULT_APPS: &[(&str, &[&str])] = &[
    ("Visual Studio Code", &["vscode", "code", "visual studio code"]),
    ("Terminal", &["terminal"]),
    ("Google Chrome", &["chrome", "google chrome"]),
    ("Safari", &["safari", "browser"]),
    ("Finder", &["finder", "files"]),
    ("Spotify", &["spotify", "music"]),
];

/// Executables to try for canonical names on platforms without `open -a`
const LINUX_BINARIES: &[(&str, &[&str])] = &[
    ("Visual Studio Code", &["code", "codium"]),
    ("Terminal", &["x-terminal-emulator", "gnome-terminal", "konsole"]),
    ("Google Chrome", &["google-chrome", "chromium"]),
    ("Finder", &["xdg-open"]),
];

/// A web search engine the dispatcher can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchEngine {
    Google,
    StackOverflow,
    GitHub,
}

impl SearchEngine {
    /// Query URL prefix; the encoded query is appended
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/search?q=",
            Self::StackOverflow => "https://stackoverflow.com/search?q=",
            Self::GitHub => "https://github.com/search?q=",
        }
    }

    /// Look up an engine by its spoken name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "google" => Some(Self::Google),
            "stackoverflow" | "stack overflow" => Some(Self::StackOverflow),
            "github" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// Build the search URL for `query` on `engine`
#[must_use]
pub fn search_url(engine: SearchEngine, query: &str) -> String {
    format!("{}{}", engine.base_url(), urlencoding::encode(query.trim()))
}

/// Case-insensitive application alias table
#[derive(Debug, Clone)]
pub struct AppAliases {
    map: HashMap<String, String>,
}

impl AppAliases {
    /// Built-in aliases merged with `extra` (canonical name → aliases)
    ///
    /// Entries in `extra` take precedence over the built-ins.
    #[must_use]
    pub fn new(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut map = HashMap::new();

        let builtin = DEFAULT_APPS
            .iter()
            .map(|(app, aliases)| (*app, aliases.iter().copied().collect::<Vec<_>>()));
        let configured = extra
            .iter()
            .map(|(app, aliases)| (app.as_str(), aliases.iter().map(String::as_str).collect()));

        for (app, aliases) in builtin.chain(configured) {
            map.insert(app.to_lowercase(), app.to_string());
            for alias in aliases {
                map.insert(alias.trim().to_lowercase(), app.to_string());
            }
        }

        Self { map }
    }

    /// Canonical name for `name`, or `name` itself when it is not an alias
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        let name = name.trim();
        self.map
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

impl Default for AppAliases {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

/// Launches applications and URLs
///
/// Implementations are fire-and-forget: success only means the launch was
/// handed off to the OS.
pub trait Launcher: Send + Sync {
    /// Launch the application called `app`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the application cannot be started
    fn open_app(&self, app: &str) -> Result<()>;

    /// Open `url` in the default browser
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if no browser handler could be started
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Launcher backed by the platform's native open commands
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl SystemLauncher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Launcher for SystemLauncher {
    #[cfg(target_os = "macos")]
    fn open_app(&self, app: &str) -> Result<()> {
        let output = Command::new("open")
            .args(["-a", app])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::Launch(format!("failed to run open: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Launch(format!("open -a {app} failed: {}", stderr.trim())));
        }

        tracing::info!(app, "launched application");
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    fn open_app(&self, app: &str) -> Result<()> {
        let program = binary_candidates(app)
            .into_iter()
            .find_map(|candidate| which::which(candidate).ok())
            .ok_or_else(|| Error::Launch(format!("no executable found for {app}")))?;

        spawn_detached(Command::new(&program))
            .map_err(|e| Error::Launch(format!("failed to start {}: {e}", program.display())))?;

        tracing::info!(app, program = %program.display(), "launched application");
        Ok(())
    }

    fn open_url(&self, url: &str) -> Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]);
            c
        } else {
            Command::new("xdg-open")
        };
        command.arg(url);

        spawn_detached(command).map_err(|e| Error::Launch(format!("failed to open {url}: {e}")))?;

        tracing::debug!(url, "opened url");
        Ok(())
    }
}

fn spawn_detached(mut command: Command) -> std::io::Result<()> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(drop)
}

/// Executable names to try for `app`, most specific first
#[cfg_attr(target_os = "macos", allow(dead_code))]
fn binary_candidates(app: &str) -> Vec<String> {
    let mut candidates: Vec<String> = LINUX_BINARIES
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case(app))
        .flat_map(|(_, bins)| bins.iter().map(|b| (*b).to_string()))
        .collect();

    let lower = app.to_lowercase();
    candidates.push(lower.replace(' ', "-"));
    candidates.push(lower.replace(' ', ""));
    candidates.dedup();
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_resolution_ignores_case() {
        let aliases = AppAliases::default();
        for spoken in ["vscode", "VsCode", "VSCODE", " code ", "Visual Studio Code"] {
            assert_eq!(aliases.resolve(spoken), "Visual Studio Code", "{spoken}");
        }
        assert_eq!(aliases.resolve("terminal"), "Terminal");
    }

    #[test]
    fn test_unknown_app_passes_through() {
        let aliases = AppAliases::default();
        assert_eq!(aliases.resolve("Blender"), "Blender");
    }

    #[test]
    fn test_configured_aliases_override_builtins() {
        let mut extra = BTreeMap::new();
        extra.insert("iTerm".to_string(), vec!["terminal".to_string(), "iterm".to_string()]);

        let aliases = AppAliases::new(&extra);
        assert_eq!(aliases.resolve("Terminal"), "iTerm");
        assert_eq!(aliases.resolve("ITERM"), "iTerm");
        assert_eq!(aliases.resolve("vscode"), "Visual Studio Code");
    }

    #[test]
    fn test_search_url_encodes_query() {
        assert_eq!(
            search_url(SearchEngine::Google, "rust async traits"),
            "https://www.google.com/search?q=rust%20async%20traits"
        );
        assert_eq!(
            search_url(SearchEngine::GitHub, "c++ & co"),
            "https://github.com/search?q=c%2B%2B%20%26%20co"
        );
    }

    #[test]
    fn test_engine_names() {
        assert_eq!(SearchEngine::from_name("Stack Overflow"), Some(SearchEngine::StackOverflow));
        assert_eq!(SearchEngine::from_name("bing"), None);
    }

    #[test]
    fn test_binary_candidates_prefer_known_executables() {
        let candidates = binary_candidates("Visual Studio Code");
        assert_eq!(candidates[0], "code");
        assert!(candidates.contains(&"visual-studio-code".to_string()));
    }
}
