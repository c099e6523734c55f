use crate::config::{process_env, ConfigError, EnvLookup, Settings};
use crate::desktop::{Desktop, DesktopError, EnigoDesktop};
use crate::llm::client_for;
use crate::responder::{GeneratorOptions, Reply, ResponseGenerator};
use crate::session::{SessionConfig, SessionController, SessionError, SessionReport, SessionState};
use crate::surface::{build_surface, TemplateLayout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Error, Debug)]
pub enum ReferenceCaptureError {
    #[error("Error grabbing screen region")]
    DesktopError(#[from] DesktopError),
    #[error("Error creating {0}")]
    CreateDirError(PathBuf, #[source] std::io::Error),
    #[error("Error saving reference image")]
    SaveError(#[from] image::ImageError),
}

/// Settings plus the session they drive.
pub struct App {
    config_path: PathBuf,
    api_key_override: Option<String>,
    env: EnvLookup,
    pub settings: Settings,
    controller: SessionController,
}

impl App {
    pub fn load(config_path: PathBuf, api_key_override: Option<String>) -> Self {
        let settings = Settings::load(&config_path);
        Self {
            config_path,
            api_key_override,
            env: process_env,
            settings,
            controller: SessionController::new(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Persists the settings; failures are logged, never fatal.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.settings.save(&self.config_path).inspect_err(|e| {
            error!(error = %e, "error saving configuration");
        })
    }

    pub fn set_api_key(&mut self, api_key: String) -> Result<(), ConfigError> {
        self.settings.api_key = Some(api_key);
        self.save()?;
        if let Some(source) = self.shadowing_key_source() {
            warn!(%source, "saved API key is overridden and will not be used");
        }
        Ok(())
    }

    /// Names the source that takes precedence over the key in the settings
    /// file, if any.
    pub fn shadowing_key_source(&self) -> Option<String> {
        if self.api_key_override.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            return Some("--api-key".to_string());
        }
        self.settings
            .env_api_key(self.env)
            .map(|_| self.settings.provider.api_key_env_var().to_string())
    }

    pub fn generator(&self) -> ResponseGenerator {
        let client = self
            .settings
            .resolve_api_key(self.api_key_override.as_deref(), self.env)
            .map(|key| client_for(self.settings.provider, key));
        if client.is_none() {
            warn!(provider = %self.settings.provider, "no API key configured");
        }
        ResponseGenerator::new(client, GeneratorOptions::from(&self.settings))
    }

    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        let surface = build_surface(&self.settings);
        let generator = Arc::new(self.generator());
        self.controller
            .start(surface, generator, SessionConfig::from(&self.settings))
    }

    pub async fn stop(&mut self) -> Option<SessionReport> {
        self.controller.stop().await
    }

    pub async fn wait(&mut self) -> Option<SessionReport> {
        self.controller.wait().await
    }

    pub async fn take_finished(&mut self) -> Option<SessionReport> {
        self.controller.take_finished().await
    }

    pub async fn test_generation(&self, chat_history: &str) -> Reply {
        self.generator().generate(chat_history).await
    }

    /// Saves a screen region as the reference image for `element`, for use
    /// by template capture mode.
    pub fn capture_reference(
        &self,
        element: &str,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    ) -> Result<PathBuf, ReferenceCaptureError> {
        let path = TemplateLayout::from(&self.settings).asset_path(element);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| ReferenceCaptureError::CreateDirError(dir.to_path_buf(), e))?;
        }
        let region = EnigoDesktop.grab_region(x, y, width, height)?;
        region.image.save(&path)?;
        info!(path = %path.display(), "reference image saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::ReplySource;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn cohere_env(name: &str) -> Option<String> {
        (name == "COHERE_API_KEY").then(|| "from-env".to_string())
    }

    fn app_in(dir: &tempfile::TempDir, api_key_override: Option<&str>, env: EnvLookup) -> App {
        let mut app = App::load(
            dir.path().join("config.json"),
            api_key_override.map(str::to_string),
        );
        app.env = env;
        app
    }

    #[test]
    fn set_api_key_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, None, no_env);
        assert!(!app.generator().has_client());
        app.set_api_key("secret".to_string()).unwrap();
        assert_eq!(
            Settings::load(app.config_path()).api_key.as_deref(),
            Some("secret")
        );
        assert!(app.generator().has_client());
        assert_eq!(app.shadowing_key_source(), None);
    }

    #[test]
    fn saved_key_reports_what_shadows_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app_in(&dir, None, cohere_env);
        app.set_api_key("secret".to_string()).unwrap();
        assert_eq!(app.shadowing_key_source().as_deref(), Some("COHERE_API_KEY"));

        let flagged = app_in(&dir, Some("flag-key"), cohere_env);
        assert_eq!(flagged.shadowing_key_source().as_deref(), Some("--api-key"));
    }

    #[test]
    fn override_key_builds_a_client() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(&dir, Some("flag-key"), no_env);
        assert!(app.generator().has_client());
        assert_eq!(app.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_generation_without_a_key_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_in(&dir, None, no_env);
        assert!(!app.generator().has_client());
        assert_eq!(app.test_generation("Alice: hi").await.source, ReplySource::Fallback);
    }
}
