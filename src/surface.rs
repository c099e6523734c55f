use crate::config::{CaptureMode, ChatArea, Coords, Settings};
use crate::desktop::{command_key, Desktop, DesktopError, EnigoDesktop};
use async_trait::async_trait;
use enigo::Key;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const APP_OPEN_WAIT: Duration = Duration::from_secs(2);
const LAUNCHER_APP_OPEN_WAIT: Duration = Duration::from_secs(3);
const COPY_WAIT: Duration = Duration::from_millis(500);
const SHORT_WAIT: Duration = Duration::from_millis(300);

#[derive(Error, Debug)]
pub enum SurfaceError {
    #[error(transparent)]
    DesktopError(#[from] DesktopError),
    #[error("Reference image {0} not found")]
    MissingAsset(PathBuf),
    #[error("Could not find {0} on screen")]
    NotFound(String),
    #[error("Desktop task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

/// Chat-level operations on the messaging application.
#[async_trait]
pub trait ChatSurface: Send + Sync {
    /// Brings the application to the foreground.
    async fn open_app(&self) -> Result<(), SurfaceError>;
    /// Copies the visible transcript. Returns `""` when nothing usable was
    /// copied.
    async fn capture_chat(&self) -> Result<String, SurfaceError>;
    async fn send_reply(&self, text: &str) -> Result<(), SurfaceError>;
}

pub fn build_surface(settings: &Settings) -> Arc<dyn ChatSurface> {
    let desktop = Arc::new(EnigoDesktop);
    match settings.capture_mode {
        CaptureMode::Coordinates => Arc::new(CoordinateSurface::new(desktop, CoordinateLayout::from(settings))),
        CaptureMode::Template => Arc::new(TemplateSurface::new(desktop, TemplateLayout::from(settings))),
    }
}

async fn on_desktop<D, T, F>(desktop: &Arc<D>, f: F) -> Result<T, SurfaceError>
where
    D: Desktop + 'static,
    T: Send + 'static,
    F: FnOnce(&D) -> Result<T, SurfaceError> + Send + 'static,
{
    let desktop = desktop.clone();
    tokio::task::spawn_blocking(move || f(desktop.as_ref())).await?
}

/// Replaces whatever is in the focused input with `text` and presses Return.
fn paste_and_send<D: Desktop + ?Sized>(desktop: &D, text: &str) -> Result<(), SurfaceError> {
    desktop.key_combo(command_key(), Key::Unicode('a'))?;
    desktop.pause(Duration::from_millis(200));
    desktop.press(Key::Delete)?;
    desktop.pause(Duration::from_millis(200));
    desktop.write_clipboard(text)?;
    desktop.key_combo(command_key(), Key::Unicode('v'))?;
    desktop.pause(SHORT_WAIT);
    desktop.press(Key::Return)?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CoordinateLayout {
    pub app: Coords,
    pub chat_area: ChatArea,
    pub message_box: Coords,
    pub min_capture_len: usize,
}

impl From<&Settings> for CoordinateLayout {
    fn from(settings: &Settings) -> Self {
        Self {
            app: settings.app_coords,
            chat_area: settings.chat_area,
            message_box: settings.message_box_coords,
            min_capture_len: settings.min_capture_len,
        }
    }
}

/// Drives the application through calibrated screen coordinates.
pub struct CoordinateSurface<D> {
    desktop: Arc<D>,
    layout: CoordinateLayout,
}

impl<D: Desktop + 'static> CoordinateSurface<D> {
    pub fn new(desktop: Arc<D>, layout: CoordinateLayout) -> Self {
        Self { desktop, layout }
    }

    fn open_blocking(desktop: &D, layout: &CoordinateLayout) -> Result<(), SurfaceError> {
        let Coords(x, y) = layout.app;
        info!(x, y, "activating messaging app");
        desktop.click(x, y)?;
        desktop.pause(APP_OPEN_WAIT);
        Ok(())
    }

    fn capture_blocking(desktop: &D, layout: &CoordinateLayout) -> Result<String, SurfaceError> {
        // clear first so a failed copy cannot return a stale transcript
        desktop.write_clipboard("")?;
        let area = layout.chat_area;
        desktop.drag((area.start_x, area.start_y), (area.end_x, area.end_y))?;
        desktop.key_combo(command_key(), Key::Unicode('c'))?;
        desktop.pause(COPY_WAIT);
        let text = desktop.read_clipboard()?;
        if text.chars().count() > layout.min_capture_len {
            Ok(text)
        } else {
            Ok(String::new())
        }
    }

    fn send_blocking(desktop: &D, layout: &CoordinateLayout, text: &str) -> Result<(), SurfaceError> {
        let Coords(x, y) = layout.message_box;
        desktop.click(x, y)?;
        desktop.pause(SHORT_WAIT);
        paste_and_send(desktop, text)
    }
}

#[async_trait]
impl<D: Desktop + 'static> ChatSurface for CoordinateSurface<D> {
    async fn open_app(&self) -> Result<(), SurfaceError> {
        let layout = self.layout.clone();
        on_desktop(&self.desktop, move |d| Self::open_blocking(d, &layout)).await
    }

    async fn capture_chat(&self) -> Result<String, SurfaceError> {
        let layout = self.layout.clone();
        on_desktop(&self.desktop, move |d| Self::capture_blocking(d, &layout)).await
    }

    async fn send_reply(&self, text: &str) -> Result<(), SurfaceError> {
        let layout = self.layout.clone();
        let text = text.to_string();
        on_desktop(&self.desktop, move |d| Self::send_blocking(d, &layout, &text)).await
    }
}

#[derive(Debug, Clone)]
pub struct TemplateLayout {
    pub assets_dir: PathBuf,
    pub platform: String,
    pub confidence: f32,
    pub min_capture_len: usize,
}

impl From<&Settings> for TemplateLayout {
    fn from(settings: &Settings) -> Self {
        Self {
            assets_dir: settings.assets_dir.clone(),
            platform: settings.platform.to_lowercase(),
            confidence: settings.confidence_threshold,
            min_capture_len: settings.min_capture_len,
        }
    }
}

impl TemplateLayout {
    /// Reference images are stored as `<platform>_<element>.png`.
    pub fn asset_path(&self, element: &str) -> PathBuf {
        self.assets_dir.join(format!("{}_{}.png", self.platform, element))
    }
}

/// Drives the application by locating reference images on screen.
pub struct TemplateSurface<D> {
    desktop: Arc<D>,
    layout: TemplateLayout,
}

impl<D: Desktop + 'static> TemplateSurface<D> {
    pub fn new(desktop: Arc<D>, layout: TemplateLayout) -> Self {
        Self { desktop, layout }
    }

    fn locate(desktop: &D, layout: &TemplateLayout, element: &str) -> Result<(i32, i32), SurfaceError> {
        let path = layout.asset_path(element);
        if !path.exists() {
            return Err(SurfaceError::MissingAsset(path));
        }
        desktop
            .locate_image(&path, layout.confidence)?
            .ok_or_else(|| SurfaceError::NotFound(element.to_string()))
    }

    fn open_blocking(desktop: &D, layout: &TemplateLayout) -> Result<(), SurfaceError> {
        info!(platform = %layout.platform, "opening messaging app");
        match Self::locate(desktop, layout, "icon") {
            Ok((x, y)) => {
                desktop.double_click(x, y)?;
                desktop.pause(LAUNCHER_APP_OPEN_WAIT);
                return Ok(());
            }
            Err(e) => warn!(error = %e, "app icon not found, trying the launcher"),
        }
        desktop.key_combo(command_key(), Key::Space)?;
        desktop.pause(Duration::from_millis(500));
        desktop.type_text(&layout.platform)?;
        desktop.pause(Duration::from_millis(500));
        desktop.press(Key::Return)?;
        desktop.pause(LAUNCHER_APP_OPEN_WAIT);
        Ok(())
    }

    fn capture_blocking(desktop: &D, layout: &TemplateLayout) -> Result<String, SurfaceError> {
        let (x, y) = Self::locate(desktop, layout, "chat_area")?;
        desktop.write_clipboard("")?;
        desktop.click(x, y)?;
        desktop.pause(COPY_WAIT);
        desktop.key_combo(command_key(), Key::Unicode('a'))?;
        desktop.pause(COPY_WAIT);
        desktop.key_combo(command_key(), Key::Unicode('c'))?;
        desktop.pause(COPY_WAIT);
        let text = desktop.read_clipboard()?;
        if text.chars().count() > layout.min_capture_len {
            Ok(text)
        } else {
            Ok(String::new())
        }
    }

    fn send_blocking(desktop: &D, layout: &TemplateLayout, text: &str) -> Result<(), SurfaceError> {
        let (x, y) = Self::locate(desktop, layout, "message_box")?;
        desktop.click(x, y)?;
        desktop.pause(SHORT_WAIT);
        paste_and_send(desktop, text)
    }
}

#[async_trait]
impl<D: Desktop + 'static> ChatSurface for TemplateSurface<D> {
    async fn open_app(&self) -> Result<(), SurfaceError> {
        let layout = self.layout.clone();
        on_desktop(&self.desktop, move |d| Self::open_blocking(d, &layout)).await
    }

    async fn capture_chat(&self) -> Result<String, SurfaceError> {
        let layout = self.layout.clone();
        on_desktop(&self.desktop, move |d| Self::capture_blocking(d, &layout)).await
    }

    async fn send_reply(&self, text: &str) -> Result<(), SurfaceError> {
        let layout = self.layout.clone();
        let text = text.to_string();
        on_desktop(&self.desktop, move |d| Self::send_blocking(d, &layout, &text)).await
    }
}
