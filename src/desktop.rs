use crate::image_analysis::find_template;
use crate::screenshot::{take_region_screenshot, take_screenshot, Screenshot, ScreenshotError};
use arboard::Clipboard;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const DRAG_STEPS: i32 = 10;
const DRAG_STEP_DELAY: Duration = Duration::from_millis(50);
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(80);

#[derive(Error, Debug)]
pub enum DesktopError {
    #[error("Failed to connect to the input backend: {0}")]
    ConnectionError(#[from] enigo::NewConError),
    #[error("Failed to simulate input: {0}")]
    InputError(#[from] enigo::InputError),
    #[error("Clipboard error: {0}")]
    ClipboardError(#[from] arboard::Error),
    #[error("Screenshot error: {0}")]
    ScreenshotError(#[from] ScreenshotError),
    #[error("Failed to load reference image {path}: {source}")]
    ReferenceImageError {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// The modifier used for select-all/copy/paste shortcuts.
pub fn command_key() -> Key {
    if cfg!(target_os = "macos") {
        Key::Meta
    } else {
        Key::Control
    }
}

/// OS automation primitives. Every call blocks; async callers should go
/// through `spawn_blocking`.
pub trait Desktop: Send + Sync {
    fn click(&self, x: i32, y: i32) -> Result<(), DesktopError>;
    fn double_click(&self, x: i32, y: i32) -> Result<(), DesktopError>;
    /// Press at `from`, move to `to`, release.
    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), DesktopError>;
    /// Hold `modifier` while clicking `key`.
    fn key_combo(&self, modifier: Key, key: Key) -> Result<(), DesktopError>;
    fn press(&self, key: Key) -> Result<(), DesktopError>;
    fn type_text(&self, text: &str) -> Result<(), DesktopError>;
    fn read_clipboard(&self) -> Result<String, DesktopError>;
    fn write_clipboard(&self, text: &str) -> Result<(), DesktopError>;
    fn grab_screen(&self) -> Result<Screenshot, DesktopError>;
    fn grab_region(&self, x: i32, y: i32, width: u32, height: u32) -> Result<Screenshot, DesktopError>;

    /// Finds the center of `reference` on screen, in pointer coordinates.
    fn locate_image(&self, reference: &Path, confidence: f32) -> Result<Option<(i32, i32)>, DesktopError> {
        let template = image::open(reference)
            .map_err(|source| DesktopError::ReferenceImageError {
                path: reference.to_path_buf(),
                source,
            })?
            .to_rgba8();
        let screen = self.grab_screen()?;
        Ok(find_template(&screen.image, &template, confidence).map(|found| {
            debug!(image = %reference.display(), confidence = found.confidence, "reference image located");
            screen.to_pointer_coords(found.x, found.y)
        }))
    }

    /// Lets the target application catch up between steps.
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// `Desktop` backed by enigo, arboard and screenshots. Backends are opened
/// per call so nothing holds a virtual input device between ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnigoDesktop;

impl EnigoDesktop {
    fn enigo(&self) -> Result<Enigo, DesktopError> {
        Ok(Enigo::new(&Settings::default())?)
    }
}

impl Desktop for EnigoDesktop {
    fn click(&self, x: i32, y: i32) -> Result<(), DesktopError> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        enigo.button(Button::Left, Direction::Click)?;
        Ok(())
    }

    fn double_click(&self, x: i32, y: i32) -> Result<(), DesktopError> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        enigo.button(Button::Left, Direction::Click)?;
        std::thread::sleep(DOUBLE_CLICK_GAP);
        enigo.button(Button::Left, Direction::Click)?;
        Ok(())
    }

    fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), DesktopError> {
        let mut enigo = self.enigo()?;
        enigo.move_mouse(from.0, from.1, Coordinate::Abs)?;
        enigo.button(Button::Left, Direction::Press)?;
        for step in 1..=DRAG_STEPS {
            let x = from.0 + (to.0 - from.0) * step / DRAG_STEPS;
            let y = from.1 + (to.1 - from.1) * step / DRAG_STEPS;
            std::thread::sleep(DRAG_STEP_DELAY);
            enigo.move_mouse(x, y, Coordinate::Abs)?;
        }
        enigo.button(Button::Left, Direction::Release)?;
        Ok(())
    }

    fn key_combo(&self, modifier: Key, key: Key) -> Result<(), DesktopError> {
        let mut enigo = self.enigo()?;
        enigo.key(modifier, Direction::Press)?;
        let clicked = enigo.key(key, Direction::Click);
        // release even when the click failed so the modifier never sticks
        enigo.key(modifier, Direction::Release)?;
        clicked?;
        Ok(())
    }

    fn press(&self, key: Key) -> Result<(), DesktopError> {
        self.enigo()?.key(key, Direction::Click)?;
        Ok(())
    }

    fn type_text(&self, text: &str) -> Result<(), DesktopError> {
        self.enigo()?.text(text)?;
        Ok(())
    }

    fn read_clipboard(&self) -> Result<String, DesktopError> {
        match Clipboard::new()?.get_text() {
            Ok(text) => Ok(text),
            // non-text or empty clipboard
            Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_clipboard(&self, text: &str) -> Result<(), DesktopError> {
        Clipboard::new()?.set_text(text)?;
        Ok(())
    }

    fn grab_screen(&self) -> Result<Screenshot, DesktopError> {
        Ok(take_screenshot()?)
    }

    fn grab_region(&self, x: i32, y: i32, width: u32, height: u32) -> Result<Screenshot, DesktopError> {
        Ok(take_region_screenshot(x, y, width, height)?)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Recording `Desktop` for surface tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Action {
        Click(i32, i32),
        DoubleClick(i32, i32),
        Drag((i32, i32), (i32, i32)),
        Combo(Key, Key),
        Press(Key),
        Type(String),
        WriteClipboard(String),
    }

    #[derive(Default)]
    pub struct FakeDesktop {
        pub actions: Mutex<Vec<Action>>,
        pub clipboard: Mutex<String>,
        /// Text placed on the clipboard whenever a copy shortcut is pressed.
        pub selection: Mutex<String>,
        /// Reference image file name to its on-screen center.
        pub visible: Mutex<HashMap<String, (i32, i32)>>,
    }

    impl FakeDesktop {
        pub fn record(&self, action: Action) {
            self.actions.lock().unwrap().push(action);
        }

        pub fn actions(&self) -> Vec<Action> {
            self.actions.lock().unwrap().clone()
        }
    }

    impl Desktop for FakeDesktop {
        fn click(&self, x: i32, y: i32) -> Result<(), DesktopError> {
            self.record(Action::Click(x, y));
            Ok(())
        }

        fn double_click(&self, x: i32, y: i32) -> Result<(), DesktopError> {
            self.record(Action::DoubleClick(x, y));
            Ok(())
        }

        fn drag(&self, from: (i32, i32), to: (i32, i32)) -> Result<(), DesktopError> {
            self.record(Action::Drag(from, to));
            Ok(())
        }

        fn key_combo(&self, modifier: Key, key: Key) -> Result<(), DesktopError> {
            if key == Key::Unicode('c') {
                let selection = self.selection.lock().unwrap().clone();
                *self.clipboard.lock().unwrap() = selection;
            }
            self.record(Action::Combo(modifier, key));
            Ok(())
        }

        fn press(&self, key: Key) -> Result<(), DesktopError> {
            self.record(Action::Press(key));
            Ok(())
        }

        fn type_text(&self, text: &str) -> Result<(), DesktopError> {
            self.record(Action::Type(text.to_string()));
            Ok(())
        }

        fn read_clipboard(&self) -> Result<String, DesktopError> {
            Ok(self.clipboard.lock().unwrap().clone())
        }

        fn write_clipboard(&self, text: &str) -> Result<(), DesktopError> {
            *self.clipboard.lock().unwrap() = text.to_string();
            self.record(Action::WriteClipboard(text.to_string()));
            Ok(())
        }

        fn grab_screen(&self) -> Result<Screenshot, DesktopError> {
            Err(ScreenshotError::NoScreensFound.into())
        }

        fn grab_region(&self, _x: i32, _y: i32, _w: u32, _h: u32) -> Result<Screenshot, DesktopError> {
            Err(ScreenshotError::NoScreensFound.into())
        }

        fn locate_image(&self, reference: &Path, _confidence: f32) -> Result<Option<(i32, i32)>, DesktopError> {
            let name = reference
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            Ok(self.visible.lock().unwrap().get(name).copied())
        }

        fn pause(&self, _duration: Duration) {}
    }
}
