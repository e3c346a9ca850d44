use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    #[default]
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeMode::Light => LIGHT_PALETTE,
            ThemeMode::Dark => DARK_PALETTE,
        }
    }
}

/// Colors by semantic role, as hex strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Palette {
    pub background: &'static str,
    pub text: &'static str,
    pub primary: &'static str,
    pub card: &'static str,
    pub border: &'static str,
}

pub const LIGHT_PALETTE: Palette = Palette {
    background: "#ffffff",
    text: "#0f172a",
    primary: "#0ea5e9", // sky 500
    card: "#f1f5f9",
    border: "#e2e8f0",
};

pub const DARK_PALETTE: Palette = Palette {
    background: "#0f172a", // slate 900
    text: "#f8fafc",
    primary: "#38bdf8", // sky 400
    card: "#1e293b",
    border: "#334155",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThemeState {
    pub mode: ThemeMode,
    pub palette: Palette,
}

impl ThemeState {
    pub fn for_mode(mode: ThemeMode) -> Self {
        Self {
            mode,
            palette: mode.palette(),
        }
    }

    pub fn is_dark(&self) -> bool {
        self.mode == ThemeMode::Dark
    }
}

impl Default for ThemeState {
    fn default() -> Self {
        Self::for_mode(ThemeMode::default())
    }
}

/// Single owner of the app-wide theme. Presentation components hold a
/// receiver from [`ThemeProvider::subscribe`] and re-render on change.
/// Nothing is persisted: every session starts dark.
#[derive(Debug)]
pub struct ThemeProvider {
    state: watch::Sender<ThemeState>,
}

impl ThemeProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ThemeState::default());
        Self { state }
    }

    pub fn current(&self) -> ThemeState {
        *self.state.borrow()
    }

    pub fn toggle(&self) -> ThemeState {
        self.state
            .send_modify(|state| *state = ThemeState::for_mode(state.mode.toggled()));
        let state = self.current();
        tracing::info!("theme switched to {:?}", state.mode);
        state
    }

    pub fn set_mode(&self, mode: ThemeMode) {
        self.state.send_if_modified(|state| {
            if state.mode == mode {
                return false;
            }
            *state = ThemeState::for_mode(mode);
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<ThemeState> {
        self.state.subscribe()
    }
}

impl Default for ThemeProvider {
    fn default() -> Self {
        Self::new()
    }
}
