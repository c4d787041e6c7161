use crate::{mode::Mode, user_config::UserConfig};

/// The user's in-progress choice in the picker. Discarded on restart; the
/// only durable state is the property itself.
#[derive(Clone, Copy, Debug)]
pub struct Selection {
    mode: Mode,
    touched: bool,
    applied: bool,
}

impl Selection {
    /// Seed from the persisted value. Absent or unknown values fall back
    /// the same way the backend's parser does.
    pub fn from_persisted(persisted: Option<&str>, fallback: Mode) -> Self {
        let mode = persisted.and_then(Mode::parse).unwrap_or(fallback);
        Self {
            mode,
            touched: false,
            applied: false,
        }
    }

    pub fn select(&mut self, mode: Mode) {
        self.mode = mode;
        self.touched = true;
        self.applied = false;
    }

    pub fn mark_applied(&mut self) {
        self.applied = true;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// True once the user has picked something, even if it equals the
    /// seeded value.
    pub fn touched(&self) -> bool {
        self.touched
    }

    pub fn applied(&self) -> bool {
        self.applied
    }
}

#[derive(Clone, Debug, Default)]
pub struct InfoState {
    /// Raw persisted value, echoed even when it is not a valid mode.
    pub current_mode: Option<String>,
    /// Last mode pushed through the store by this process.
    pub last_applied: Option<Mode>,
    pub last_apply_error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct SharedState {
    pub config: UserConfig,
    pub config_rev: u64,
    pub last_config_error: Option<String>,

    pub info: InfoState,
    pub selection: Selection,
}

impl SharedState {
    pub fn new(config: UserConfig) -> Self {
        let selection = Selection::from_persisted(None, config.default_mode);
        Self {
            config,
            config_rev: 0,
            last_config_error: None,
            info: InfoState::default(),
            selection,
        }
    }
}
