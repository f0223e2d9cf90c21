//! Global page side effects owned by a mounted scene.

use std::sync::Arc;

use shared::domain::Abilities;
use tracing::debug;

pub trait PageEffects: Send + Sync {
    fn set_background(&self, color: &str);
    /// Disables the context menu and OS copy shortcuts.
    fn install_copy_protection(&self);
    fn remove_copy_protection(&self);
}

/// Keeps copy protection installed for as long as it is alive.
pub struct CopyProtection {
    page: Arc<dyn PageEffects>,
}

impl CopyProtection {
    pub fn install(page: Arc<dyn PageEffects>) -> Self {
        page.install_copy_protection();
        debug!("copy protection installed");
        Self { page }
    }
}

impl Drop for CopyProtection {
    fn drop(&mut self) {
        self.page.remove_copy_protection();
        debug!("copy protection removed");
    }
}

/// Whether the shared view may be printed or exported to PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintPolicy {
    Unrestricted,
    HiddenInPrint,
}

impl PrintPolicy {
    pub fn for_abilities(abilities: &Abilities) -> Self {
        if abilities.download {
            Self::Unrestricted
        } else {
            Self::HiddenInPrint
        }
    }
}
