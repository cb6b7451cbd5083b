//! Tri-state preference toggles.
//!
//! A `Toggle` mirrors a boolean owned by something else: the OS login items or
//! a flag in the config file. The toggle only ever holds a cached shadow of that
//! boolean; `handle_click` treats it as the expected value of a compare-and-swap
//! against the real source and drops the click when the shadow turns out stale.

use std::fmt;

// ---------------------------------------------------------------------------
// Authoritative source
// ---------------------------------------------------------------------------

/// The external owner of a boolean preference.
///
/// `is_enabled` returning `Err` means the source cannot be queried right now.
pub trait BooleanSource {
    type Error: std::error::Error;

    fn is_enabled(&self) -> Result<bool, Self::Error>;
    fn enable(&mut self) -> Result<(), Self::Error>;
    fn disable(&mut self) -> Result<(), Self::Error>;
}

impl<S: BooleanSource + ?Sized> BooleanSource for Box<S> {
    type Error = S::Error;

    fn is_enabled(&self) -> Result<bool, Self::Error> {
        (**self).is_enabled()
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        (**self).enable()
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        (**self).disable()
    }
}

// ---------------------------------------------------------------------------
// Toggle
// ---------------------------------------------------------------------------

/// Displayed state of a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleState {
    Checked,
    Unchecked,
    /// The source could not be queried. Clicks are ignored until a later
    /// reconciliation reaches the source again.
    Disabled,
}

impl ToggleState {
    fn from_bool(value: bool) -> Self {
        if value {
            ToggleState::Checked
        } else {
            ToggleState::Unchecked
        }
    }

    /// Checkbox rendering used by the menu.
    pub fn mark(self) -> &'static str {
        match self {
            ToggleState::Checked => "[x]",
            ToggleState::Unchecked => "[ ]",
            ToggleState::Disabled => "[-]",
        }
    }
}

impl fmt::Display for ToggleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToggleState::Checked => f.write_str("checked"),
            ToggleState::Unchecked => f.write_str("unchecked"),
            ToggleState::Disabled => f.write_str("disabled"),
        }
    }
}

/// What a click ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The source was written; the toggle now shows the new value.
    Applied(bool),
    /// The displayed state was out of date. Nothing was written.
    Stale { seen: ToggleState, actual: ToggleState },
    /// Reconciliation failed, the toggle is now Disabled. Nothing was written.
    Disabled,
    /// The toggle had no action attached; the click never reached it.
    Detached,
}

/// A checkbox-like menu item bound to a `BooleanSource`.
#[derive(Debug, Clone)]
pub struct Toggle {
    label: String,
    state: ToggleState,
    action_attached: bool,
}

impl Toggle {
    /// New toggles start unchecked with their action attached. Call
    /// `reconcile` before showing one.
    pub fn new(label: impl Into<String>) -> Self {
        Toggle {
            label: label.into(),
            state: ToggleState::Unchecked,
            action_attached: true,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ToggleState {
        self.state
    }

    #[cfg(test)]
    pub fn is_action_attached(&self) -> bool {
        self.action_attached
    }

    /// Overwrites the cached state with what the user last saw on screen.
    ///
    /// Front ends that render and click in separate steps use this so that
    /// `handle_click` compares against the displayed value.
    pub fn set_seen(&mut self, seen: ToggleState) {
        self.state = seen;
    }

    /// Brings the toggle in line with its source.
    ///
    /// An unreachable source disables the toggle and detaches its action. A
    /// reachable one restores the action, so Disabled only lasts until the
    /// source answers again.
    pub fn reconcile<S: BooleanSource + ?Sized>(&mut self, source: &S) {
        match source.is_enabled() {
            Ok(value) => {
                self.state = ToggleState::from_bool(value);
                self.action_attached = true;
            }
            Err(e) => {
                log::warn!("toggle: '{}' source unavailable: {e}", self.label);
                self.state = ToggleState::Disabled;
                self.action_attached = false;
            }
        }
    }

    /// Handles a user click.
    ///
    /// The state held before the click is compared with a fresh reconciliation.
    /// A mismatch means the source changed behind our back: the click is
    /// dropped and the toggle keeps the reconciled state so the next click acts
    /// on correct information. A failed write re-reconciles before returning
    /// the error.
    pub fn handle_click<S: BooleanSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<ClickOutcome, S::Error> {
        if !self.action_attached {
            log::debug!("toggle: '{}' has no action, click ignored", self.label);
            return Ok(ClickOutcome::Detached);
        }

        let seen = self.state;
        self.reconcile(&*source);

        if self.state == ToggleState::Disabled {
            return Ok(ClickOutcome::Disabled);
        }
        if seen != self.state {
            log::info!(
                "toggle: '{}' was {seen} on screen but {} at the source, click dropped",
                self.label,
                self.state
            );
            return Ok(ClickOutcome::Stale {
                seen,
                actual: self.state,
            });
        }

        let value = self.state != ToggleState::Checked;
        let written = if value {
            source.enable()
        } else {
            source.disable()
        };
        if let Err(e) = written {
            self.reconcile(&*source);
            return Err(e);
        }

        self.state = ToggleState::from_bool(value);
        log::info!("toggle: '{}' set to {}", self.label, self.state);
        Ok(ClickOutcome::Applied(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
