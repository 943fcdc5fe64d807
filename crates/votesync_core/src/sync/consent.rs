//! Upload consent decision.

/// User decision on whether votes may leave the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConsentState {
    /// No decision yet; the consent prompt is pending.
    #[default]
    Unset,
    Granted,
    Denied,
}

impl ConsentState {
    /// Maps the persisted tri-state flag.
    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(true) => Self::Granted,
            Some(false) => Self::Denied,
        }
    }

    pub fn as_flag(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::Granted => Some(true),
            Self::Denied => Some(false),
        }
    }

    pub fn from_decision(allowed: bool) -> Self {
        if allowed {
            Self::Granted
        } else {
            Self::Denied
        }
    }

    /// Whether uploads may run.
    pub fn allows_upload(self) -> bool {
        self == Self::Granted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Granted => "granted",
            Self::Denied => "denied",
        }
    }
}
