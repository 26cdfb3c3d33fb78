//! Subscriber installation

use std::sync::OnceLock;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output style for the global subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, core at debug
    Development,
    /// One JSON object per event, core at info
    Production,
    /// In-memory capture for assertions
    Test,
}

impl Profile {
    /// Filter used when `RUST_LOG` is unset or unparsable
    pub fn default_directive(self) -> &'static str {
        match self {
            Profile::Development | Profile::Test => "arbor_core=debug",
            Profile::Production => "arbor_core=info",
        }
    }

    fn env_filter(self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

static ACTIVE: OnceLock<Profile> = OnceLock::new();

/// Install the global subscriber for `profile`
///
/// The first call wins and its profile is returned from every later call.
/// A subscriber installed by the host beforehand is left in place.
///
/// ```
/// use arbor_core::logging_facility::{init, Profile};
///
/// let active = init(Profile::Development);
/// assert_eq!(init(Profile::Production), active);
/// ```
pub fn init(profile: Profile) -> Profile {
    *ACTIVE.get_or_init(|| {
        match profile {
            Profile::Development => {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(profile.env_filter())
                    .try_init();
            }
            Profile::Production => {
                let _ = tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(profile.env_filter())
                    .try_init();
            }
            Profile::Test => {
                super::init_test_capture();
            }
        }
        profile
    })
}

/// Profile installed by [`init`], if it has run
pub fn active_profile() -> Option<Profile> {
    ACTIVE.get().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_profile_wins() {
        let first = init(Profile::Test);
        assert_eq!(init(Profile::Production), first);
        assert_eq!(active_profile(), Some(first));
    }

    #[test]
    fn test_default_directives() {
        assert_eq!(Profile::Production.default_directive(), "arbor_core=info");
        assert_eq!(Profile::Development.default_directive(), "arbor_core=debug");
    }
}
