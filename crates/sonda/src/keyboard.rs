//! Key chords and host-platform modifier naming.
//!
//! The same logical request ("select all", "copy") is spelled `Meta+A` on
//! macOS and `Control+A` elsewhere. Chords may name the `Primary` modifier and
//! let the platform decide; chords that name a concrete modifier are taken
//! literally, so `Meta+A` on Linux is just a key press.

use crate::driver::Modifiers;
use crate::result::{ProbeError, ProbeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Host platform, for modifier naming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// macOS: primary modifier is Meta (Command)
    MacOs,
    /// Windows: primary modifier is Control
    Windows,
    /// Linux and other Unix: primary modifier is Control
    Linux,
}

impl Platform {
    /// Platform the current process runs on
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }

    /// Modifier used for shortcuts such as select-all and copy
    #[must_use]
    pub const fn primary_modifier(self) -> Modifiers {
        match self {
            Self::MacOs => Modifiers::META,
            Self::Windows | Self::Linux => Modifiers::CONTROL,
        }
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MacOs => "macos",
            Self::Windows => "windows",
            Self::Linux => "linux",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Platform {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "macos" | "mac" | "darwin" => Ok(Self::MacOs),
            "windows" | "win" => Ok(Self::Windows),
            "linux" => Ok(Self::Linux),
            other => Err(ProbeError::config(format!("unknown platform '{other}'"))),
        }
    }
}

/// Logical editing request carried by a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditCommand {
    /// Select everything in the focused control
    SelectAll,
    /// Copy the selection
    Copy,
    /// Cut the selection
    Cut,
    /// Paste the clipboard
    Paste,
}

impl EditCommand {
    /// Editing command name understood by Chromium's `Input.dispatchKeyEvent`
    #[must_use]
    pub const fn cdp_name(self) -> &'static str {
        match self {
            Self::SelectAll => "selectAll",
            Self::Copy => "copy",
            Self::Cut => "cut",
            Self::Paste => "paste",
        }
    }
}

/// Modifier as written in a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierKey {
    /// Platform primary modifier (`Primary`, `ControlOrMeta`)
    Primary,
    /// Alt / Option
    Alt,
    /// Control
    Control,
    /// Meta / Command
    Meta,
    /// Shift
    Shift,
}

impl ModifierKey {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "primary" | "controlormeta" | "mod" => Some(Self::Primary),
            "alt" | "option" => Some(Self::Alt),
            "control" | "ctrl" => Some(Self::Control),
            "meta" | "cmd" | "command" => Some(Self::Meta),
            "shift" => Some(Self::Shift),
            _ => None,
        }
    }
}

/// A key plus modifiers, e.g. `Primary+A` or `Shift+Tab`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    modifiers: Vec<ModifierKey>,
    key: String,
    source: String,
}

/// A chord with platform naming applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChord {
    /// Key name
    pub key: String,
    /// Concrete modifiers
    pub modifiers: Modifiers,
    /// Logical command, when the chord is a platform shortcut
    pub command: Option<EditCommand>,
}

impl KeyChord {
    /// Parse chord text such as `Meta+A`, `Primary+C`, `Enter` or `Shift++`
    pub fn parse(chord: &str) -> ProbeResult<Self> {
        let invalid = |message: &str| ProbeError::InvalidKeyChord {
            chord: chord.to_string(),
            message: message.to_string(),
        };
        let trimmed = chord.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty chord"));
        }

        let (prefix, key) = if trimmed == "+" {
            ("", "+")
        } else if let Some(prefix) = trimmed.strip_suffix("++") {
            (prefix, "+")
        } else {
            match trimmed.rsplit_once('+') {
                Some((prefix, key)) => (prefix, key),
                None => ("", trimmed),
            }
        };
        if key.is_empty() {
            return Err(invalid("missing key"));
        }

        let mut modifiers = Vec::new();
        if !prefix.is_empty() {
            for token in prefix.split('+') {
                let modifier = ModifierKey::parse(token.trim())
                    .ok_or_else(|| invalid(&format!("unknown modifier '{token}'")))?;
                modifiers.push(modifier);
            }
        }

        Ok(Self {
            modifiers,
            key: key.to_string(),
            source: trimmed.to_string(),
        })
    }

    /// Key name
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Modifiers as written
    #[must_use]
    pub fn modifier_keys(&self) -> &[ModifierKey] {
        &self.modifiers
    }

    /// Apply platform naming and detect logical shortcuts
    #[must_use]
    pub fn resolve(&self, platform: Platform) -> ResolvedChord {
        let mut modifiers = Modifiers::NONE;
        for modifier in &self.modifiers {
            match modifier {
                ModifierKey::Primary => {
                    let primary = platform.primary_modifier();
                    modifiers.control |= primary.control;
                    modifiers.meta |= primary.meta;
                }
                ModifierKey::Alt => modifiers.alt = true,
                ModifierKey::Control => modifiers.control = true,
                ModifierKey::Meta => modifiers.meta = true,
                ModifierKey::Shift => modifiers.shift = true,
            }
        }

        let command = if modifiers == platform.primary_modifier() {
            match self.key.to_ascii_lowercase().as_str() {
                "a" => Some(EditCommand::SelectAll),
                "c" => Some(EditCommand::Copy),
                "x" => Some(EditCommand::Cut),
                "v" => Some(EditCommand::Paste),
                _ => None,
            }
        } else {
            None
        };

        ResolvedChord {
            key: self.key.clone(),
            modifiers,
            command,
        }
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for KeyChord {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn test_parse_plain_key() {
            let chord = KeyChord::parse("Enter").unwrap();
            assert_eq!(chord.key(), "Enter");
            assert!(chord.modifier_keys().is_empty());
        }

        #[test]
        fn test_parse_modifiers() {
            let chord = KeyChord::parse("Control+Shift+Z").unwrap();
            assert_eq!(chord.key(), "Z");
            assert_eq!(
                chord.modifier_keys(),
                &[ModifierKey::Control, ModifierKey::Shift]
            );
        }

        #[test]
        fn test_parse_plus_key() {
            assert_eq!(KeyChord::parse("+").unwrap().key(), "+");
            let chord = KeyChord::parse("Shift++").unwrap();
            assert_eq!(chord.key(), "+");
            assert_eq!(chord.modifier_keys(), &[ModifierKey::Shift]);
        }

        #[test]
        fn test_parse_errors() {
            assert!(matches!(
                KeyChord::parse(""),
                Err(ProbeError::InvalidKeyChord { .. })
            ));
            assert!(KeyChord::parse("Hyper+A").is_err());
            assert!(KeyChord::parse("Control+").is_err());
        }

        #[test]
        fn test_display_keeps_source() {
            let chord: KeyChord = "Meta+A".parse().unwrap();
            assert_eq!(chord.to_string(), "Meta+A");
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn test_primary_resolves_per_platform() {
            let chord = KeyChord::parse("Primary+A").unwrap();
            let mac = chord.resolve(Platform::MacOs);
            assert!(mac.modifiers.meta && !mac.modifiers.control);
            assert_eq!(mac.command, Some(EditCommand::SelectAll));

            let win = chord.resolve(Platform::Windows);
            assert!(win.modifiers.control && !win.modifiers.meta);
            assert_eq!(win.command, Some(EditCommand::SelectAll));
        }

        #[test]
        fn test_meta_a_is_only_select_all_on_mac() {
            let chord = KeyChord::parse("Meta+A").unwrap();
            assert_eq!(
                chord.resolve(Platform::MacOs).command,
                Some(EditCommand::SelectAll)
            );
            assert_eq!(chord.resolve(Platform::Linux).command, None);
        }

        #[test]
        fn test_copy_cut_paste() {
            let on = |c: &str| KeyChord::parse(c).unwrap().resolve(Platform::Linux).command;
            assert_eq!(on("Control+C"), Some(EditCommand::Copy));
            assert_eq!(on("ControlOrMeta+x"), Some(EditCommand::Cut));
            assert_eq!(on("Ctrl+V"), Some(EditCommand::Paste));
            assert_eq!(on("Control+Shift+C"), None);
            assert_eq!(on("Control+B"), None);
        }
    }

    mod platform_tests {
        use super::*;

        #[test]
        fn test_platform_from_str() {
            assert_eq!("mac".parse::<Platform>().unwrap(), Platform::MacOs);
            assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Windows);
            assert_eq!("linux".parse::<Platform>().unwrap(), Platform::Linux);
            assert!("beos".parse::<Platform>().is_err());
        }

        #[test]
        fn test_platform_serde_name() {
            let json = serde_json::to_string(&Platform::MacOs).unwrap();
            assert_eq!(json, "\"macos\"");
        }
    }
}
