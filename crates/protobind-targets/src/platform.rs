//! Platform identifiers and the build policy derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// A build target platform.
///
/// Only [`Platform::Win64`] and [`Platform::Linux`] have a bundled
/// schema compiler and native library layout. The others parse so that an
/// unported target fails with a configuration error instead of an unknown
/// identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Win64,
    Linux,
    LinuxArm64,
    Mac,
    Android,
    #[serde(rename = "IOS")]
    Ios,
}

/// Platform family. Selects library layout, linkage mode, and default dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformFamily {
    /// Static import libraries plus DLLs deployed beside the binary.
    Windows,
    /// Shared objects used both at link time and at run time.
    Unix,
}

/// How the third-party headers declare their exported symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkageMode {
    /// Symbols are declared `__declspec(dllimport)`.
    DllImport,
    /// Export macros expand to nothing.
    Neutral,
}

/// Which compiler family's warning pragmas wrap generated sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PragmaDialect {
    /// `#pragma warning(push/pop)`.
    Msvc,
    /// `#pragma GCC diagnostic push/pop`, understood by GCC and Clang.
    Gnu,
    /// Both dialects behind compiler-detection guards.
    Portable,
}

impl Platform {
    /// All known platforms, in display order.
    pub const ALL: [Platform; 6] = [
        Platform::Win64,
        Platform::Linux,
        Platform::LinuxArm64,
        Platform::Mac,
        Platform::Android,
        Platform::Ios,
    ];

    /// Canonical folder name used in the library and program layouts.
    pub fn folder_name(self) -> &'static str {
        match self {
            Platform::Win64 => "Win64",
            Platform::Linux => "Linux",
            Platform::LinuxArm64 => "LinuxArm64",
            Platform::Mac => "Mac",
            Platform::Android => "Android",
            Platform::Ios => "IOS",
        }
    }

    /// The platform family, or `None` for unported platforms.
    pub fn family(self) -> Option<PlatformFamily> {
        match self {
            Platform::Win64 => Some(PlatformFamily::Windows),
            Platform::Linux => Some(PlatformFamily::Unix),
            _ => None,
        }
    }

    /// The platform family, failing with a configuration error for unported platforms.
    pub fn require_family(self) -> Result<PlatformFamily> {
        self.family().ok_or_else(|| TargetError::UnsupportedPlatform {
            platform: self.to_string(),
        })
    }

    /// Whether generation and native resolution are supported.
    pub fn is_supported(self) -> bool {
        self.family().is_some()
    }

    /// Map the compiling host to a platform, if it corresponds to one.
    pub fn host() -> Option<Platform> {
        match (std::env::consts::OS, std::env::consts::ARCH) {
            ("windows", "x86_64") => Some(Platform::Win64),
            ("linux", "x86_64") => Some(Platform::Linux),
            ("linux", "aarch64") => Some(Platform::LinuxArm64),
            ("macos", _) => Some(Platform::Mac),
            ("android", _) => Some(Platform::Android),
            ("ios", _) => Some(Platform::Ios),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

impl FromStr for Platform {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "win64" | "windows" | "windows-x86_64" => Ok(Platform::Win64),
            "linux" | "linux-x86_64" => Ok(Platform::Linux),
            "linuxarm64" | "linux-arm64" | "linux-aarch64" => Ok(Platform::LinuxArm64),
            "mac" | "macos" => Ok(Platform::Mac),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            _ => Err(TargetError::UnknownPlatform { name: s.to_string() }),
        }
    }
}

impl PlatformFamily {
    /// Linkage mode the third-party headers must be compiled with.
    pub fn linkage(self) -> LinkageMode {
        match self {
            PlatformFamily::Windows => LinkageMode::DllImport,
            PlatformFamily::Unix => LinkageMode::Neutral,
        }
    }

    /// Default pragma dialect for sources compiled on this family.
    pub fn default_dialect(self) -> PragmaDialect {
        match self {
            PlatformFamily::Windows => PragmaDialect::Msvc,
            PlatformFamily::Unix => PragmaDialect::Gnu,
        }
    }

    /// Extension of libraries passed to the linker.
    pub fn link_extension(self) -> &'static str {
        match self {
            PlatformFamily::Windows => "lib",
            PlatformFamily::Unix => "so",
        }
    }

    /// Extension of libraries that must be deployed next to the binary.
    pub fn runtime_extension(self) -> &'static str {
        match self {
            PlatformFamily::Windows => "dll",
            PlatformFamily::Unix => "so",
        }
    }
}

impl fmt::Display for PragmaDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PragmaDialect::Msvc => "msvc",
            PragmaDialect::Gnu => "gnu",
            PragmaDialect::Portable => "portable",
        })
    }
}

impl FromStr for PragmaDialect {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "msvc" => Ok(PragmaDialect::Msvc),
            "gnu" | "gcc" | "clang" => Ok(PragmaDialect::Gnu),
            "portable" => Ok(PragmaDialect::Portable),
            _ => Err(TargetError::UnknownDialect { name: s.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("win64".parse::<Platform>().unwrap(), Platform::Win64);
        assert_eq!("Windows".parse::<Platform>().unwrap(), Platform::Win64);
        assert_eq!("LINUX".parse::<Platform>().unwrap(), Platform::Linux);
        assert_eq!("linux-aarch64".parse::<Platform>().unwrap(), Platform::LinuxArm64);
        assert_eq!("ios".parse::<Platform>().unwrap(), Platform::Ios);
        assert!("amiga".parse::<Platform>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for platform in Platform::ALL {
            let parsed: Platform = platform.to_string().parse().unwrap();
            assert_eq!(parsed, platform);
        }
    }

    #[test]
    fn only_win64_and_linux_are_supported() {
        assert_eq!(Platform::Win64.family(), Some(PlatformFamily::Windows));
        assert_eq!(Platform::Linux.family(), Some(PlatformFamily::Unix));
        for platform in [Platform::LinuxArm64, Platform::Mac, Platform::Android, Platform::Ios] {
            assert!(!platform.is_supported());
            let err = platform.require_family().unwrap_err();
            assert!(matches!(err, TargetError::UnsupportedPlatform { .. }));
        }
    }

    #[test]
    fn family_policy() {
        let win = PlatformFamily::Windows;
        assert_eq!(win.linkage(), LinkageMode::DllImport);
        assert_eq!(win.default_dialect(), PragmaDialect::Msvc);
        assert_eq!(win.link_extension(), "lib");
        assert_eq!(win.runtime_extension(), "dll");

        let unix = PlatformFamily::Unix;
        assert_eq!(unix.linkage(), LinkageMode::Neutral);
        assert_eq!(unix.default_dialect(), PragmaDialect::Gnu);
        assert_eq!(unix.link_extension(), unix.runtime_extension());
    }

    #[test]
    fn dialect_parse() {
        assert_eq!("MSVC".parse::<PragmaDialect>().unwrap(), PragmaDialect::Msvc);
        assert_eq!("clang".parse::<PragmaDialect>().unwrap(), PragmaDialect::Gnu);
        assert_eq!("portable".parse::<PragmaDialect>().unwrap(), PragmaDialect::Portable);
        assert!("icc".parse::<PragmaDialect>().is_err());
    }

    #[test]
    fn serde_uses_folder_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            platform: Platform,
            dialect: PragmaDialect,
        }
        let text = toml::to_string(&Wrapper {
            platform: Platform::Ios,
            dialect: PragmaDialect::Portable,
        })
        .unwrap();
        assert!(text.contains("platform = \"IOS\""));
        assert!(text.contains("dialect = \"portable\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.platform, Platform::Ios);
    }
}
