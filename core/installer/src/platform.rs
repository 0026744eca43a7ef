//! Platform detection and normalization.
//!
//! Raw kernel names (`uname -s`, `uname -m`) are mapped onto a canonical
//! vocabulary so that a host can be matched against the platform keys of a
//! release, e.g. `linux-amd64` or `darwin-arm64`.
//!
//! ## Normalization
//!
//! | raw                         | canonical |
//! |-----------------------------|-----------|
//! | `msys_nt*`, `mingw*`        | `windows` |
//! | `x86_64`                    | `amd64`   |
//! | `x86`, `i686`, `i386`       | `386`     |
//! | `aarch64`                   | `arm64`   |
//! | `armv5*`, `armv6*`, `armv7*`| `armv5`, `armv6`, `armv7` |
//!
//! Every other value passes through unchanged and must then be one of the
//! supported tokens.

use std::fmt;

use crate::errors::InstallError;

/// Canonical operating system token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Darwin,
    Dragonfly,
    Freebsd,
    Linux,
    Android,
    Nacl,
    Netbsd,
    Openbsd,
    Plan9,
    Solaris,
    Windows,
}

impl Os {
    /// All supported operating systems.
    pub const ALL: [Os; 11] = [
        Os::Darwin,
        Os::Dragonfly,
        Os::Freebsd,
        Os::Linux,
        Os::Android,
        Os::Nacl,
        Os::Netbsd,
        Os::Openbsd,
        Os::Plan9,
        Os::Solaris,
        Os::Windows,
    ];

    /// Returns the token used in platform keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Dragonfly => "dragonfly",
            Os::Freebsd => "freebsd",
            Os::Linux => "linux",
            Os::Android => "android",
            Os::Nacl => "nacl",
            Os::Netbsd => "netbsd",
            Os::Openbsd => "openbsd",
            Os::Plan9 => "plan9",
            Os::Solaris => "solaris",
            Os::Windows => "windows",
        }
    }

    /// Looks up an already normalized token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|os| os.as_str() == token)
    }
}

/// Canonical CPU architecture token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    I386,
    Amd64,
    Arm64,
    Armv5,
    Armv6,
    Armv7,
    Ppc64,
    Ppc64le,
    Mips,
    Mipsle,
    Mips64,
    Mips64le,
    S390x,
    Amd64p32,
}

impl Arch {
    /// All supported architectures.
    pub const ALL: [Arch; 14] = [
        Arch::I386,
        Arch::Amd64,
        Arch::Arm64,
        Arch::Armv5,
        Arch::Armv6,
        Arch::Armv7,
        Arch::Ppc64,
        Arch::Ppc64le,
        Arch::Mips,
        Arch::Mipsle,
        Arch::Mips64,
        Arch::Mips64le,
        Arch::S390x,
        Arch::Amd64p32,
    ];

    /// Returns the token used in platform keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::I386 => "386",
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::Armv5 => "armv5",
            Arch::Armv6 => "armv6",
            Arch::Armv7 => "armv7",
            Arch::Ppc64 => "ppc64",
            Arch::Ppc64le => "ppc64le",
            Arch::Mips => "mips",
            Arch::Mipsle => "mipsle",
            Arch::Mips64 => "mips64",
            Arch::Mips64le => "mips64le",
            Arch::S390x => "s390x",
            Arch::Amd64p32 => "amd64p32",
        }
    }

    /// Looks up an already normalized token.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|arch| arch.as_str() == token)
    }
}

/// Lowercases a raw OS name and folds the MSYS/MinGW variants into `windows`.
#[must_use]
pub fn normalize_os(raw: &str) -> String {
    let os = raw.trim().to_lowercase();
    if os.starts_with("msys_nt") || os.starts_with("mingw") {
        return "windows".to_string();
    }
    os
}

/// Maps a raw machine name onto its canonical architecture spelling.
#[must_use]
pub fn normalize_arch(raw: &str) -> String {
    let arch = raw.trim();
    match arch {
        "x86_64" => "amd64".to_string(),
        "x86" | "i686" | "i386" => "386".to_string(),
        "aarch64" => "arm64".to_string(),
        a if a.starts_with("armv5") => "armv5".to_string(),
        a if a.starts_with("armv6") => "armv6".to_string(),
        a if a.starts_with("armv7") => "armv7".to_string(),
        other => other.to_string(),
    }
}

/// Raw host identification as reported by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    /// Raw OS name, e.g. `Linux` or `MINGW64_NT-10.0`.
    pub os: String,
    /// Raw machine name, e.g. `x86_64` or `armv7l`.
    pub arch: String,
}

impl HostInfo {
    /// Creates host information from raw strings.
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Reads the raw names of the running host.
    ///
    /// On Unix this calls `uname(2)`, matching what `uname -s` and `uname -m`
    /// print. Elsewhere the compile-time target constants are used.
    ///
    /// # Errors
    ///
    /// Returns an error if `uname(2)` fails.
    #[cfg(unix)]
    pub fn detect() -> std::io::Result<Self> {
        let uts = nix::sys::utsname::uname().map_err(std::io::Error::from)?;
        Ok(Self::new(
            uts.sysname().to_string_lossy(),
            uts.machine().to_string_lossy(),
        ))
    }

    /// Reads the raw names of the running host.
    ///
    /// # Errors
    ///
    /// Never fails on this target.
    #[cfg(not(unix))]
    #[allow(clippy::unnecessary_wraps)]
    pub fn detect() -> std::io::Result<Self> {
        Ok(Self::new(std::env::consts::OS, std::env::consts::ARCH))
    }
}

/// A canonical `(os, arch)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Normalizes raw host names and checks them against the supported sets.
    ///
    /// The OS is checked before the architecture, so a host that is wrong on
    /// both counts reports [`InstallError::UnsupportedOs`].
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::UnsupportedOs`] or [`InstallError::UnsupportedArch`]
    /// naming both the raw and the normalized value.
    pub fn from_host(host: &HostInfo) -> Result<Self, InstallError> {
        let os_token = normalize_os(&host.os);
        let os = Os::from_token(&os_token).ok_or_else(|| InstallError::UnsupportedOs {
            raw: host.os.clone(),
            normalized: os_token.clone(),
        })?;

        let arch_token = normalize_arch(&host.arch);
        let arch = Arch::from_token(&arch_token).ok_or_else(|| InstallError::UnsupportedArch {
            raw: host.arch.clone(),
            normalized: arch_token.clone(),
        })?;

        Ok(Self { os, arch })
    }

    /// Returns the platform key, e.g. `linux-amd64`.
    #[must_use]
    pub fn key(self) -> String {
        format!("{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.as_str(), self.arch.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_os_lowercases() {
        assert_eq!(normalize_os("Linux"), "linux");
        assert_eq!(normalize_os("Darwin"), "darwin");
        assert_eq!(normalize_os("FreeBSD"), "freebsd");
    }

    #[test]
    fn normalize_os_folds_msys_and_mingw() {
        assert_eq!(normalize_os("MSYS_NT-10.0-19045"), "windows");
        assert_eq!(normalize_os("MINGW64_NT-10.0-19045"), "windows");
        assert_eq!(normalize_os("mingw32"), "windows");
    }

    #[test]
    fn normalize_arch_table() {
        let cases = [
            ("x86_64", "amd64"),
            ("x86", "386"),
            ("i686", "386"),
            ("i386", "386"),
            ("aarch64", "arm64"),
            ("armv5tel", "armv5"),
            ("armv6l", "armv6"),
            ("armv7l", "armv7"),
            ("arm64", "arm64"),
            ("s390x", "s390x"),
            ("riscv64", "riscv64"),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_arch(raw), expected, "normalizing {raw}");
        }
    }

    #[test]
    fn from_host_accepts_common_hosts() {
        let linux = Platform::from_host(&HostInfo::new("Linux", "x86_64")).unwrap();
        assert_eq!(linux.key(), "linux-amd64");

        let mac = Platform::from_host(&HostInfo::new("Darwin", "arm64")).unwrap();
        assert_eq!(mac.key(), "darwin-arm64");

        let pi = Platform::from_host(&HostInfo::new("Linux", "armv7l")).unwrap();
        assert_eq!(pi.key(), "linux-armv7");

        let git_bash = Platform::from_host(&HostInfo::new("MINGW64_NT-10.0", "x86_64")).unwrap();
        assert_eq!(git_bash.key(), "windows-amd64");
    }

    #[test]
    fn from_host_rejects_unknown_os() {
        let err = Platform::from_host(&HostInfo::new("Haiku", "x86_64")).unwrap_err();
        match err {
            InstallError::UnsupportedOs { raw, normalized } => {
                assert_eq!(raw, "Haiku");
                assert_eq!(normalized, "haiku");
            }
            other => panic!("expected UnsupportedOs, got {other:?}"),
        }
    }

    #[test]
    fn from_host_rejects_unknown_arch() {
        let err = Platform::from_host(&HostInfo::new("Linux", "riscv64")).unwrap_err();
        match err {
            InstallError::UnsupportedArch { raw, normalized } => {
                assert_eq!(raw, "riscv64");
                assert_eq!(normalized, "riscv64");
            }
            other => panic!("expected UnsupportedArch, got {other:?}"),
        }
    }

    #[test]
    fn os_is_checked_before_arch() {
        let err = Platform::from_host(&HostInfo::new("Haiku", "riscv64")).unwrap_err();
        assert!(matches!(err, InstallError::UnsupportedOs { .. }));
    }

    #[test]
    fn every_token_round_trips_through_from_token() {
        for os in Os::ALL {
            assert_eq!(Os::from_token(os.as_str()), Some(os));
        }
        for arch in Arch::ALL {
            assert_eq!(Arch::from_token(arch.as_str()), Some(arch));
        }
    }

    #[test]
    fn display_matches_key() {
        let platform = Platform {
            os: Os::Windows,
            arch: Arch::I386,
        };
        assert_eq!(platform.to_string(), platform.key());
        assert_eq!(platform.key(), "windows-386");
    }

    #[test]
    fn detect_reports_non_empty_names() {
        let host = HostInfo::detect().expect("host detection should succeed");
        assert!(!host.os.is_empty());
        assert!(!host.arch.is_empty());
    }
}
