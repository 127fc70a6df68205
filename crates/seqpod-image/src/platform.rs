use std::{fmt, str::FromStr};

/// Target OS/architecture pair, rendered as `"{os}/{arch}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// Key under which image commands for this platform are stored.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::new("linux", "amd64")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

impl FromStr for Platform {
    type Err = String;

    /// Accepts `os/arch` and ignores a trailing variant (`linux/arm/v7`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split('/');
        match (parts.next(), parts.next()) {
            (Some(os), Some(arch)) if !os.is_empty() && !arch.is_empty() => {
                Ok(Platform::new(os, arch))
            }
            _ => Err(format!("invalid platform {s:?} (expected os/arch)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_linux_amd64() {
        assert_eq!(Platform::default().key(), "linux/amd64");
    }

    #[test]
    fn parse_platform() {
        assert_eq!("linux/arm64".parse::<Platform>().unwrap(), Platform::new("linux", "arm64"));
        assert_eq!("linux/arm/v7".parse::<Platform>().unwrap().key(), "linux/arm");
        assert!("linux".parse::<Platform>().is_err());
        assert!("/amd64".parse::<Platform>().is_err());
    }
}
