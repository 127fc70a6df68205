use std::{collections::BTreeMap, fmt};

use crate::{ImageReference, Platform};

/// Default process of an image: docker `Entrypoint` and `Cmd`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCommand {
    /// Entrypoint tokens.
    pub command: Vec<String>,
    /// Default argument tokens.
    pub args: Vec<String>,
}

impl fmt::Display for ImageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command={:?} args={:?}",
            self.command.join(" "),
            self.args.join(" ")
        )
    }
}

/// Resolved image metadata, keyed per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub reference: ImageReference,
    /// Canonical name (`docker.io/library/alpine:3.12`).
    pub name: String,
    /// Digest of the top-level manifest or index.
    pub digest: String,
    /// `"{os}/{arch}"` -> default command.
    pub commands: BTreeMap<String, ImageCommand>,
}

impl ImageInfo {
    pub fn new(reference: ImageReference, digest: impl Into<String>) -> Self {
        Self {
            name: reference.to_string(),
            reference,
            digest: digest.into(),
            commands: BTreeMap::new(),
        }
    }

    /// Records the default command for `os/arch`, replacing an earlier entry.
    pub fn add_command(&mut self, os: &str, arch: &str, command: Vec<String>, args: Vec<String>) {
        self.commands
            .insert(format!("{os}/{arch}"), ImageCommand { command, args });
    }

    pub fn command_for(&self, platform: &Platform) -> Option<&ImageCommand> {
        self.commands.get(&platform.key())
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }
}
