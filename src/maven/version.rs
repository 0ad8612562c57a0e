//! Step applicability and toolchain version selection

use crate::error::{Result, StepError};
use crate::request::{BuildKind, BuildRequest};
use std::fmt;
use tracing::debug;

/// Option key selecting the toolchain version
pub const VERSION_OPTION: &str = "from";

pub const DEFAULT_VERSION: MavenVersion = MavenVersion::V17;

/// Supported JDK toolchains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MavenVersion {
    V17,
    V21,
}

impl MavenVersion {
    pub const ALL: [MavenVersion; 2] = [MavenVersion::V17, MavenVersion::V21];

    /// Token used in build options and recipe file names
    pub fn token(&self) -> &'static str {
        match self {
            MavenVersion::V17 => "v17",
            MavenVersion::V21 => "v21",
        }
    }

    /// Numeric JDK release, used in image names
    pub fn release(&self) -> &'static str {
        &self.token()[1..]
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.token() == token)
    }

    pub fn supported_tokens() -> String {
        Self::ALL
            .iter()
            .map(MavenVersion::token)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Raw version token requested, falling back to the default
pub fn requested_version(request: &BuildRequest) -> &str {
    request
        .options
        .string(VERSION_OPTION)
        .unwrap_or(DEFAULT_VERSION.token())
}

/// Resolves the toolchain version for `request`.
///
/// An unsupported token is a configuration error: there is no recipe to
/// build it with.
pub fn resolve_version(request: &BuildRequest) -> Result<MavenVersion> {
    let token = requested_version(request);
    let version =
        MavenVersion::from_token(token).ok_or_else(|| StepError::UnsupportedVersion {
            version: token.to_string(),
            supported: MavenVersion::supported_tokens(),
        })?;
    debug!(version = %version, "Resolved maven version");
    Ok(version)
}

/// Whether the Maven steps apply to `request`
pub fn matches(request: &BuildRequest) -> bool {
    request.kind == BuildKind::Maven
        && MavenVersion::from_token(requested_version(request)).is_some()
}
