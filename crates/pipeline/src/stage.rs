//! Pipeline stages and skip policy.

use serde::{Deserialize, Serialize};

/// The fixed per-layer stage sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Download,
    Encode,
    BuildArchive,
    Explode,
    Publish,
}

impl Stage {
    /// Stages in execution order.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::Download,
        Stage::Encode,
        Stage::BuildArchive,
        Stage::Explode,
        Stage::Publish,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Download => "DOWNLOAD",
            Stage::Encode => "ENCODE",
            Stage::BuildArchive => "BUILD_ARCHIVE",
            Stage::Explode => "EXPLODE",
            Stage::Publish => "PUBLISH",
        };
        write!(f, "{}", s)
    }
}

/// Which stages may be bypassed when their output artifact already exists.
///
/// A skip flag alone never bypasses a stage: the artifact must also exist,
/// so a skip flag cannot mask a hole in the artifact chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipPolicy {
    pub download: bool,
    pub encode: bool,
    pub build_archive: bool,
    pub explode: bool,
    pub publish: bool,
}

impl SkipPolicy {
    /// Never skip anything (every stage re-runs).
    pub fn none() -> Self {
        Self::default()
    }

    /// Skip every stage whose artifact exists (full resume).
    pub fn all() -> Self {
        Self {
            download: true,
            encode: true,
            build_archive: true,
            explode: true,
            publish: true,
        }
    }

    pub fn allows_skip(&self, stage: Stage) -> bool {
        match stage {
            Stage::Download => self.download,
            Stage::Encode => self.encode,
            Stage::BuildArchive => self.build_archive,
            Stage::Explode => self.explode,
            Stage::Publish => self.publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_order() {
        assert_eq!(Stage::SEQUENCE.first(), Some(&Stage::Download));
        assert_eq!(Stage::SEQUENCE.last(), Some(&Stage::Publish));
        assert_eq!(Stage::SEQUENCE.len(), 5);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Stage::BuildArchive.to_string(), "BUILD_ARCHIVE");
        assert_eq!(Stage::Publish.to_string(), "PUBLISH");
    }

    #[test]
    fn test_skip_policy() {
        assert!(!SkipPolicy::none().allows_skip(Stage::Encode));
        assert!(SkipPolicy::all().allows_skip(Stage::Publish));

        let partial = SkipPolicy {
            encode: true,
            ..SkipPolicy::none()
        };
        assert!(partial.allows_skip(Stage::Encode));
        assert!(!partial.allows_skip(Stage::Download));
    }
}
