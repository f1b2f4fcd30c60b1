//! Per-artifact result records and the end-of-run summary

use crate::artifact::ArtifactKind;
use crate::error::RegistryError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub ok: bool,
    pub kind: ArtifactKind,
    pub reference: String,
    pub message: String,
    /// Where the artifact landed: the manifest digest, or the upload path for raw repositories
    pub target: Option<String>,
    /// Whether the result shows up in the summary counts
    pub counted: bool,
}

impl SyncResult {
    pub fn success(
        kind: ArtifactKind,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ok: true,
            kind,
            reference: reference.into(),
            message: message.into(),
            target: None,
            counted: true,
        }
    }

    pub fn failure(
        kind: ArtifactKind,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ok: false,
            kind,
            reference: reference.into(),
            message: message.into(),
            target: None,
            counted: true,
        }
    }

    pub fn from_error(
        kind: ArtifactKind,
        reference: impl Into<String>,
        error: &RegistryError,
    ) -> Self {
        Self::failure(kind, reference, error.to_string())
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Exclude from the summary counts
    pub fn uncounted(mut self) -> Self {
        self.counted = false;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    results: Vec<SyncResult>,
}

impl SyncReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: SyncResult) {
        self.results.push(result);
    }

    pub fn extend(&mut self, results: impl IntoIterator<Item = SyncResult>) {
        self.results.extend(results);
    }

    pub fn results(&self) -> &[SyncResult] {
        &self.results
    }

    /// True when every result succeeded
    pub fn ok(&self) -> bool {
        self.results.iter().all(|r| r.ok)
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.ok).count()
    }

    /// Counted results grouped by kind, kinds in first-seen order
    pub fn summary(&self) -> Vec<String> {
        let mut kinds: Vec<ArtifactKind> = Vec::new();
        for result in self.results.iter().filter(|r| r.counted) {
            if !kinds.contains(&result.kind) {
                kinds.push(result.kind);
            }
        }

        let mut lines = Vec::new();
        for kind in kinds {
            let (ok, nok): (Vec<&SyncResult>, Vec<&SyncResult>) = self
                .results
                .iter()
                .filter(|r| r.counted && r.kind == kind)
                .partition(|r| r.ok);
            lines.push(format!("{} - ok:{} nok:{}", kind, ok.len(), nok.len()));
            lines.extend(ok.iter().map(|r| format!(" [OK] - {}", r.reference)));
            lines.extend(
                nok.iter()
                    .map(|r| format!(" [NOK]- {} : {}", r.reference, r.message)),
            );
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_groups_by_kind() {
        let mut report = SyncReport::new();
        report.push(SyncResult::success(ArtifactKind::Chart, "repo - demo:1.0", "pushed"));
        report.push(SyncResult::failure(ArtifactKind::Image, "nginx:1.27", "boom"));
        report.push(SyncResult::success(ArtifactKind::Image, "nginx:latest", "synced"));
        report.push(SyncResult::success(ArtifactKind::Image, "git", "ignored").uncounted());

        assert_eq!(
            report.summary(),
            vec![
                "helm - ok:1 nok:0",
                " [OK] - repo - demo:1.0",
                "image - ok:1 nok:1",
                " [OK] - nginx:latest",
                " [NOK]- nginx:1.27 : boom",
            ]
        );
        assert!(!report.ok());
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn empty_report_is_ok() {
        let report = SyncReport::new();
        assert!(report.ok());
        assert!(report.summary().is_empty());
    }

    #[test]
    fn error_message_is_kept() {
        let err = RegistryError::NotFound("version 9.9 not found for chart demo".into());
        let result = SyncResult::from_error(ArtifactKind::Chart, "r - demo:9.9", &err);
        assert!(!result.ok);
        assert!(result.message.contains("version 9.9 not found"));
    }
}
