//! Pipeline diagnostic dump: writes intermediate artifacts to disk.
//!
//! Disabled unless `AnalysisConfig::dump_dir` is set (`CLINIVISION_DUMP_DIR`).
//! The dump contains prompts and model output, so it is for operator
//! debugging on trusted machines only. Image bytes are never written.
//!
//! **Output structure**:
//! ```text
//! {dump_dir}/{run_id}/
//!   01-prompt.txt
//!   02-raw-response.txt
//!   03-attempts.json
//!   04-aggregate.json | 04-prognosis.json
//! ```

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Returns the dump directory for a run, or `None` if diagnostics are disabled.
///
/// Creates the directory tree. Returns `None` (with a warning) if creation
/// fails; never panics, never blocks the pipeline.
pub fn dump_dir_for(base: Option<&Path>, run_id: &Uuid) -> Option<PathBuf> {
    let dir = base?.join(run_id.to_string());

    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "Diagnostic dump: failed to create directory"
        );
        return None;
    }

    Some(dir)
}

/// Write a JSON artifact (any serde-serializable value), pretty-printed.
///
/// Never panics.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    match serde_json::to_string_pretty(value) {
        Ok(json) => match std::fs::write(&path, json.as_bytes()) {
            Ok(()) => tracing::debug!(
                path = %path.display(),
                size = json.len(),
                "Diagnostic dump: JSON written"
            ),
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Diagnostic dump: failed to write JSON"
            ),
        },
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to serialize JSON"
        ),
    }
}

/// Write a text artifact (prompt, raw model response).
///
/// Never panics.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    let path = dir.join(filename);
    match std::fs::write(&path, text.as_bytes()) {
        Ok(()) => tracing::debug!(
            path = %path.display(),
            size = text.len(),
            "Diagnostic dump: text written"
        ),
        Err(e) => tracing::warn!(
            path = %path.display(),
            error = %e,
            "Diagnostic dump: failed to write text"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_base_dir() {
        assert!(dump_dir_for(None, &Uuid::new_v4()).is_none());
    }

    #[test]
    fn creates_run_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let dir = dump_dir_for(Some(tmp.path()), &run_id).unwrap();

        assert!(dir.exists());
        assert!(dir.ends_with(run_id.to_string()));
        assert!(dir.starts_with(tmp.path()));
    }

    #[test]
    fn uncreatable_directory_disables_dump() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(dump_dir_for(Some(&file), &Uuid::new_v4()).is_none());
    }

    #[test]
    fn dump_json_writes_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();

        #[derive(serde::Serialize)]
        struct Attempt {
            model: String,
            outcome: String,
        }

        let attempts = vec![Attempt {
            model: "gemini-2.5-pro".into(),
            outcome: "success".into(),
        }];
        dump_json(tmp.path(), "03-attempts.json", &attempts);

        let content = std::fs::read_to_string(tmp.path().join("03-attempts.json")).unwrap();
        assert!(content.contains("\"model\": \"gemini-2.5-pro\""));
        assert!(content.contains('\n'));
    }

    #[test]
    fn dump_text_writes_text() {
        let tmp = tempfile::tempdir().unwrap();
        dump_text(tmp.path(), "01-prompt.txt", "Analise a imagem");

        let content = std::fs::read_to_string(tmp.path().join("01-prompt.txt")).unwrap();
        assert_eq!(content, "Analise a imagem");
    }

    #[test]
    fn write_failures_do_not_panic() {
        let bad_dir = Path::new("/nonexistent/path/that/does/not/exist");
        dump_text(bad_dir, "01-prompt.txt", "data");
        dump_json(bad_dir, "03-attempts.json", &"data");
    }
}
