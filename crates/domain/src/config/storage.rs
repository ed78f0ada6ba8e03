use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// File-backed storage (C1, C2)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Root directories for the file-backed entity repositories (C2) and the
/// content-addressed blob store (C1). Every entity kind gets a JSON file
/// under `data_dir`; every uploaded blob gets a sha256-named file under
/// `blob_dir` plus an index entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_blob_dir")]
    pub blob_dir: String,
    /// Maximum single-file upload size accepted by the file store.
    #[serde(default = "d_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: d_data_dir(),
            blob_dir: d_blob_dir(),
            max_upload_bytes: d_max_upload_bytes(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_data_dir() -> String {
    "./data/store".into()
}
fn d_blob_dir() -> String {
    "./data/blobs".into()
}
fn d_max_upload_bytes() -> u64 {
    20 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dirs_are_distinct() {
        let cfg = StorageConfig::default();
        assert_ne!(cfg.data_dir, cfg.blob_dir);
    }
}
