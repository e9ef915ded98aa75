//! Manifest rendering.
//!
//! One template file, one placeholder. Rendering substitutes the instance
//! name and writes the result to a per-instance file that the apply/delete
//! tool is pointed at.

use std::path::PathBuf;

use crate::error::ApplyError;

/// Placeholder token replaced with the instance name.
pub const NAME_PLACEHOLDER: &str = "<vmName>";

/// Renders the manifest template into per-instance manifest files.
pub struct ManifestRenderer {
    template_path: PathBuf,
    output_dir: PathBuf,
}

impl ManifestRenderer {
    pub fn new(template_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_path: template_path.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Path of the rendered manifest for `name`, whether or not it has been
    /// written yet. Delete targets the same path apply produced.
    pub fn manifest_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}.yaml"))
    }

    /// Read the template and substitute every placeholder occurrence.
    pub async fn render(&self, name: &str) -> Result<String, ApplyError> {
        let template = tokio::fs::read_to_string(&self.template_path)
            .await
            .map_err(|e| ApplyError::Template {
                path: self.template_path.clone(),
                source: e,
            })?;
        Ok(template.replace(NAME_PLACEHOLDER, name))
    }

    /// Write a rendered manifest, returning the path it landed at.
    pub async fn write(&self, name: &str, contents: &str) -> Result<PathBuf, ApplyError> {
        let path = self.manifest_path(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| ApplyError::Write {
                path: path.clone(),
                source: e,
            })?;
        Ok(path)
    }
}
