//! Model weights bootstrap.
//!
//! The detector model is loaded once at process start. When the weights file
//! is missing and a download URL is configured, it is fetched first
//! (feature: fetch-weights). Partial downloads never replace the target file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

/// Make sure the weights file exists, downloading it when possible.
pub fn ensure_weights(path: &Path, url: Option<&str>) -> Result<PathBuf> {
    if path.is_file() {
        log::debug!("model weights present at {}", path.display());
        return Ok(path.to_path_buf());
    }
    let Some(url) = url.map(str::trim).filter(|url| !url.is_empty()) else {
        return Err(anyhow!(
            "model weights not found at {} and no download URL configured",
            path.display()
        ));
    };
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(anyhow!("model URL must be http(s): {}", url));
    }
    log::info!("downloading model weights from {} ...", url);
    download(url, path)?;
    log::info!("model weights saved to {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(feature = "fetch-weights")]
fn download(url: &str, path: &Path) -> Result<()> {
    use anyhow::Context;
    use std::fs;
    use std::io;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create model directory {}", parent.display()))?;
    }
    let partial = path.with_extension("part");
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch model weights from {}", url))?;
    let mut reader = response.into_reader();
    let mut file = fs::File::create(&partial)
        .with_context(|| format!("create {}", partial.display()))?;
    let copied = io::copy(&mut reader, &mut file).context("write model weights")?;
    if copied == 0 {
        let _ = fs::remove_file(&partial);
        return Err(anyhow!("model download from {} was empty", url));
    }
    file.sync_all().context("flush model weights")?;
    fs::rename(&partial, path)
        .with_context(|| format!("move weights into {}", path.display()))?;
    Ok(())
}

#[cfg(not(feature = "fetch-weights"))]
fn download(_url: &str, path: &Path) -> Result<()> {
    Err(anyhow!(
        "model weights missing at {}; downloading requires the fetch-weights feature",
        path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_file_is_used_as_is() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("model.onnx");
        std::fs::write(&path, b"weights")?;

        let resolved = ensure_weights(&path, None)?;
        assert_eq!(resolved, path);
        Ok(())
    }

    #[test]
    fn missing_file_without_url_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.onnx");

        assert!(ensure_weights(&path, None).is_err());
        assert!(ensure_weights(&path, Some("   ")).is_err());
        Ok(())
    }

    #[test]
    fn non_http_url_is_rejected() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing.onnx");

        let err = ensure_weights(&path, Some("file:///etc/passwd")).unwrap_err();
        assert!(err.to_string().contains("http"));
        assert!(!path.exists());
        Ok(())
    }
}
