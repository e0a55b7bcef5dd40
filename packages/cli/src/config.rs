use anyhow::Context;
use glimpse_common::{PreviewConfig, DEFAULT_CONFIG_NAME};
use std::path::Path;
use tracing::debug;

/// Load `glimpse.config.json` from `cwd`, falling back to defaults when absent
pub fn load(cwd: &Path) -> anyhow::Result<PreviewConfig> {
    let config_path = cwd.join(DEFAULT_CONFIG_NAME);

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = PreviewConfig::from_json(&content)
            .with_context(|| format!("Invalid config in {}", config_path.display()))?;
        debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        Ok(PreviewConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "mountId": "app", "pollPolicy": { "intervalMs": 20, "maxAttempts": 3 } }"#,
        )
        .unwrap();

        let config = load(dir.path()).unwrap();
        assert_eq!(config.mount_id, "app");
        assert_eq!(config.poll_policy.max_attempts, 3);
        assert_eq!(config.alias_prefix, "@/");
    }

    #[test]
    fn test_default_config() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load(dir.path()).unwrap(), PreviewConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ mountId: }").unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config"));
    }
}
