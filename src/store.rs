use crate::types::AppResult;
use anyhow::anyhow;
use std::path::PathBuf;

pub fn store_path(filename: &str) -> AppResult<PathBuf> {
    let dirs = directories::ProjectDirs::from("org", "chconn", "chconn")
        .ok_or(anyhow!("Failed to get directories"))?;
    let config_dirs = dirs.config_dir();
    if !config_dirs.exists() {
        std::fs::create_dir_all(config_dirs)?;
    }
    let path = config_dirs.join(filename);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::store_path;
    use crate::types::AppResult;

    #[test]
    fn test_path() -> AppResult<()> {
        let path = store_path("test")?;
        assert!(path.ends_with("test"));
        assert!(path.parent().is_some_and(|dir| dir.is_dir()));
        Ok(())
    }
}
