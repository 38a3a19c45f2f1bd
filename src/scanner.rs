use crate::error::{Error, Result};
use crate::resolver::TEMPLATE_EXTENSION;
use log::{debug, warn};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Template scanner for traversing a views directory.
///
/// The `TemplateScanner` recursively walks a views directory to find all Jbuilder templates,
/// separating renderable templates from partials (files whose name starts with `_`). Hidden
/// directories (those starting with `.`) are skipped.
///
/// # Example
///
/// ```no_run
/// use jbuilder_openapi::scanner::TemplateScanner;
/// use std::path::PathBuf;
///
/// let scanner = TemplateScanner::new(PathBuf::from("./app/views"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} templates", result.templates.len());
/// ```
pub struct TemplateScanner {
    root_path: PathBuf,
    extension: String,
}

/// Result of directory scanning operation.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Renderable templates, sorted by path
    pub templates: Vec<PathBuf>,
    /// Partials (`_name.json.jbuilder`), sorted by path
    pub partials: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl TemplateScanner {
    /// Creates a new `TemplateScanner` for the specified views directory.
    ///
    /// # Arguments
    ///
    /// * `root_path` - The directory to scan for templates
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            extension: TEMPLATE_EXTENSION.to_string(),
        }
    }

    /// Matches files ending in `extension` instead of `.json.jbuilder`.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Scans the directory tree and collects all templates.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path is not a directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Views path is not a directory: {}",
                self.root_path.display()
            )));
        }

        let mut result = ScanResult::default();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                !e.file_name().to_string_lossy().starts_with('.')
            })
        {
            match entry {
                Ok(entry) => {
                    if !entry.file_type().is_file() {
                        continue;
                    }
                    let file_name = entry.file_name().to_string_lossy();
                    if !file_name.ends_with(self.extension.as_str()) {
                        continue;
                    }

                    if file_name.starts_with('_') {
                        result.partials.push(entry.path().to_path_buf());
                    } else {
                        result.templates.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    result.warnings.push(warning);
                }
            }
        }

        debug!(
            "Scanned {}: {} templates, {} partials",
            self.root_path.display(),
            result.templates.len(),
            result.partials.len()
        );

        Ok(result)
    }

    /// Path of `template` relative to the scanned root, without the template
    /// extension and with `/` separators (`users/show`).
    pub fn template_key(&self, template: &Path) -> String {
        let relative = template.strip_prefix(&self.root_path).unwrap_or(template);
        let segments: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        let joined = segments.join("/");
        joined
            .strip_suffix(self.extension.as_str())
            .map(str::to_string)
            .unwrap_or(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_separates_partials() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("users")).unwrap();
        fs::write(root.join("users/show.json.jbuilder"), "json.id 1").unwrap();
        fs::write(root.join("users/index.json.jbuilder"), "json.array! []").unwrap();
        fs::write(root.join("users/_user.json.jbuilder"), "json.id 1").unwrap();
        fs::write(root.join("users/show.html.erb"), "<p></p>").unwrap();

        let scanner = TemplateScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(file_names(&result.templates), vec!["index.json.jbuilder", "show.json.jbuilder"]);
        assert_eq!(file_names(&result.partials), vec!["_user.json.jbuilder"]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_scan_empty_directory() {
        let temp_dir = TempDir::new().unwrap();

        let scanner = TemplateScanner::new(temp_dir.path().to_path_buf());
        let result = scanner.scan().unwrap();

        assert!(result.templates.is_empty());
        assert!(result.partials.is_empty());
    }

    #[test]
    fn test_scan_skips_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join(".cache")).unwrap();
        fs::write(root.join(".cache/show.json.jbuilder"), "json.id 1").unwrap();
        fs::write(root.join("show.json.jbuilder"), "json.id 1").unwrap();

        let scanner = TemplateScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert_eq!(result.templates.len(), 1);
        assert_eq!(result.templates[0], root.join("show.json.jbuilder"));
    }

    #[test]
    fn test_scan_missing_root_is_error() {
        let temp_dir = TempDir::new().unwrap();

        let scanner = TemplateScanner::new(temp_dir.path().join("nope"));
        assert!(matches!(scanner.scan(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_custom_extension() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::write(root.join("show.jbuilder"), "json.id 1").unwrap();
        fs::write(root.join("show.json.jbuilder"), "json.id 1").unwrap();

        let scanner = TemplateScanner::new(root.to_path_buf()).with_extension(".jbuilder");
        let result = scanner.scan().unwrap();

        // `.json.jbuilder` also ends with `.jbuilder`
        assert_eq!(result.templates.len(), 2);
    }

    #[test]
    fn test_template_key() {
        let scanner = TemplateScanner::new(PathBuf::from("/app/views"));

        assert_eq!(
            scanner.template_key(Path::new("/app/views/api/v1/users/show.json.jbuilder")),
            "api/v1/users/show"
        );
        assert_eq!(scanner.template_key(Path::new("/elsewhere/x.json.jbuilder")), "elsewhere/x");
    }
}
