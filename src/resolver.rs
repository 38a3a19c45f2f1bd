use log::debug;
use std::path::{Component, Path, PathBuf};

/// Conventional extension of Jbuilder templates.
pub const TEMPLATE_EXTENSION: &str = ".json.jbuilder";

/// Conventional name of the directory holding all templates.
pub const VIEWS_DIR_NAME: &str = "views";

/// Maps partial names to template paths.
///
/// Resolution is pure path algebra; whether the file exists is left to the
/// caller.
///
/// | name             | current file                        | result                            |
/// |------------------|-------------------------------------|-----------------------------------|
/// | `user`           | `app/views/users/show.json.jbuilder` | `app/views/users/_user.json.jbuilder` |
/// | `shared/meta`    | `app/views/users/show.json.jbuilder` | `app/views/shared/_meta.json.jbuilder` |
#[derive(Debug, Clone)]
pub struct PartialResolver {
    views_dir_name: String,
    views_root: Option<PathBuf>,
    extension: String,
}

impl Default for PartialResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialResolver {
    pub fn new() -> Self {
        Self {
            views_dir_name: VIEWS_DIR_NAME.to_string(),
            views_root: None,
            extension: TEMPLATE_EXTENSION.to_string(),
        }
    }

    /// Uses `root` for namespaced partials instead of searching upward for a
    /// `views` directory.
    pub fn with_views_root(mut self, root: PathBuf) -> Self {
        self.views_root = Some(root);
        self
    }

    /// Changes the directory name searched for when no explicit root is set.
    pub fn with_views_dir_name(mut self, name: impl Into<String>) -> Self {
        self.views_dir_name = name.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Resolves `partial_name` as referenced from `current_file`.
    pub fn resolve(&self, partial_name: &str, current_file: &Path) -> PathBuf {
        let partial_path = Path::new(partial_name);
        if partial_path.is_absolute() {
            return partial_path.to_path_buf();
        }

        let current_dir = current_file.parent().unwrap_or_else(|| Path::new(""));

        let (dir_part, file_stem) = match partial_name.rsplit_once('/') {
            Some((dir, stem)) => (Some(dir), stem),
            None => (None, partial_name),
        };
        let file_name = format!("_{}{}", file_stem, self.extension);

        let resolved = match dir_part {
            None => current_dir.join(file_name),
            Some(dir) => {
                let base = match self.find_views_root(current_file) {
                    Some(root) => root,
                    None => {
                        debug!(
                            "No '{}' directory above {}, resolving '{}' relative to it",
                            self.views_dir_name,
                            current_file.display(),
                            partial_name
                        );
                        current_dir.to_path_buf()
                    }
                };
                base.join(dir).join(file_name)
            }
        };

        debug!("Resolved partial '{}' to {}", partial_name, resolved.display());
        resolved
    }

    /// The explicit views root, or the nearest ancestor directory of
    /// `current_file` named like the views directory.
    pub fn find_views_root(&self, current_file: &Path) -> Option<PathBuf> {
        if let Some(root) = &self.views_root {
            return Some(root.clone());
        }

        current_file
            .ancestors()
            .skip(1)
            .find(|dir| dir.file_name().is_some_and(|name| name == self.views_dir_name.as_str()))
            .map(Path::to_path_buf)
    }
}

/// Lexically normalises a path by dropping `.` and folding `..` components.
///
/// Used to compare template paths when guarding against inclusion cycles.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
