use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Resolves template names used in scripts (`click ChromeNewTab`) to reference image files.
///
/// Lookup order:
/// 1. the name itself, if it is an existing file path
/// 2. `{name}.png`, `{name}-btn.png`, `{name}_btn.png`, `{name}.jpg`, `{name}.jpeg` in the root
/// 3. a recursive search under the root: exact stem match first, then stems containing the name
#[derive(Debug, Clone)]
pub struct TemplateLibrary {
    root: PathBuf,
}

impl TemplateLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }

        let candidates = [
            format!("{name}.png"),
            format!("{name}-btn.png"),
            format!("{name}_btn.png"),
            format!("{name}.jpg"),
            format!("{name}.jpeg"),
        ];
        for candidate in &candidates {
            let path = self.root.join(candidate);
            if path.is_file() {
                debug!(
                    target: "atlas::locator",
                    %name, path = %path.display(),
                    "Resolved template"
                );
                return Some(path);
            }
        }

        let mut files = Vec::new();
        collect_images(&self.root, &mut files);
        files.sort();

        let stem_of = |p: &PathBuf| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_owned)
                .unwrap_or_default()
        };
        let exact = files.iter().find(|p| {
            let stem = stem_of(p);
            stem == name || stem == format!("{name}-btn") || stem == format!("{name}_btn")
        });
        let found = exact
            .or_else(|| files.iter().find(|p| stem_of(p).contains(name)))
            .cloned();

        match &found {
            Some(path) => {
                debug!(
                    target: "atlas::locator",
                    %name, path = %path.display(),
                    "Resolved template by search"
                )
            }
            None => warn!(
                target: "atlas::locator",
                %name, root = %self.root.display(),
                "Template not found"
            ),
        }
        found
    }
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, out);
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        {
            out.push(path);
        }
    }
}
