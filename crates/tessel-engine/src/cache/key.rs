use std::fmt;
use std::path::Path;

/// Canonical identifier of a cached texture.
///
/// Keys built from paths are normalized so that `"ui/./icons/../a.png"`,
/// `"ui\\a.png"` and `"ui/a.png"` all name the same entry.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds a key from a resource path.
    ///
    /// Backslashes become `/`, empty and `.` segments are dropped, and `..`
    /// removes the preceding segment (or is kept when there is none to
    /// remove). A leading `/` survives.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        let absolute = raw.starts_with('/');

        let mut parts: Vec<&str> = Vec::new();
        for seg in raw.split('/') {
            match seg {
                "" | "." => {}
                ".." => match parts.last() {
                    Some(&last) if last != ".." => {
                        parts.pop();
                    }
                    _ if absolute => {}
                    _ => parts.push(".."),
                },
                other => parts.push(other),
            }
        }

        let joined = parts.join("/");
        if absolute {
            Self(format!("/{joined}"))
        } else {
            Self(joined)
        }
    }

    /// Builds an explicit identifier, used verbatim.
    ///
    /// Meant for images that do not come from a file (render targets,
    /// generated atlases) and are added with `insert_image`.
    pub fn id(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(path: &str) -> Self {
        Self::from_path(path)
    }
}

impl From<String> for CacheKey {
    fn from(path: String) -> Self {
        Self::from_path(path)
    }
}

impl From<&Path> for CacheKey {
    fn from(path: &Path) -> Self {
        Self::from_path(path)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(key: &CacheKey) -> Self {
        key.clone()
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
