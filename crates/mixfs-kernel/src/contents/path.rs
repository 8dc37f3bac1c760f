//! Virtual path decomposition.

/// Path separator of the contents namespace.
pub const SEP: char = '/';

/// A contents path split into its leading segment and the rest.
///
/// `normalized` is the input with separators trimmed from both ends;
/// joining `leading` and `rest` with `/` reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPath {
    pub leading: String,
    pub rest: Vec<String>,
    pub normalized: String,
}

impl VirtualPath {
    /// Decompose a raw path. Never fails.
    pub fn parse(path: &str) -> Self {
        let normalized = path.trim_matches(SEP).to_string();
        let mut segments = normalized.split(SEP).map(str::to_string);
        // split on "" yields one empty segment, which becomes `leading`
        let leading = segments.next().unwrap_or_default();
        Self {
            leading,
            rest: segments.collect(),
            normalized,
        }
    }

    /// True for the namespace root (empty path).
    pub fn is_root(&self) -> bool {
        self.normalized.is_empty()
    }

    /// True when the path is exactly `prefix` with nothing after it.
    pub fn is_bare(&self, prefix: &str) -> bool {
        self.leading == prefix && self.rest.is_empty()
    }

    /// Segments after the mount name, rejoined. Empty if there are none.
    pub fn mount_relative(&self) -> String {
        self.rest.get(1..).map(|s| s.join("/")).unwrap_or_default()
    }

    /// Rejoin all segments.
    pub fn join(&self) -> String {
        std::iter::once(self.leading.as_str())
            .chain(self.rest.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Join a base path and a relative path, like `os.path.join` for
/// relative components. An empty `rel` yields `base` unchanged.
pub fn join(base: &str, rel: &str) -> String {
    let base = base.trim_end_matches(SEP);
    match (base.is_empty(), rel.is_empty()) {
        (_, true) => base.to_string(),
        (true, false) => rel.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}
