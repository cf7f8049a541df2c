use std::fmt;

/// Dotted location of a requested field, in client-facing names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_paths_do_not_alias() {
        let root = FieldPath::root();
        let content = root.child("content");
        let text = content.child("text");
        let note = content.child("note");

        assert_eq!(root.to_string(), "");
        assert_eq!(text.to_string(), "content.text");
        assert_eq!(note.to_string(), "content.note");
    }
}
