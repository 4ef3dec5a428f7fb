use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

/// Truncate to at most `max_bytes`, never splitting a character.
pub fn truncate_string(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut truncated = String::new();
    for ch in text.chars() {
        if truncated.len() + ch.len_utf8() > max_bytes {
            break;
        }
        truncated.push(ch);
    }
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_string("héllo", 2), "h");
        assert_eq!(truncate_string("héllo", 3), "hé");
        assert_eq!(truncate_string("short", 10), "short");
    }

    #[test]
    fn display_path_strips_base() {
        let base = Path::new("/work");
        assert_eq!(display_path(Path::new("/work/a/b.yaml"), Some(base)), "a/b.yaml");
        assert_eq!(display_path(Path::new("/other/b.yaml"), Some(base)), "/other/b.yaml");
        assert_eq!(display_path(Path::new("x.yaml"), None), "x.yaml");
    }
}
