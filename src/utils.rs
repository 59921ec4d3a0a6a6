use crate::dsl::TagSet;

/// Glob match where `*` stands for any run of characters.
pub fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == value;
    }

    let mut remaining = value;
    if let Some(prefix) = parts.first().filter(|_| !pattern.starts_with('*')) {
        if !remaining.starts_with(prefix) {
            return false;
        }
        remaining = &remaining[prefix.len()..];
    }

    let last = parts.len() - 1;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() || (i == 0 && !pattern.starts_with('*')) {
            continue;
        }
        if i == last {
            // anchored suffix
            return remaining.ends_with(part);
        }
        match remaining.find(part) {
            Some(idx) => {
                remaining = &remaining[idx + part.len()..];
            }
            None => return false,
        }
    }

    true
}

/// Build a tag set from anything yielding strings.
pub fn tag_set<I, S>(tags: I) -> TagSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    tags.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_supports_star_suffix() {
        assert!(glob_match("device:*", "device:mobile"));
        assert!(!glob_match("device:*", "user:john"));
    }

    #[test]
    fn glob_match_supports_star_prefix_and_middle() {
        assert!(glob_match("*:mobile", "device:mobile"));
        assert!(glob_match("user:*:admin", "user:john:admin"));
        assert!(!glob_match("user:*:admin", "user:john:guest"));
        assert!(glob_match("a*b*c", "abc"));
        assert!(!glob_match("a*b*c", "acb"));
    }

    #[test]
    fn glob_match_without_star_is_exact() {
        assert!(glob_match("area:home", "area:home"));
        assert!(!glob_match("area:home", "area:homes"));
    }

    #[test]
    fn tag_set_dedups() {
        let tags = tag_set(["a", "b", "a"]);
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("a"));
    }
}
