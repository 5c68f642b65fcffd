//! Path string expansion at the boundary.
//!
//! Expands a leading `~` to the user's home directory and `$VAR`/`${VAR}`
//! environment references anywhere in the string.

/// Expand `~` (home directory) and `$VAR` / `${VAR}` references in a path.
pub fn expand_path(path: &str) -> String {
    let home_expanded = if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => format!("{}/{}", home.display(), rest),
            None => path.to_string(),
        }
    } else if path == "~" {
        dirs::home_dir()
            .map(|h| h.display().to_string())
            .unwrap_or_else(|| path.to_string())
    } else {
        path.to_string()
    };

    expand_env_vars(&home_expanded)
}

fn expand_env_vars(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let bytes: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == '$' && i + 1 < bytes.len() {
            if bytes[i + 1] == '{' {
                if let Some(end) = bytes[i + 2..].iter().position(|&c| c == '}') {
                    let name: String = bytes[i + 2..i + 2 + end].iter().collect();
                    out.push_str(&std::env::var(&name).unwrap_or_default());
                    i += 2 + end + 1;
                    continue;
                }
            } else if bytes[i + 1].is_alphabetic() || bytes[i + 1] == '_' {
                let start = i + 1;
                let mut end = start;
                while end < bytes.len() && (bytes[end].is_alphanumeric() || bytes[end] == '_') {
                    end += 1;
                }
                let name: String = bytes[start..end].iter().collect();
                out.push_str(&std::env::var(&name).unwrap_or_default());
                i = end;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_dollar_var() {
        std::env::set_var("RAGCORPUS_TEST_VAR", "docs");
        assert_eq!(expand_path("/data/$RAGCORPUS_TEST_VAR/a.pdf"), "/data/docs/a.pdf");
        assert_eq!(expand_path("/data/${RAGCORPUS_TEST_VAR}/a.pdf"), "/data/docs/a.pdf");
    }

    #[test]
    fn leaves_plain_paths_untouched() {
        assert_eq!(expand_path("/data/a.pdf"), "/data/a.pdf");
    }

    #[test]
    fn unset_var_expands_empty() {
        std::env::remove_var("RAGCORPUS_DOES_NOT_EXIST");
        assert_eq!(expand_path("/data/$RAGCORPUS_DOES_NOT_EXIST/a.pdf"), "/data//a.pdf");
    }
}
