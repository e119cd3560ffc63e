use std::collections::HashMap;

/// Replace `${name}` tokens with values from `vars`.
///
/// Notes:
/// - Names are `[A-Za-z0-9_]+`; anything else between `${` and `}` is left intact.
/// - Unknown tokens are left intact to aid debugging.
/// - Single pass: text coming from a substituted value is never re-scanned, so a
///   value containing `${other}` is emitted literally.
pub fn interpolate_vars(template: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut idx = 0;

    while let Some(rel) = template[idx..].find("${") {
        let start = idx + rel;
        out.push_str(&template[idx..start]);

        let content_start = start + 2;
        let Some(rel_end) = template[content_start..].find('}') else {
            // Unterminated token: keep the rest as-is.
            out.push_str(&template[start..]);
            return out;
        };
        let end = content_start + rel_end;
        let name = &template[content_start..end];

        match vars.get(name) {
            Some(value) if is_identifier(name) => out.push_str(value),
            _ => out.push_str(&template[start..=end]),
        }
        idx = end + 1;
    }

    out.push_str(&template[idx..]);
    out
}

/// Names of every well-formed `${name}` token in `template`, in order of appearance.
pub fn referenced_names(template: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut idx = 0;
    while let Some(rel) = template[idx..].find("${") {
        let content_start = idx + rel + 2;
        let Some(rel_end) = template[content_start..].find('}') else {
            break;
        };
        let name = &template[content_start..content_start + rel_end];
        if is_identifier(name) {
            names.push(name);
        }
        idx = content_start + rel_end + 1;
    }
    names
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_interpolate_basic_vars() {
        let v = vars(&[("name", "Zied"), ("greet", "Hello")]);
        assert_eq!(interpolate_vars("${greet}, ${name}!", &v), "Hello, Zied!");
    }

    #[test]
    fn test_unknown_tokens_are_preserved() {
        let v = vars(&[]);
        assert_eq!(
            interpolate_vars("Hello, ${name} and ${ spaced }!", &v),
            "Hello, ${name} and ${ spaced }!"
        );
    }

    #[test]
    fn test_substitution_is_not_recursive() {
        let v = vars(&[("x", "${y}"), ("y", "deep")]);
        assert_eq!(interpolate_vars("[${x}] [${y}]", &v), "[${y}] [deep]");
    }

    #[test]
    fn test_unterminated_and_adjacent_tokens() {
        let v = vars(&[("a", "1"), ("b", "2")]);
        assert_eq!(interpolate_vars("${a}${b}", &v), "12");
        assert_eq!(interpolate_vars("x ${a", &v), "x ${a");
        assert_eq!(interpolate_vars("$a {b} ${}", &v), "$a {b} ${}");
    }

    #[test]
    fn test_unicode_around_tokens() {
        let v = vars(&[("city", "Tunis")]);
        assert_eq!(interpolate_vars("→ ${city} ✓", &v), "→ Tunis ✓");
    }

    #[test]
    fn test_referenced_names() {
        assert_eq!(
            referenced_names("${a} ${ b } ${c_1}"),
            vec!["a", "c_1"]
        );
    }
}
