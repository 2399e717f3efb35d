//! Canonical generic-name utilities.
//!
//! Both the semantic analyzer and the code generator work with canonical
//! type names (`List<s32>`, `Range<BackIndex<uaddr>>`). These helpers
//! parse, match, and rewrite those names with correct bracket nesting.

use std::collections::HashMap;

/// `List<List<s32>>` → `List`. Names without generic arguments return
/// themselves.
pub fn extract_base_name(name: &str) -> &str {
    match name.find('<') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// True when the name carries generic arguments.
pub fn is_generic_name(name: &str) -> bool {
    name.contains('<')
}

/// Split the top-level generic arguments of a canonical name.
/// `List<List<s32>>` → `["List<s32>"]`; `Dict<s32, Text>` → `["s32", "Text"]`.
/// Names without arguments return an empty list.
pub fn extract_type_arguments(name: &str) -> Vec<String> {
    let Some(open) = name.find('<') else {
        return Vec::new();
    };
    let Some(inner) = name[open + 1..].strip_suffix('>') else {
        return Vec::new();
    };

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for c in inner.chars() {
        match c {
            '<' => {
                depth += 1;
                current.push(c);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

/// Template-parameter convention: a short name starting with an ASCII
/// uppercase letter and consisting of at most one letter plus digits
/// (`T`, `U`, `K`, `V`, `T1`). Concrete user types are longer.
pub fn is_parameter_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => {}
        _ => return false,
    }
    name.len() <= 2 && chars.all(|c| c.is_ascii_digit())
}

/// Check whether `concrete` is an instantiation of `template`, producing
/// the parameter-to-type substitution map. Inconsistent self-uses are
/// rejected: `Dict<s32, Text>` does not match `Dict<K, K>`.
pub fn is_instance_of(concrete: &str, template: &str) -> (bool, HashMap<String, String>) {
    let mut map = HashMap::new();
    if match_into(concrete, template, &mut map) {
        (true, map)
    } else {
        (false, HashMap::new())
    }
}

fn match_into(concrete: &str, template: &str, map: &mut HashMap<String, String>) -> bool {
    let template = template.trim();
    let concrete = concrete.trim();

    if is_parameter_name(template) {
        return match map.get(template) {
            Some(bound) => bound == concrete,
            None => {
                map.insert(template.to_string(), concrete.to_string());
                true
            }
        };
    }

    if extract_base_name(concrete) != extract_base_name(template) {
        return false;
    }
    let concrete_args = extract_type_arguments(concrete);
    let template_args = extract_type_arguments(template);
    if concrete_args.len() != template_args.len() {
        return false;
    }
    concrete_args
        .iter()
        .zip(template_args.iter())
        .all(|(c, t)| match_into(c, t, map))
}

/// Rewrite every whole-identifier occurrence of a map key inside a
/// canonical name. Single-pass over identifier boundaries, so the result
/// is stable under repeated application with the same map.
pub fn substitute(type_name: &str, map: &HashMap<String, String>) -> String {
    if map.is_empty() {
        return type_name.to_string();
    }
    let mut out = String::with_capacity(type_name.len());
    let mut word = String::new();
    for c in type_name.chars() {
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
        } else {
            flush_word(&mut out, &mut word, map);
            out.push(c);
        }
    }
    flush_word(&mut out, &mut word, map);
    out
}

fn flush_word(out: &mut String, word: &mut String, map: &HashMap<String, String>) {
    if word.is_empty() {
        return;
    }
    match map.get(word.as_str()) {
        Some(replacement) => out.push_str(replacement),
        None => out.push_str(word),
    }
    word.clear();
}

/// Conventional placeholder tuples used when searching for a method
/// template by key.
const PLACEHOLDER_SETS: &[&[&str]] = &[
    &["T"],
    &["T", "U"],
    &["K", "V"],
    &["T", "U", "V"],
];

/// Candidate template keys for method resolution on `type_name`, most
/// specific first: the exact canonical form, placeholder forms with the
/// same arity, then the bare base name.
///
/// `("List<s32>", "select")` →
/// `["List<s32>.select", "List<T>.select", "List.select"]`.
pub fn generate_template_candidates(type_name: &str, method: &str) -> Vec<String> {
    let mut keys = Vec::new();
    keys.push(format!("{}.{}", type_name, method));

    let arity = extract_type_arguments(type_name).len();
    if arity > 0 {
        let base = extract_base_name(type_name);
        for set in PLACEHOLDER_SETS {
            if set.len() == arity {
                keys.push(format!("{}<{}>.{}", base, set.join(", "), method));
            }
        }
        keys.push(format!("{}.{}", base, method));
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_extraction() {
        assert_eq!(extract_base_name("List<List<s32>>"), "List");
        assert_eq!(extract_base_name("s32"), "s32");
        assert_eq!(extract_base_name("Dict<K, V>"), "Dict");
    }

    #[test]
    fn argument_extraction_respects_nesting() {
        assert_eq!(extract_type_arguments("List<List<s32>>"), vec!["List<s32>"]);
        assert_eq!(extract_type_arguments("Dict<s32, Text>"), vec!["s32", "Text"]);
        assert_eq!(
            extract_type_arguments("Dict<Text, List<Pair<s32, s64>>>"),
            vec!["Text", "List<Pair<s32, s64>>"]
        );
        assert!(extract_type_arguments("s32").is_empty());
    }

    #[test]
    fn instance_matching_binds_parameters() {
        let (ok, map) = is_instance_of("List<s32>", "List<T>");
        assert!(ok);
        assert_eq!(map.get("T").map(String::as_str), Some("s32"));

        let (ok, map) = is_instance_of("Dict<s32, Text>", "Dict<K, V>");
        assert!(ok);
        assert_eq!(map.get("K").map(String::as_str), Some("s32"));
        assert_eq!(map.get("V").map(String::as_str), Some("Text"));
    }

    #[test]
    fn inconsistent_bindings_are_rejected() {
        let (ok, _) = is_instance_of("Dict<s32, Text>", "Dict<K, K>");
        assert!(!ok);
        let (ok, map) = is_instance_of("Dict<s32, s32>", "Dict<K, K>");
        assert!(ok);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn nested_instance_matching() {
        let (ok, map) = is_instance_of("Range<BackIndex<uaddr>>", "Range<T>");
        assert!(ok);
        assert_eq!(map.get("T").map(String::as_str), Some("BackIndex<uaddr>"));

        let (ok, map) = is_instance_of("List<List<s32>>", "List<List<T>>");
        assert!(ok);
        assert_eq!(map.get("T").map(String::as_str), Some("s32"));
    }

    #[test]
    fn substitution_is_whole_identifier_and_idempotent() {
        let mut map = HashMap::new();
        map.insert("T".to_string(), "s32".to_string());
        assert_eq!(substitute("List<T>", &map), "List<s32>");
        // `Text` contains a capital T but is a different identifier.
        assert_eq!(substitute("Dict<T, Text>", &map), "Dict<s32, Text>");
        let once = substitute("Pair<T, List<T>>", &map);
        assert_eq!(once, "Pair<s32, List<s32>>");
        assert_eq!(substitute(&once, &map), once);
    }

    #[test]
    fn template_candidates_most_specific_first() {
        let keys = generate_template_candidates("List<s32>", "select");
        assert_eq!(
            keys,
            vec!["List<s32>.select", "List<T>.select", "List.select"]
        );
        let keys = generate_template_candidates("Dict<s32, Text>", "insert");
        assert!(keys.contains(&"Dict<K, V>.insert".to_string()));
        assert!(keys.contains(&"Dict<T, U>.insert".to_string()));
        // Non-generic receivers search only the exact key.
        assert_eq!(generate_template_candidates("s32", "abs"), vec!["s32.abs"]);
    }
}
