//! Build a layer from lexed `#define` / `#undef` directives.
//!
//! `#undef X` followed by `#define X v` folds into one assignment marked
//! undef-before-set. A bare `#undef X` becomes a clear-only assignment.

use std::collections::HashMap;

use sitecfg_directives::{DirectiveFile, DirectiveKind};

use super::{Assignment, Layer, LayerError, LayerId};
use crate::flag::FlagValue;

pub fn from_directives(
    id: impl Into<LayerId>,
    file: &DirectiveFile,
) -> Result<Layer, LayerError> {
    let id = id.into();
    let mut assignments: Vec<Assignment> = Vec::new();
    // flag name -> index into `assignments`
    let mut index: HashMap<String, usize> = HashMap::new();

    let duplicate = |name: &str| LayerError::DuplicateAssignment {
        layer: id.clone(),
        name: name.to_string(),
    };

    for directive in &file.directives {
        match &directive.kind {
            DirectiveKind::Undef { name } => match index.get(name).copied() {
                None => {
                    index.insert(name.clone(), assignments.len());
                    assignments.push(Assignment::undef(name.clone()));
                }
                // Repeated #undef is harmless
                Some(i) if assignments[i].is_clear_only() => {}
                Some(_) => return Err(duplicate(name)),
            },
            DirectiveKind::Define { name, value } => {
                let value = FlagValue::from(value.clone());
                match index.get(name).copied() {
                    None => {
                        index.insert(name.clone(), assignments.len());
                        assignments.push(Assignment::set(name.clone(), value));
                    }
                    Some(i) if assignments[i].is_clear_only() => {
                        assignments[i].value = Some(value);
                        assignments[i].undef_before_set = true;
                    }
                    Some(_) => return Err(duplicate(name)),
                }
            }
            DirectiveKind::Include { target } => {
                tracing::debug!(
                    layer = %id,
                    line = directive.line,
                    target = %target,
                    "ignoring #include; include order is expressed through layer priority"
                );
            }
        }
    }

    Layer::from_assignments(id, assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(text: &str) -> Result<Layer, LayerError> {
        let file = sitecfg_directives::parse(text).unwrap();
        from_directives("site", &file)
    }

    #[test]
    fn test_undef_then_define_folds() {
        let layer = layer("#undef A\n#define A 1\n").unwrap();
        assert_eq!(layer.len(), 1);
        let a = layer.assignment("A").unwrap();
        assert!(a.undef_before_set);
        assert_eq!(a.value, Some(FlagValue::Int(1)));
    }

    #[test]
    fn test_plain_define() {
        let layer = layer("#define PJ_SSL_SOCK_IMP PJ_SSL_SOCK_IMP_APPLE").unwrap();
        let a = layer.assignment("PJ_SSL_SOCK_IMP").unwrap();
        assert!(!a.undef_before_set);
        assert_eq!(a.value, Some(FlagValue::from("PJ_SSL_SOCK_IMP_APPLE")));
    }

    #[test]
    fn test_bare_undef_clears() {
        let layer = layer("#undef PJ_HAS_IPV6").unwrap();
        assert!(layer.assignment("PJ_HAS_IPV6").unwrap().is_clear_only());
    }

    #[test]
    fn test_repeated_undef_is_noop() {
        let layer = layer("#undef A\n#undef A\n#define A 0").unwrap();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.assignment("A").unwrap().value, Some(FlagValue::Int(0)));
    }

    #[test]
    fn test_double_define_rejected() {
        let err = layer("#define A 1\n#define A 2").unwrap_err();
        assert!(matches!(err, LayerError::DuplicateAssignment { name, .. } if name == "A"));
    }

    #[test]
    fn test_undef_after_define_rejected() {
        let err = layer("#define A 1\n#undef A").unwrap_err();
        assert!(matches!(err, LayerError::DuplicateAssignment { .. }));
    }

    #[test]
    fn test_order_preserved() {
        let layer = layer("#define B 1\n#undef A\n#define C 1\n#define A 1").unwrap();
        let names: Vec<_> = layer.assignments().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }
}
