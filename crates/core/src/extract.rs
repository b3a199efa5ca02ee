//! Result extraction
//!
//! Reads typed results off a finished (or partial) job context. Absence of a
//! kind is a valid, empty result, never an error.

use crate::annotation::{AnnotationKind, AnnotationRecord};
use crate::context::JobContext;

/// Ordered records stored under `kind`, or an empty slice if the kind was
/// never produced
pub fn extract<'a>(context: &'a JobContext, kind: &str) -> &'a [AnnotationRecord] {
    context.get(kind)
}

/// Typed variant of [`extract`], going through an interned
/// [`AnnotationKind`] handle resolved at configuration time
pub fn extract_kind<'a>(
    context: &'a JobContext,
    kind: &AnnotationKind,
) -> &'a [AnnotationRecord] {
    context.get(kind.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{KindRegistry, Span};

    #[test]
    fn test_extract_missing_kind_is_empty() {
        let context = JobContext::new("text");
        assert!(extract(&context, "NeverProduced").is_empty());
    }

    #[test]
    fn test_extract_returns_stored_order() {
        let mut context = JobContext::new("one two");
        context
            .add_annotations(
                "Token",
                vec![
                    AnnotationRecord::new("Token", Span::new(0, 3)),
                    AnnotationRecord::new("Token", Span::new(4, 7)),
                ],
            )
            .unwrap();

        let tokens = extract(&context, "Token");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].span, Span::new(0, 3));
        assert_eq!(tokens[1].span, Span::new(4, 7));
    }

    #[test]
    fn test_extract_kind_via_registry() {
        let mut kinds = KindRegistry::new();
        let sarcasm = kinds.register("Sarcasm").unwrap();

        let mut context = JobContext::new("sure, great");
        context
            .add_annotations(
                "Sarcasm",
                vec![AnnotationRecord::new("Sarcasm", Span::new(0, 11))],
            )
            .unwrap();

        assert_eq!(extract_kind(&context, &sarcasm).len(), 1);
    }
}
