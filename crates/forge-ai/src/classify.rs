//! Maps failure text to corrective hints for the next coder turn.

/// Appended when an attempt fails the same way twice. Exact-equality
/// matching against the raw message keeps duplicate detection predictable.
pub const ESCALATION_DIRECTIVE: &str = "The previous fix did not change the outcome. Abandon the \
     current approach entirely and construct the part a different way.";

/// Substring signature table. First match wins; order goes from the most
/// specific signatures to the most general.
const SIGNATURES: &[(&str, &str)] = &[
    (
        "did not bind a `result` value",
        "Assign the finished shape to `result`, e.g. `result = box(10, 10, 10)`.",
    ),
    (
        "unknown function",
        "Use only the documented PartScript functions; do not invent new ones.",
    ),
    (
        "unknown binding",
        "Every name must be assigned before it is used; define it on an earlier line.",
    ),
    (
        "only valid inside a part block",
        "Call add() only inside a `part { .. }` block, or compose solids with union().",
    ),
    (
        "extrude the sketch before adding",
        "Turn the sketch into a solid with extrude(sketch, height) before add().",
    ),
    (
        "extrude it first",
        "Sketches live in the XY plane; extrude before moving in Z.",
    ),
    (
        "extrude expects a sketch",
        "extrude() takes a 2D sketch such as rect() or circle(), not a solid.",
    ),
    (
        "flat sketch with no volume",
        "The result must be a solid; extrude the sketch with extrude(sketch, height).",
    ),
    (
        "produced no solid geometry",
        "End the script with a solid bound to `result`, built from box, cylinder, sphere, cone, or extrude.",
    ),
    (
        "expects a finite number",
        "The arithmetic overflowed; keep dimensions in a printable millimeter range.",
    ),
    (
        "expects a number",
        "Check the argument order and kinds against the function signatures.",
    ),
    (
        "must be positive",
        "All dimensions must be positive numbers greater than zero.",
    ),
    (
        "missing argument",
        "Supply every argument listed in the function signature.",
    ),
    (
        "too many arguments",
        "Supply exactly the arguments listed in the function signature.",
    ),
    (
        "division by zero",
        "Guard arithmetic so no divisor can be zero.",
    ),
    (
        "evaluation budget exceeded",
        "Simplify the script; build the part from a handful of primitives.",
    ),
    (
        "reviewer rejected",
        "Address the reviewer's notes and regenerate the whole program.",
    ),
];

pub fn hint_for(message: &str) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(signature, _)| message.contains(signature))
        .map(|(_, hint)| *hint)
}

/// Builds the corrective user message appended to the conversation after a
/// failed attempt. `prior_messages` are the raw messages of earlier
/// failures in the same session.
pub fn corrective_message(message: &str, prior_messages: &[String]) -> String {
    let mut text = format!("The previous program failed: {message}");
    if let Some(hint) = hint_for(message) {
        text.push_str("\nHint: ");
        text.push_str(hint);
    }
    if prior_messages.iter().any(|prior| prior == message) {
        text.push('\n');
        text.push_str(ESCALATION_DIRECTIVE);
    }
    text.push_str("\nReply with a complete corrected PartScript program.");
    text
}

#[cfg(test)]
mod tests {
    use super::{ESCALATION_DIRECTIVE, corrective_message, hint_for};

    #[test]
    fn known_signatures_map_to_hints() {
        let hint = hint_for("script did not bind a `result` value")
            .expect("missing-result signature should match");
        assert!(hint.contains("result"));

        let hint = hint_for("unknown function 'bx'. Did you mean 'box'?")
            .expect("unknown-function signature should match");
        assert!(hint.contains("documented"));

        let hint = hint_for("box expects a finite number for width")
            .expect("non-finite signature should match");
        assert!(hint.contains("overflowed"));
    }

    #[test]
    fn unrecognized_text_has_no_hint() {
        assert!(hint_for("the moon is full").is_none());
    }

    #[test]
    fn corrective_message_carries_failure_and_hint() {
        let text = corrective_message("division by zero at line 2, column 5", &[]);
        assert!(text.contains("division by zero at line 2, column 5"));
        assert!(text.contains("Hint:"));
        assert!(!text.contains(ESCALATION_DIRECTIVE));
    }

    #[test]
    fn repeated_failure_escalates() {
        let prior = vec!["division by zero at line 2, column 5".to_string()];
        let text = corrective_message("division by zero at line 2, column 5", &prior);
        assert!(text.contains(ESCALATION_DIRECTIVE));
    }

    #[test]
    fn similar_but_different_failure_does_not_escalate() {
        let prior = vec!["division by zero at line 2, column 5".to_string()];
        let text = corrective_message("division by zero at line 7, column 1", &prior);
        assert!(!text.contains(ESCALATION_DIRECTIVE));
    }
}
