//! Pulls runnable source out of a chat reply.

/// Fence tags accepted on an opening ``` line.
const KNOWN_TAGS: &[&str] = &["partscript", "text", ""];

/// Returns the first fenced code block if the reply contains one, otherwise
/// the reply with any stray fence lines removed. Never fails; the worst
/// case is the trimmed input handed on for the evaluator to reject.
pub fn extract_code(reply: &str) -> String {
    if let Some(block) = first_fenced_block(reply) {
        return block;
    }

    reply
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

fn first_fenced_block(reply: &str) -> Option<String> {
    let mut lines = reply.lines();

    loop {
        let line = lines.next()?;
        let trimmed = line.trim();
        let Some(tag) = trimmed.strip_prefix("```") else {
            continue;
        };
        if !KNOWN_TAGS.contains(&tag.trim()) {
            continue;
        }

        let mut block = Vec::new();
        for body_line in lines.by_ref() {
            if body_line.trim().starts_with("```") {
                let joined = block.join("\n").trim().to_string();
                if joined.is_empty() {
                    break;
                }
                return Some(joined);
            }
            block.push(body_line);
        }
        // Unterminated or empty fence; fall through to scan for another.
        if block.is_empty() {
            continue;
        }
        return Some(block.join("\n").trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::extract_code;

    #[test]
    fn tagged_fence_wins_over_surrounding_prose() {
        let reply = "Here is the program:\n```partscript\nresult = box(10, 10, 10)\n```\nLet me know.";
        assert_eq!(extract_code(reply), "result = box(10, 10, 10)");
    }

    #[test]
    fn bare_fence_is_accepted() {
        let reply = "```\nresult = sphere(5)\n```";
        assert_eq!(extract_code(reply), "result = sphere(5)");
    }

    #[test]
    fn first_of_several_blocks_is_chosen() {
        let reply = "```\nresult = box(1, 1, 1)\n```\nor maybe\n```\nresult = sphere(9)\n```";
        assert_eq!(extract_code(reply), "result = box(1, 1, 1)");
    }

    #[test]
    fn unknown_language_tag_is_skipped() {
        let reply = "```python\nprint(1)\n```\n```partscript\nresult = box(2, 2, 2)\n```";
        assert_eq!(extract_code(reply), "result = box(2, 2, 2)");
    }

    #[test]
    fn unfenced_reply_passes_through_trimmed() {
        let reply = "\nresult = box(3, 3, 3)\n";
        assert_eq!(extract_code(reply), "result = box(3, 3, 3)");
    }

    #[test]
    fn unterminated_fence_still_yields_its_body() {
        let reply = "```partscript\nresult = box(4, 4, 4)";
        assert_eq!(extract_code(reply), "result = box(4, 4, 4)");
    }

    #[test]
    fn empty_reply_yields_empty_source() {
        assert_eq!(extract_code(""), "");
    }
}
