//! Pull executable code out of a model completion.

use std::sync::LazyLock;

use regex::Regex;

/// An opening fence, optionally language-tagged, at the start of the text.
static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+.\-]*[ \t]*\r?\n?").expect("static regex"));

/// The first fenced block anywhere in the text, for completions wrapped in prose.
static EMBEDDED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.\-]*[ \t]*\r?\n(.*?)\r?\n?```").expect("static regex")
});

/// Strip markdown code fences from a completion.
///
/// A completion that starts with a fence yields the body of that first block,
/// up to its closing fence; prose or further blocks after it are dropped. An
/// opening fence that is never closed only loses its fence line. A
/// completion that buries a fenced block in prose yields the first block's
/// body. Text without fences comes back unchanged, so applying the function
/// to its own output is a no-op.
pub fn extract_code(completion: &str) -> String {
    let trimmed = completion.trim();
    if trimmed.starts_with("```") {
        if let Some(caps) = EMBEDDED_BLOCK.captures(trimmed)
            && caps.get(0).is_some_and(|block| block.start() == 0)
        {
            return caps[1].to_string();
        }
        let opened = OPENING_FENCE.replace(trimmed, "");
        let body = opened.strip_suffix("```").unwrap_or(&opened);
        let body = body
            .strip_suffix('\n')
            .map(|b| b.strip_suffix('\r').unwrap_or(b))
            .unwrap_or(body);
        return body.to_string();
    }
    if let Some(caps) = EMBEDDED_BLOCK.captures(trimmed) {
        return caps[1].to_string();
    }
    completion.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_language_tagged_fence() {
        let raw = "```python\ndef add(a, b):\n    return a + b\n```";
        assert_eq!(extract_code(raw), "def add(a, b):\n    return a + b");
    }

    #[test]
    fn strips_bare_fence() {
        let raw = "```\nprint('hi')\n```\n";
        assert_eq!(extract_code(raw), "print('hi')");
    }

    #[test]
    fn strips_tags_with_digits_and_dashes() {
        let raw = "```python3\nx = 1\n```";
        assert_eq!(extract_code(raw), "x = 1");
        let raw = "```objective-c\nint x;\n```";
        assert_eq!(extract_code(raw), "int x;");
    }

    #[test]
    fn preserves_interior_whitespace() {
        let raw = "```python\n\nclass A:\n\n    def f(self):\n        pass\n\n```";
        assert_eq!(extract_code(raw), "\nclass A:\n\n    def f(self):\n        pass\n");
    }

    /// Verifies a completion missing its closing fence still loses the opener.
    #[test]
    fn tolerates_unterminated_fence() {
        let raw = "```python\nx = 1\n";
        assert_eq!(extract_code(raw), "x = 1");
    }

    #[test]
    fn takes_first_block_out_of_prose() {
        let raw = "Here is the fix:\n```python\nx = 2\n```\nThis sets x.";
        assert_eq!(extract_code(raw), "x = 2");
    }

    #[test]
    fn drops_prose_after_closing_fence() {
        let raw = "```python\ndef add(a, b):\n    return a + b\n```\n\nThis function adds two numbers.";
        assert_eq!(extract_code(raw), "def add(a, b):\n    return a + b");
    }

    #[test]
    fn leading_fence_keeps_only_first_of_several_blocks() {
        let raw = "```python\nx = 1\n```\nAnd a usage example:\n```python\nprint(x)\n```";
        assert_eq!(extract_code(raw), "x = 1");
    }

    #[test]
    fn unfenced_text_is_returned_unchanged() {
        let raw = "def f():\n    return 1\n";
        assert_eq!(extract_code(raw), raw);
    }

    #[test]
    fn extraction_is_idempotent() {
        for raw in [
            "```python\ndef add(a, b):\n    return a + b\n```",
            "```\nimport os\n```",
            "Sure!\n```py\nprint(1)\n```",
            "```python\nx = 1\n```\nDone.",
            "plain = True",
        ] {
            let once = extract_code(raw);
            assert_eq!(extract_code(&once), once, "input: {raw:?}");
        }
    }
}
