/// Turn an arbitrary catalog title into a stable, filesystem-safe name.
///
/// Every character outside `[A-Za-z0-9]` is replaced with a single
/// underscore; length and case are preserved. Empty input yields `"_"`
/// so a degenerate title can never produce an empty path segment.
pub fn sanitize(title: &str) -> String {
    if title.is_empty() {
        return "_".to_owned();
    }

    title
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_every_non_alphanumeric_with_underscore() {
        assert_eq!(sanitize("Lesson #1"), "Lesson__1");
        assert_eq!(sanitize("Lesson: Two"), "Lesson__Two");
        assert_eq!(sanitize("Advanced Topics!"), "Advanced_Topics_");
        assert_eq!(sanitize("Intro"), "Intro");
    }

    #[test]
    fn preserves_length_and_case() {
        let input = "AbC 12-3/xyz";
        let output = sanitize(input);
        assert_eq!(output.len(), input.len());
        assert_eq!(output, "AbC_12_3_xyz");
    }

    #[test]
    fn empty_and_whitespace_titles_stay_non_empty() {
        assert_eq!(sanitize(""), "_");
        assert_eq!(sanitize("   "), "___");
        assert_eq!(sanitize("\t\n"), "__");
    }

    #[test]
    fn output_alphabet_is_restricted_for_arbitrary_input() {
        let inputs = [
            "日本語のタイトル",
            "emoji 🎉 title",
            "a/b\\c:d*e?f\"g<h>i|j",
            "trailing space ",
            "..",
        ];
        for input in inputs {
            let output = sanitize(input);
            assert!(!output.is_empty(), "empty output for {input:?}");
            assert!(
                output
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "unexpected char in output for {input:?}: {output:?}"
            );
        }
    }

    #[test]
    fn is_deterministic() {
        let input = "Some £ wild ±\ntitle";
        assert_eq!(sanitize(input), sanitize(input));
    }
}
