//! Meta-prompts for the optimizer and the judge, plus reply parsing.
//!
//! Both meta-prompts ask the model to answer inside XML tags; the
//! [`extract_tag`] helper pulls the tagged sections back out.

use crate::template::QaPair;

/// Asks the optimize model for a rewritten prompt.
///
/// Placeholders: `{requirements}`, `{prompt}`, `{answers}`,
/// `{golden_answers}`, `{count}`.
pub const OPTIMIZE_PROMPT: &str = "\
You are building a prompt to address a user requirement. Starting from the \
reference prompt below, reconstruct and optimize it. You may add, modify, or \
delete instructions. Make a single focused modification and describe it in \
the XML tags of your reply. Any thinking model may be used while optimizing.
The reference prompt performed best in a previous iteration. Improve on it \
further; the optimized prompt must differ from the reference.

requirements:
```
{requirements}
```

reference prompt:
```
{prompt}
```

Execution results of the reference prompt (some cases):
{answers}

The answers we expect (some cases):
{golden_answers}

Reply with your analysis, the modification, and the complete optimized prompt \
in this XML format:

<analyse>What is lacking in the results of the reference prompt and how to improve it.</analyse>
<modification>The key improvement, summarized in one sentence.</modification>
<prompt>The complete optimized prompt{count}</prompt>";

/// Asks the judge which of two answer sets better meets the requirements.
///
/// Placeholders: `{requirement}`, `{sample}`, `{new_sample}`, `{answers}`.
pub const EVALUATE_PROMPT: &str = "\
Based on the original requirements, evaluate the two responses, A and B, and \
decide which one better meets the requirements. If reference answers are \
given, follow their format and content strictly.

# Requirement
{requirement}

# A
{sample}

# B
{new_sample}

# Golden answer
{answers}

Give your analysis and the choice you consider better, using XML tags:

<analyse>Your analysis</analyse>
<choose>A or B (the better answer in your opinion)</choose>";

/// Render [`OPTIMIZE_PROMPT`].
pub fn optimize_prompt(
    requirements: &str,
    prompt: &str,
    answers_md: &str,
    golden_md: &str,
    count_clause: &str,
) -> String {
    // `{prompt}` goes last: user prompts may contain placeholder-like braces.
    OPTIMIZE_PROMPT
        .replace("{requirements}", requirements.trim())
        .replace("{answers}", answers_md)
        .replace("{golden_answers}", golden_md)
        .replace("{count}", count_clause)
        .replace("{prompt}", prompt.trim())
}

/// Render [`EVALUATE_PROMPT`].
pub fn evaluate_prompt(requirement: &str, sample_a: &str, sample_b: &str, golden: &str) -> String {
    EVALUATE_PROMPT
        .replace("{requirement}", requirement.trim())
        .replace("{answers}", golden)
        .replace("{new_sample}", sample_b)
        .replace("{sample}", sample_a)
}

/// Extract the first `<tag>…</tag>` section, trimmed. Spans newlines.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = text.find(&open)? + open.len();
    let rest = text.get(start..)?;
    let end = rest.find(&close)?;
    rest.get(..end).map(|s| s.trim().to_string())
}

/// Render question/answer pairs as a fenced markdown block: numbered
/// `Question i` / `Answer i` sections separated by `---` lines.
pub fn qa_to_markdown(pairs: &[QaPair]) -> String {
    let mut out = String::from("```\n");
    for (i, pair) in pairs.iter().enumerate() {
        let n = i + 1;
        out.push_str(&format!("Question {n}\n\n{}\n\n", pair.question));
        out.push_str(&format!("Answer {n}\n\n{}\n\n", pair.answer));
        if n < pairs.len() {
            out.push_str("---\n\n");
        }
    }
    out.push_str("\n```");
    out
}

/// Render an answer set for the judge.
pub fn answers_for_judge(pairs: &[QaPair]) -> String {
    pairs
        .iter()
        .map(|p| format!("Question: {}\nAnswer: {}", p.question, p.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_tag_multiline_and_trimmed() {
        let reply = "<analyse>weak</analyse>\n<prompt>\nLine one\nLine two\n</prompt>";
        assert_eq!(
            extract_tag(reply, "prompt").as_deref(),
            Some("Line one\nLine two")
        );
        assert_eq!(extract_tag(reply, "analyse").as_deref(), Some("weak"));
    }

    #[test]
    fn extract_tag_missing_or_unclosed() {
        assert_eq!(extract_tag("no tags here", "prompt"), None);
        assert_eq!(extract_tag("<prompt>never closed", "prompt"), None);
    }

    #[test]
    fn extract_tag_takes_first_match() {
        let reply = "<choose>B</choose> later <choose>A</choose>";
        assert_eq!(extract_tag(reply, "choose").as_deref(), Some("B"));
    }

    #[test]
    fn optimize_prompt_fills_every_placeholder() {
        let rendered = optimize_prompt("Be brief.", "Say hi.", "ANS", "GOLD", ", within 50 words");
        assert!(rendered.contains("Be brief."));
        assert!(rendered.contains("Say hi."));
        assert!(rendered.contains("ANS"));
        assert!(rendered.contains("GOLD"));
        assert!(rendered.contains("<prompt>The complete optimized prompt, within 50 words</prompt>"));
        assert!(!rendered.contains("{requirements}"));
        assert!(!rendered.contains("{golden_answers}"));
    }

    #[test]
    fn braces_in_prompt_survive_rendering() {
        let rendered = optimize_prompt("r", "Fill in {answers} here", "A", "G", "");
        assert!(rendered.contains("Fill in {answers} here"));
    }

    #[test]
    fn evaluate_prompt_orders_a_and_b() {
        let rendered = evaluate_prompt("req", "first", "second", "gold");
        let a = rendered.find("# A\nfirst").unwrap();
        let b = rendered.find("# B\nsecond").unwrap();
        assert!(a < b);
        assert!(rendered.contains("# Golden answer\ngold"));
    }

    #[test]
    fn markdown_separates_pairs() {
        let pairs = vec![QaPair::new("q1", "a1"), QaPair::new("q2", "a2")];
        let md = qa_to_markdown(&pairs);
        assert!(md.starts_with("```\nQuestion 1\n\nq1\n\nAnswer 1\n\na1\n\n---\n\n"));
        assert!(md.ends_with("Answer 2\n\na2\n\n\n```"));
        assert_eq!(md.matches("---").count(), 1);
    }

    #[test]
    fn markdown_empty_list() {
        assert_eq!(qa_to_markdown(&[]), "```\n\n```");
    }
}
