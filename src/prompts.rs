//! Structured study-prompt extraction.
//!
//! Three fixed markers are recognized on the text beginning a top-level
//! paragraph: `Q. ` (question), `A. ` (answer), and `C. ` (cloze deletion).
//! Paragraphs are scanned in strict document order, all three classes
//! together, and consumed paragraphs are removed from the tree in one
//! identity-based pass at the end.

use crate::{
    note::Prompt,
    tree::{DocNode, DocTree, NodeIx},
};

pub const QUESTION_PREFIX: &str = "Q. ";
pub const ANSWER_PREFIX: &str = "A. ";
pub const CLOZE_PREFIX: &str = "C. ";

/// Line boundary separating an embedded answer from its question.
const ANSWER_BOUNDARY: &str = "\nA. ";

/// Extract prompts from the tree, mutating it: cloze paragraphs are replaced
/// by their display form, QA paragraphs are removed. Malformed sequences
/// (orphan question, orphan answer) warn and leave the text in place.
pub fn extract_prompts(tree: &mut DocTree, note_path: &str) -> Vec<Prompt> {
    let mut prompts = Vec::new();
    let mut marked: Vec<NodeIx> = Vec::new();

    let order: Vec<NodeIx> = tree.root().to_vec();
    for ix in order {
        let Some(lead) = tree.leading_text(ix) else {
            continue;
        };
        if lead.starts_with(CLOZE_PREFIX) {
            // The recorded content keeps the marker and the deletion braces;
            // the displayed paragraph drops both.
            let content = tree.paragraph_markdown(ix);
            let display: String = content
                .strip_prefix(CLOZE_PREFIX)
                .unwrap_or(&content)
                .chars()
                .filter(|c| *c != '{' && *c != '}')
                .collect();
            prompts.push(Prompt::Cloze { content });
            let text = tree.alloc(DocNode::Text(display));
            let replacement = tree.alloc(DocNode::Paragraph {
                children: vec![text],
            });
            tree.replace_root(ix, replacement);
        } else if lead.starts_with(QUESTION_PREFIX) {
            let markdown = tree.paragraph_markdown(ix);
            if let Some(pos) = markdown.find(ANSWER_BOUNDARY) {
                // The answer is embedded in the same paragraph.
                let question = markdown[QUESTION_PREFIX.len()..pos].to_string();
                let answer = markdown[pos + ANSWER_BOUNDARY.len()..].to_string();
                prompts.push(Prompt::Qa { question, answer });
                marked.push(ix);
            } else {
                // The answer should be the next top-level sibling.
                let sibling = tree.next_root_sibling(ix).filter(|s| {
                    tree.leading_text(*s)
                        .map(|text| text.starts_with(ANSWER_PREFIX))
                        .unwrap_or(false)
                });
                match sibling {
                    Some(sibling) => {
                        let question = markdown[QUESTION_PREFIX.len()..].to_string();
                        let answer_markdown = tree.paragraph_markdown(sibling);
                        let answer = answer_markdown[ANSWER_PREFIX.len()..].to_string();
                        prompts.push(Prompt::Qa { question, answer });
                        marked.push(ix);
                        marked.push(sibling);
                    }
                    None => {
                        tracing::warn!(
                            "Note '{note_path}' has an unexpected question prompt: '{markdown}'"
                        );
                    }
                }
            }
        } else if lead.starts_with(ANSWER_PREFIX) && !marked.contains(&ix) {
            let markdown = tree.paragraph_markdown(ix);
            tracing::warn!("Note '{note_path}' has an unexpected answer prompt: '{markdown}'");
        }
    }

    tree.remove_root_set(&marked);
    prompts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{parse_document, render_html};

    fn extract(text: &str) -> (Vec<Prompt>, DocTree) {
        let (mut tree, _) = parse_document(text).unwrap();
        let prompts = extract_prompts(&mut tree, "/test.md");
        (prompts, tree)
    }

    #[test]
    fn qa_embedded_answer() {
        let (prompts, tree) = extract("Q. What is 2+2?\nA. 4");
        assert_eq!(
            prompts,
            vec![Prompt::Qa {
                question: "What is 2+2?".to_string(),
                answer: "4".to_string(),
            }]
        );
        let html = render_html(&tree).unwrap();
        assert!(!html.contains("What is 2+2?"));
        assert!(!html.contains("4"));
    }

    #[test]
    fn qa_sibling_answer() {
        let (prompts, tree) = extract("Q. Capital of France?\n\nA. Paris\n\nPlain text.");
        assert_eq!(
            prompts,
            vec![Prompt::Qa {
                question: "Capital of France?".to_string(),
                answer: "Paris".to_string(),
            }]
        );
        let html = render_html(&tree).unwrap();
        assert!(!html.contains("Capital of France?"));
        assert!(!html.contains("Paris"));
        assert!(html.contains("Plain text."));
    }

    #[test]
    fn cloze_keeps_braces_in_content_strips_them_in_display() {
        let (prompts, tree) = extract("C. The capital of France is {Paris}.");
        assert_eq!(
            prompts,
            vec![Prompt::Cloze {
                content: "C. The capital of France is {Paris}.".to_string(),
            }]
        );
        let html = render_html(&tree).unwrap();
        assert!(html.contains("The capital of France is Paris."));
        assert!(!html.contains("C. "));
        assert!(!html.contains('{'));
    }

    #[test]
    fn orphan_question_left_in_place() {
        let (prompts, tree) = extract("Q. Who knows?\n\nNot an answer.");
        assert!(prompts.is_empty());
        let html = render_html(&tree).unwrap();
        assert!(html.contains("Q. Who knows?"));
        assert!(html.contains("Not an answer."));
    }

    #[test]
    fn orphan_answer_left_in_place() {
        let (prompts, tree) = extract("A. To a question never asked.");
        assert!(prompts.is_empty());
        let html = render_html(&tree).unwrap();
        assert!(html.contains("A. To a question never asked."));
    }

    #[test]
    fn consumed_answer_does_not_warn_as_orphan() {
        // The sibling answer is visited after its question marked it; it must
        // be treated as consumed, not as an orphan.
        let (prompts, _) = extract("Q. One?\n\nA. Yes");
        assert_eq!(prompts.len(), 1);
    }

    #[test]
    fn prompts_preserve_document_order_across_classes() {
        let (prompts, _) = extract(
            "C. First {cloze}.\n\nQ. Second question?\nA. Indeed\n\nC. Third {one}.",
        );
        assert!(matches!(prompts[0], Prompt::Cloze { .. }));
        assert!(matches!(prompts[1], Prompt::Qa { .. }));
        assert!(matches!(prompts[2], Prompt::Cloze { .. }));
    }

    #[test]
    fn prompt_with_wikilink_serializes_token_form() {
        let (prompts, _) = extract("Q. Where does [[Welcome]] link?\nA. Home");
        assert_eq!(
            prompts,
            vec![Prompt::Qa {
                question: "Where does [[Welcome]] link?".to_string(),
                answer: "Home".to_string(),
            }]
        );
    }
}
