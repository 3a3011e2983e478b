//! Prompt construction for the daily digest.
//!
//! Discussions are rendered in full while the configured character budget
//! allows it. Once it does not, the remaining discussions are excerpted and
//! then dropped from the lowest-ranked end, so the highest-ranked ones reach
//! the model intact.

use std::fmt::Write as _;
use subdigest_core::{CollectionResult, Comment, Discussion, GenerationSettings};

/// Characters kept from a discussion body once the budget forces excerpts.
pub const BODY_EXCERPT_CHARS: usize = 1_500;
/// Characters kept from each comment once the budget forces excerpts.
pub const COMMENT_EXCERPT_CHARS: usize = 500;
/// Smallest slice of the top discussion sent when nothing else fits.
pub const MIN_CONTENT_CHARS: usize = 500;

const OMISSION_NOTE_RESERVE: usize = 120;

/// A rendered prompt and how much of the collection made it in.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub text: String,
    pub included: usize,
    pub omitted: usize,
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    language: String,
    max_prompt_chars: usize,
}

impl PromptBuilder {
    pub fn new(settings: &GenerationSettings) -> Self {
        Self {
            language: settings.language.clone(),
            max_prompt_chars: settings.max_prompt_chars,
        }
    }

    pub fn system_message(&self, community: &str) -> String {
        format!(
            "You are a professional newsletter writer for the r/{community} community. \
             Write the newsletter in {language}, keeping technical terms in English when appropriate. \
             Use Markdown formatting and include every relevant link mentioned in the content. \
             Keep a professional but accessible tone, explaining technical concepts clearly.",
            community = community,
            language = self.language
        )
    }

    pub fn build(&self, result: &CollectionResult, title: &str) -> Prompt {
        let date = result.collection_date();
        let header = format!(
            "Write a professional newsletter for r/{} based on today's top discussions ({}).\n\n\
             Content to analyze:\n",
            result.community, date
        );
        let instructions = self.instructions(&result.community, title, &date);

        let fixed = char_len(&header) + char_len(&instructions) + OMISSION_NOTE_RESERVE;
        let budget = self.max_prompt_chars.saturating_sub(fixed);

        let mut content = String::new();
        let mut used = 0usize;
        let mut included = 0usize;

        for (index, discussion) in result.discussions.iter().enumerate() {
            let rank = index + 1;
            let full = render_discussion(rank, discussion);
            let rendered = if used + char_len(&full) <= budget {
                full
            } else {
                render_discussion_excerpt(rank, discussion)
            };
            let len = char_len(&rendered);

            if used + len <= budget {
                content.push_str(&rendered);
                used += len;
                included += 1;
                continue;
            }

            if included == 0 {
                // The top discussion alone is over budget: send its head.
                content.push_str(&cut_chars(&rendered, budget.max(MIN_CONTENT_CHARS)));
                content.push('\n');
                included = 1;
            }
            break;
        }

        let omitted = result.discussions.len() - included;
        if result.discussions.is_empty() {
            content.push_str("\n(No discussions were collected today.)\n");
        } else if omitted > 0 {
            let _ = writeln!(
                content,
                "\n({} lower-ranked discussions omitted to fit the input size limit.)",
                omitted
            );
        }

        Prompt {
            text: format!("{}{}{}", header, content, instructions),
            included,
            omitted,
        }
    }

    fn instructions(&self, community: &str, title: &str, date: &str) -> String {
        format!(
            r###"
Please write the newsletter following these guidelines:

1. **Title**: "{title}"
2. **Date**: include the date in the format "## {date}"
3. **Structure**: organize the content into 6 to 8 main themes
4. **For each theme**:
   - Start the section heading with a relevant emoji
   - Open with an engaging introductory paragraph
   - Include specific numbers and relevant technical details
   - Reference users with the format "**u/username**"
   - Highlight key terms and statistics in **bold**
   - Include the relevant links mentioned in posts and comments
5. **Final section**: close with a section titled "Future Perspectives", translated into {language}
6. **Formatting**: use Markdown for all formatting
7. **Focus**: prioritize technical accuracy and practical insights
8. **Language**: write in {language}, keeping technical terms in English when appropriate
9. **Sign-off**: end with a short note saying the information comes from r/{community}
"###,
            title = title,
            date = date,
            language = self.language,
            community = community
        )
    }
}

/// Human-readable rendering of one discussion, body and comments untouched.
pub fn render_discussion(rank: usize, discussion: &Discussion) -> String {
    render(rank, discussion, None)
}

/// Same as [`render_discussion`] with the body and comments excerpted.
pub fn render_discussion_excerpt(rank: usize, discussion: &Discussion) -> String {
    render(rank, discussion, Some((BODY_EXCERPT_CHARS, COMMENT_EXCERPT_CHARS)))
}

fn render(rank: usize, discussion: &Discussion, limits: Option<(usize, usize)>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n### Discussion {}: {}", rank, discussion.title);
    let _ = writeln!(out, "Author: u/{}", discussion.author);
    let _ = writeln!(
        out,
        "Score: {} | Comments: {}",
        discussion.score, discussion.num_comments
    );
    let _ = writeln!(out, "Reddit link: {}", discussion.permalink);
    if let Some(url) = &discussion.external_url {
        let _ = writeln!(out, "External link: {}", url);
    }

    let body = match limits {
        Some((body_chars, _)) => excerpt(&discussion.body, body_chars),
        None => discussion.body.trim().to_string(),
    };
    if !body.is_empty() {
        let _ = writeln!(out, "Content: {}", body);
    }

    if !discussion.comments.is_empty() {
        out.push_str("Top comments:\n");
        for comment in &discussion.comments {
            out.push_str(&render_comment(comment, limits.map(|(_, chars)| chars)));
        }
    }

    if !discussion.links.is_empty() {
        let links: Vec<&str> = discussion.links.iter().map(String::as_str).collect();
        let _ = writeln!(out, "Links mentioned: {}", links.join(", "));
    }
    out
}

fn render_comment(comment: &Comment, max_chars: Option<usize>) -> String {
    let body = match max_chars {
        Some(chars) => excerpt(&comment.body, chars),
        None => comment.body.trim().to_string(),
    };
    format!("- u/{} (score {}): {}\n", comment.author, comment.score, body)
}

/// Collapses whitespace and cuts at `max_chars`, marking the cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flattened = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&flattened) <= max_chars {
        flattened
    } else {
        let mut cut = cut_chars(&flattened, max_chars);
        cut.push('…');
        cut
    }
}

fn cut_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn settings(max_prompt_chars: usize) -> GenerationSettings {
        GenerationSettings {
            max_prompt_chars,
            ..Default::default()
        }
    }

    fn discussion(id: &str, title: &str, body: &str) -> Discussion {
        Discussion {
            id: id.to_string(),
            title: title.to_string(),
            author: "alice".to_string(),
            score: 120,
            permalink: format!("https://www.reddit.com/r/LocalLLaMA/comments/{}/x/", id),
            external_url: None,
            body: body.to_string(),
            created_utc: "2024-05-01T10:00:00Z".parse().unwrap(),
            num_comments: 3,
            comments: vec![Comment {
                author: "bob".to_string(),
                body: "Runs at 40 tok/s on a 3090".to_string(),
                score: 17,
                created_utc: "2024-05-01T11:00:00Z".parse().unwrap(),
            }],
            links: BTreeSet::from(["https://github.com/org/repo".to_string()]),
        }
    }

    fn collection(discussions: Vec<Discussion>) -> CollectionResult {
        let mut result = CollectionResult::new("LocalLLaMA", 20, 5);
        result.collected_at = "2024-05-01T18:00:00Z".parse().unwrap();
        result.discussions = discussions;
        result
    }

    #[test]
    fn test_prompt_carries_format_instructions() {
        let builder = PromptBuilder::new(&settings(60_000));
        let prompt = builder.build(
            &collection(vec![discussion("a", "Llama 4 released", "")]),
            "LocalLLaMA Community Newsletter",
        );

        assert!(prompt.text.contains("\"LocalLLaMA Community Newsletter\""));
        assert!(prompt.text.contains("## 2024-05-01"));
        assert!(prompt.text.contains("6 to 8 main themes"));
        assert!(prompt.text.contains("emoji"));
        assert!(prompt.text.contains("**u/username**"));
        assert!(prompt.text.contains("Future Perspectives"));
        assert!(prompt.text.contains("Brazilian Portuguese"));
        assert_eq!(prompt.included, 1);
        assert_eq!(prompt.omitted, 0);
    }

    #[test]
    fn test_discussion_rendering() {
        let mut d = discussion("a", "Llama 4 released", "Line one\n\n  line two");
        d.external_url = Some("https://ai.meta.com/llama".to_string());
        let rendered = render_discussion(1, &d);

        assert!(rendered.contains("### Discussion 1: Llama 4 released"));
        assert!(rendered.contains("Author: u/alice"));
        assert!(rendered.contains("Score: 120 | Comments: 3"));
        assert!(rendered.contains("External link: https://ai.meta.com/llama"));
        assert!(rendered.contains("Content: Line one\n\n  line two"));
        assert!(rendered.contains("- u/bob (score 17): Runs at 40 tok/s on a 3090"));
        assert!(rendered.contains("Links mentioned: https://github.com/org/repo"));

        let excerpted = render_discussion_excerpt(1, &d);
        assert!(excerpted.contains("Content: Line one line two"));
    }

    #[test]
    fn test_top_discussion_body_kept_in_full_when_it_fits() {
        let body = format!("{}the closing sentence of a long post", "benchmark numbers ".repeat(170));
        assert!(char_len(&body) > BODY_EXCERPT_CHARS);

        let prompt = PromptBuilder::new(&settings(60_000)).build(
            &collection(vec![
                discussion("a", "Long write-up", &body),
                discussion("b", "Short one", "tiny"),
            ]),
            "T",
        );

        assert!(prompt.text.contains(body.trim()));
        assert!(prompt.text.contains("the closing sentence of a long post"));
        assert_eq!(prompt.included, 2);
        assert_eq!(prompt.omitted, 0);
    }

    #[test]
    fn test_lower_ranked_discussions_are_excerpted_before_dropped() {
        let body = "detail ".repeat(400);
        let discussions = vec![
            discussion("a", "First", &body),
            discussion("b", "Second", &body),
        ];
        let full = PromptBuilder::new(&settings(1_000_000)).build(&collection(discussions.clone()), "T");
        // Room for the first in full, but only an excerpt of the second.
        let limit = char_len(&full.text) - 600;

        let prompt = PromptBuilder::new(&settings(limit)).build(&collection(discussions), "T");

        assert_eq!(prompt.included, 2);
        assert_eq!(prompt.omitted, 0);
        assert!(prompt.text.contains(body.trim()));
        assert!(prompt.text.contains('…'));
        assert!(char_len(&prompt.text) <= limit);
    }

    #[test]
    fn test_budget_drops_lowest_ranked_discussions() {
        let body = "word ".repeat(250);
        let discussions: Vec<Discussion> = (1..=6)
            .map(|i| discussion(&format!("p{}", i), &format!("Topic number {}", i), &body))
            .collect();
        let full = PromptBuilder::new(&settings(1_000_000)).build(&collection(discussions.clone()), "T");
        let limit = char_len(&full.text) - 2_000;

        let prompt = PromptBuilder::new(&settings(limit)).build(&collection(discussions), "T");

        assert!(char_len(&prompt.text) <= limit);
        assert!(prompt.included >= 1);
        assert!(prompt.omitted >= 1);
        assert_eq!(prompt.included + prompt.omitted, 6);
        assert!(prompt.text.contains("Topic number 1"));
        assert!(!prompt.text.contains("Topic number 6"));
        assert!(prompt
            .text
            .contains(&format!("({} lower-ranked discussions omitted", prompt.omitted)));
    }

    #[test]
    fn test_oversized_top_discussion_is_cut_not_dropped() {
        let huge = "token ".repeat(5_000);
        let prompt = PromptBuilder::new(&settings(100)).build(
            &collection(vec![
                discussion("a", "The big one", &huge),
                discussion("b", "Second", ""),
            ]),
            "T",
        );

        assert_eq!(prompt.included, 1);
        assert_eq!(prompt.omitted, 1);
        assert!(prompt.text.contains("The big one"));
        assert!(!prompt.text.contains("Second"));
    }

    #[test]
    fn test_empty_collection() {
        let prompt = PromptBuilder::new(&settings(60_000)).build(&collection(Vec::new()), "T");
        assert!(prompt.text.contains("No discussions were collected today"));
        assert_eq!(prompt.included, 0);
        assert_eq!(prompt.omitted, 0);
    }

    #[test]
    fn test_excerpt_is_char_safe() {
        let text = "ação ".repeat(10);
        let cut = excerpt(&text, 7);
        assert_eq!(cut, "ação aç…");
        assert_eq!(excerpt("short", 10), "short");
    }

    #[test]
    fn test_system_message() {
        let builder = PromptBuilder::new(&settings(60_000));
        let system = builder.system_message("LocalLLaMA");
        assert!(system.contains("r/LocalLLaMA"));
        assert!(system.contains("Brazilian Portuguese"));
        assert!(system.contains("Markdown"));
    }
}
