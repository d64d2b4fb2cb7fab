//! Sanitizing raw HTML inside Markdown.
//!
//! pulldown-cmark passes raw HTML through untouched. [`SanitizeRawHtml`] sits
//! between the parser and whatever renders the events: inline HTML (one tag
//! per event) goes through [`Sanitizer::sanitize_tag`], HTML blocks go through
//! [`Sanitizer::sanitize_document`] as a whole, and link and image
//! destinations get the policy's scheme check. Every other event is passed on
//! unchanged, so the adapter can be stacked with other event filters.

use std::collections::VecDeque;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag, TagEnd};

use crate::sanitizer::Sanitizer;

pub struct SanitizeRawHtml<'p, 'a, I> {
    sanitizer: Sanitizer<'p>,
    inner: I,
    pending: VecDeque<Event<'a>>,
}

impl<'p, 'a, I> SanitizeRawHtml<'p, 'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    pub fn new(sanitizer: Sanitizer<'p>, inner: I) -> Self {
        SanitizeRawHtml {
            sanitizer,
            inner,
            pending: VecDeque::new(),
        }
    }

    // Collects the lines of an HTML block up to and including its end event
    // and queues them as one sanitized event.
    fn sanitize_block(&mut self) {
        let mut block = String::new();
        let mut end = None;
        for event in self.inner.by_ref() {
            match event {
                Event::Html(line) | Event::Text(line) => block.push_str(&line),
                Event::End(TagEnd::HtmlBlock) => {
                    end = Some(Event::End(TagEnd::HtmlBlock));
                    break;
                }
                other => {
                    // Blocks only ever hold raw lines; keep anything else
                    // after the block rather than losing it.
                    warn!("unexpected event inside HTML block: {:?}", other);
                    end = Some(other);
                    break;
                }
            }
        }

        let mut html = self.sanitizer.sanitize_document(&block);
        if !html.is_empty() {
            html.push('\n');
        }
        self.pending.push_back(Event::Html(CowStr::from(html)));
        self.pending.extend(end);
    }

    fn check_destination(&self, dest_url: CowStr<'a>) -> CowStr<'a> {
        if self.sanitizer.policy().allows_uri(&dest_url) {
            dest_url
        } else {
            trace!("dropping markdown destination {:?}", &*dest_url);
            CowStr::Borrowed("")
        }
    }
}

impl<'p, 'a, I> Iterator for SanitizeRawHtml<'p, 'a, I>
where
    I: Iterator<Item = Event<'a>>,
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        let event = match self.inner.next()? {
            Event::Start(Tag::HtmlBlock) => {
                self.sanitize_block();
                Event::Start(Tag::HtmlBlock)
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                Event::InlineHtml(CowStr::from(self.sanitizer.sanitize_tag(&html)))
            }
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: self.check_destination(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: self.check_destination(dest_url),
                title,
                id,
            }),
            event => event,
        };
        Some(event)
    }
}

/// Renders CommonMark (with tables and strikethrough) to HTML, sanitizing
/// any raw HTML it contains.
pub fn render_markdown(sanitizer: Sanitizer<'_>, markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::new();
    html::push_html(&mut output, SanitizeRawHtml::new(sanitizer, parser));
    output
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::policy::Policy;

    fn render(markdown: &str) -> String {
        let policy = Policy::default();
        render_markdown(Sanitizer::new(&policy), markdown)
    }

    #[test]
    fn plain_markdown_is_untouched() {
        assert_eq!(
            render("**bold** and *italic*"),
            "<p><strong>bold</strong> and <em>italic</em></p>\n"
        );
    }

    #[test]
    fn inline_tags_are_sanitized() {
        assert_eq!(
            render("a <span onclick=\"x()\" class=\"k\">b</span> c"),
            "<p>a <span class=\"k\">b</span> c</p>\n"
        );
        assert_eq!(
            render("a <iframe src=\"x\"> c"),
            "<p>a &lt;iframe src=\"x\"&gt; c</p>\n"
        );
    }

    #[test]
    fn html_blocks_are_sanitized() {
        assert_eq!(
            render("<div onclick=\"x()\">\n<b>hi</b>\n</div>\n"),
            "<div>\n<b>hi</b>\n</div>\n"
        );
        assert_eq!(
            render("<script>alert(1)</script>\n"),
            "&lt;script&gt;alert(1)&lt;/script&gt;\n"
        );
    }

    #[test]
    fn unsafe_link_destinations_are_emptied() {
        assert_eq!(
            render("[x](javascript:alert(1)) [y](https://example.com)"),
            "<p><a href=\"\">x</a> <a href=\"https://example.com\">y</a></p>\n"
        );
        assert_eq!(
            render("![i](javascript:alert(1))"),
            "<p><img src=\"\" alt=\"i\" /></p>\n"
        );
    }

    #[test]
    fn chains_with_other_filters() {
        let policy = Policy::default();
        let parser = Parser::new("<b>x</b> y").map(|event| match event {
            Event::Text(text) => Event::Text(CowStr::from(text.to_uppercase())),
            event => event,
        });
        let mut output = String::new();
        html::push_html(&mut output, SanitizeRawHtml::new(Sanitizer::new(&policy), parser));
        assert_eq!(output, "<p><b>X</b> Y</p>\n");
    }
}
