//! Block layout for a captured post subtree
//!
//! The subtree is first copied into a [`PostSnapshot`] so that nothing
//! borrowed from the caller's document outlives the start of a capture.
//! Layout then stacks the header, images and text lines vertically.

use std::collections::HashMap;

use scraper::ElementRef;

use crate::compose::is_quote_line;
use crate::theme::{Rgb, DEFAULT_QUOTE};

/// Monospace cell width in CSS px
pub const CHAR_WIDTH: u32 = 8;
/// Text line height in CSS px
pub const LINE_HEIGHT: u32 = 16;

const POST_PADDING: u32 = 16;
const HEADER_PADDING: u32 = 8;
const BLOCK_GAP: u32 = 8;
const MAX_IMAGE_HEIGHT: u32 = 384;

#[derive(Debug, Clone, PartialEq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x: x as i32, y: y as i32, width, height }
    }
}

/// A run of text with an optional inline color
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub color: Option<Rgb>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Header {
        name: Span,
        meta: Option<Span>,
        background: Option<Rgb>,
    },
    Image {
        src: String,
        cross_origin: bool,
    },
    Line {
        text: String,
        color: Option<Rgb>,
        quote: bool,
    },
}

/// Owned copy of everything in a post subtree that affects pixels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostSnapshot {
    pub color: Option<Rgb>,
    pub border: Option<Rgb>,
    pub blocks: Vec<Block>,
}

impl PostSnapshot {
    pub fn from_element(root: ElementRef<'_>) -> Self {
        let mut blocks = Vec::new();
        collect_blocks(root, &mut blocks);
        Self {
            color: style_color(root, "color"),
            border: style_color(root, "border-color"),
            blocks,
        }
    }

    /// `(src, has crossorigin attribute)` for every embedded image, in order
    pub fn images(&self) -> impl Iterator<Item = (&str, bool)> + '_ {
        self.blocks.iter().filter_map(|b| match b {
            Block::Image { src, cross_origin } => Some((src.as_str(), *cross_origin)),
            _ => None,
        })
    }
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

/// Read a hex color from the element's inline `style` attribute
pub(crate) fn style_color(el: ElementRef<'_>, property: &str) -> Option<Rgb> {
    let style = el.value().attr("style")?;
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case(property))
        .and_then(|(_, value)| value.trim().trim_end_matches("!important").trim().parse().ok())
}

fn collapsed_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn span_of(el: ElementRef<'_>) -> Span {
    Span { text: collapsed_text(el), color: style_color(el, "color") }
}

fn header_block(header: ElementRef<'_>) -> Block {
    let mut name = None;
    let mut meta = None;
    for node in header.descendants() {
        let Some(el) = ElementRef::wrap(node) else { continue };
        if name.is_none() && has_class(el, "post-name") {
            name = Some(span_of(el));
        } else if meta.is_none() && has_class(el, "post-meta") {
            meta = Some(span_of(el));
        }
    }
    Block::Header {
        name: name.unwrap_or_else(|| span_of(header)),
        meta,
        background: style_color(header, "background-color"),
    }
}

fn collect_blocks(el: ElementRef<'_>, out: &mut Vec<Block>) {
    for child in el.children() {
        let Some(child) = ElementRef::wrap(child) else { continue };
        let elem = child.value();
        if has_class(child, "post-header") {
            out.push(header_block(child));
        } else if elem.name() == "img" {
            if let Some(src) = elem.attr("src") {
                out.push(Block::Image {
                    src: src.to_string(),
                    cross_origin: elem.attr("crossorigin").is_some(),
                });
            }
        } else if elem.name() == "p" {
            let text: String = child.text().collect();
            let quote = has_class(child, "quote") || has_class(child, "greentext") || is_quote_line(&text);
            out.push(Block::Line { text, color: style_color(child, "color"), quote });
        } else {
            collect_blocks(child, out);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutContent {
    /// Filled and/or stroked box
    Panel { fill: Option<Rgb>, border: Option<Rgb> },
    Text { text: String, color: Rgb },
    Image { src: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub content: LayoutContent,
}

/// Positioned boxes plus the overall size of the post in CSS px
#[derive(Debug, Clone, PartialEq)]
pub struct PostLayout {
    pub width: u32,
    pub height: u32,
    pub nodes: Vec<LayoutNode>,
}

/// Lay out `snapshot` in a column `width` CSS px wide.
///
/// `image_sizes` maps an image `src` to its intrinsic size; images missing
/// from the map are skipped.
pub fn layout_post(snapshot: &PostSnapshot, width: u32, image_sizes: &HashMap<String, (u32, u32)>) -> PostLayout {
    let width = width.max(POST_PADDING * 2 + CHAR_WIDTH);
    let content_x = POST_PADDING;
    let content_w = width - POST_PADDING * 2;
    let chars_per_line = (content_w / CHAR_WIDTH).max(1) as usize;
    let text_color = snapshot.color.unwrap_or(Rgb::BLACK);

    let mut nodes = Vec::new();
    let mut y = POST_PADDING;

    for block in &snapshot.blocks {
        match block {
            Block::Header { name, meta, background } => {
                let height = LINE_HEIGHT + HEADER_PADDING * 2;
                nodes.push(LayoutNode {
                    rect: Rect::new(content_x, y, content_w, height),
                    content: LayoutContent::Panel { fill: *background, border: None },
                });

                let inner_w = content_w.saturating_sub(HEADER_PADDING * 2);
                let inner_chars = (inner_w / CHAR_WIDTH) as usize;
                let meta_text: String = meta
                    .as_ref()
                    .map(|m| m.text.chars().take(inner_chars).collect())
                    .unwrap_or_default();
                let meta_chars = meta_text.chars().count();
                let name_chars = inner_chars.saturating_sub(meta_chars + usize::from(meta_chars > 0));
                let name_text: String = name.text.chars().take(name_chars).collect();
                let text_y = y + HEADER_PADDING;

                if !name_text.is_empty() {
                    nodes.push(LayoutNode {
                        rect: Rect::new(content_x + HEADER_PADDING, text_y, text_width(&name_text), LINE_HEIGHT),
                        content: LayoutContent::Text { text: name_text, color: name.color.unwrap_or(text_color) },
                    });
                }
                if let Some(meta) = meta.as_ref().filter(|_| meta_chars > 0) {
                    let meta_w = text_width(&meta_text);
                    let meta_x = content_x + HEADER_PADDING + inner_w.saturating_sub(meta_w);
                    nodes.push(LayoutNode {
                        rect: Rect::new(meta_x, text_y, meta_w, LINE_HEIGHT),
                        content: LayoutContent::Text { text: meta_text, color: meta.color.unwrap_or(text_color) },
                    });
                }
                y += height + BLOCK_GAP;
            }
            Block::Image { src, .. } => {
                let Some(&(iw, ih)) = image_sizes.get(src) else { continue };
                let (w, h) = fit_within(iw, ih, content_w, MAX_IMAGE_HEIGHT);
                if w == 0 || h == 0 {
                    continue;
                }
                nodes.push(LayoutNode {
                    rect: Rect::new(content_x, y, w, h),
                    content: LayoutContent::Image { src: src.clone() },
                });
                y += h + BLOCK_GAP;
            }
            Block::Line { text, color, quote } => {
                let color = color.unwrap_or(if *quote { DEFAULT_QUOTE } else { text_color });
                for line in wrap_text(text, chars_per_line) {
                    nodes.push(LayoutNode {
                        rect: Rect::new(content_x, y, text_width(&line), LINE_HEIGHT),
                        content: LayoutContent::Text { text: line, color },
                    });
                    y += LINE_HEIGHT;
                }
            }
        }
    }

    let height = y + POST_PADDING;
    if let Some(border) = snapshot.border {
        nodes.insert(
            0,
            LayoutNode {
                rect: Rect::new(0, 0, width, height),
                content: LayoutContent::Panel { fill: None, border: Some(border) },
            },
        );
    }

    PostLayout { width, height, nodes }
}

fn text_width(text: &str) -> u32 {
    text.chars().count() as u32 * CHAR_WIDTH
}

/// Scale `(w, h)` down to fit inside `max_w` x `max_h`, keeping the aspect ratio
fn fit_within(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w == 0 || h == 0 {
        return (0, 0);
    }
    let scale = (max_w as f64 / w as f64).min(max_h as f64 / h as f64).min(1.0);
    let fw = ((w as f64 * scale).round() as u32).max(1);
    let fh = ((h as f64 * scale).round() as u32).max(1);
    (fw, fh)
}

/// Wrap a line at word boundaries, hard-splitting words longer than a line.
/// Empty input still occupies one line, as with `white-space: pre-wrap`.
fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > chars_per_line {
            if cur_len > 0 {
                lines.push(std::mem::take(&mut cur));
                cur_len = 0;
            }
            let rest = word.split_off(chars_per_line);
            lines.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let needed = if cur_len == 0 { word.len() } else { cur_len + 1 + word.len() };
        if needed > chars_per_line {
            lines.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if cur_len > 0 {
            cur.push(' ');
            cur_len += 1;
        }
        cur_len += word.len();
        cur.extend(word);
    }
    if cur_len > 0 || lines.is_empty() {
        lines.push(cur);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    const POST: &str = r#"<div class="post" style="color:#800000; border-color:#d9bfb7; background-color:#123456">
        <div class="post-header" style="background-color:#ffffee">
            <span class="post-name" style="color:#117743">Anonymous</span>
            <span class="post-meta">01/01/24 No.12345678</span>
        </div>
        <div class="post-body">
            <p class="quote">&gt;be me</p>
            <p>normal line</p>
            <p>&gt;unmarked quote</p>
        </div>
    </div>"#;

    fn snapshot(html: &str) -> PostSnapshot {
        let doc = Html::parse_fragment(html);
        let sel = Selector::parse(".post").unwrap();
        PostSnapshot::from_element(doc.select(&sel).next().unwrap())
    }

    #[test]
    fn snapshot_reads_header_lines_and_styles() {
        let snap = snapshot(POST);
        assert_eq!(snap.color, Some(Rgb::hex(0x800000)));
        assert_eq!(snap.border, Some(Rgb::hex(0xd9bfb7)));
        assert_eq!(snap.blocks.len(), 4);
        match &snap.blocks[0] {
            Block::Header { name, meta, background } => {
                assert_eq!(name.text, "Anonymous");
                assert_eq!(name.color, Some(Rgb::hex(0x117743)));
                assert_eq!(meta.as_ref().unwrap().text, "01/01/24 No.12345678");
                assert_eq!(*background, Some(Rgb::hex(0xffffee)));
            }
            other => panic!("unexpected block {:?}", other),
        }
        assert!(matches!(&snap.blocks[1], Block::Line { quote: true, .. }));
        assert!(matches!(&snap.blocks[2], Block::Line { quote: false, .. }));
        assert!(matches!(&snap.blocks[3], Block::Line { quote: true, .. }));
    }

    #[test]
    fn layout_stacks_blocks_and_uses_colors() {
        let snap = snapshot(POST);
        let layout = layout_post(&snap, 480, &HashMap::new());
        assert_eq!(layout.width, 480);
        // frame + header panel + name + meta + three lines
        assert_eq!(layout.nodes.len(), 7);
        let texts: Vec<_> = layout
            .nodes
            .iter()
            .filter_map(|n| match &n.content {
                LayoutContent::Text { text, color } => Some((text.as_str(), *color, n.rect.y)),
                _ => None,
            })
            .collect();
        assert_eq!(texts[2], (">be me", DEFAULT_QUOTE, texts[2].2));
        assert_eq!(texts[3].1, Rgb::hex(0x800000));
        assert!(texts[3].2 > texts[2].2);
        assert!(layout.height > texts[4].2 as u32);
    }

    #[test]
    fn images_scale_to_column() {
        let snap = snapshot(r#"<div class="post"><img src="data:x"><p>hi</p></div>"#);
        let mut sizes = HashMap::new();
        sizes.insert("data:x".to_string(), (1000u32, 500u32));
        let layout = layout_post(&snap, 232, &sizes);
        let img = layout
            .nodes
            .iter()
            .find(|n| matches!(n.content, LayoutContent::Image { .. }))
            .unwrap();
        assert_eq!(img.rect.width, 200);
        assert_eq!(img.rect.height, 100);
    }

    #[test]
    fn wrap_breaks_words_and_keeps_empty_lines() {
        assert_eq!(wrap_text("", 10), vec![String::new()]);
        assert_eq!(wrap_text("aaa bbb ccc", 7), vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn fit_never_upscales() {
        assert_eq!(fit_within(50, 40, 200, 384), (50, 40));
        assert_eq!(fit_within(100, 800, 200, 384), (48, 384));
    }
}
