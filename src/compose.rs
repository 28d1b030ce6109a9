//! Post composer: turns a draft into the themed markup that gets captured

use rand::Rng;

use crate::capture::images::encode_data_uri;
use crate::theme::ThemeDefinition;

pub const SAMPLE_GREENTEXT: &str = ">be me
>software developer
>working on greentext app
>finally implement the save as PNG feature
>feels good man";

/// Lines whose first non-blank character is `>` render in the accent color
pub fn is_quote_line(line: &str) -> bool {
    line.trim_start().starts_with('>')
}

/// Random 9-digit post number
pub fn random_post_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(100_000_000u32..=999_999_999).to_string()
}

/// Turn an uploaded file into an inline image source
pub fn image_data_uri(bytes: &[u8], mime: &str) -> String {
    encode_data_uri(mime, bytes)
}

/// Everything the form collects for a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub name: String,
    pub post_number: String,
    pub date_time: String,
    pub body: String,
    /// Inline image source (usually a `data:` URI)
    pub image: Option<String>,
}

impl Default for PostDraft {
    fn default() -> Self {
        Self {
            name: "Anonymous".to_string(),
            post_number: "12345678".to_string(),
            date_time: String::new(),
            body: SAMPLE_GREENTEXT.to_string(),
            image: None,
        }
    }
}

impl PostDraft {
    /// First line of the body, used to seed export filenames
    pub fn first_line(&self) -> &str {
        self.body.lines().next().unwrap_or("")
    }

    /// Markup for the post card with the theme's colors inlined.
    ///
    /// The root element carries the `post` class.
    pub fn render_markup(&self, theme: &ThemeDefinition) -> String {
        let mut html = format!(
            r#"<div class="post" data-theme="{}" style="background-color:{}; border-color:{}; color:{}">"#,
            escape(theme.id),
            theme.post_background,
            theme.border,
            theme.text_primary
        );
        html.push_str(&format!(
            r#"<div class="post-header" style="background-color:{}"><span class="post-name" style="color:{}">{}</span><span class="post-meta" style="color:{}">{} No.{}</span></div>"#,
            theme.header_background,
            theme.text_secondary,
            escape(&self.name),
            theme.text_secondary,
            escape(&self.date_time),
            escape(&self.post_number)
        ));
        if let Some(src) = &self.image {
            html.push_str(&format!(r#"<div class="post-image"><img src="{}" alt="Post"></div>"#, escape(src)));
        }
        html.push_str(r#"<div class="post-body">"#);
        for line in self.body.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if is_quote_line(line) {
                html.push_str(&format!(r#"<p class="quote" style="color:{}">{}</p>"#, theme.quote_color(), escape(line)));
            } else {
                html.push_str(&format!("<p>{}</p>", escape(line)));
            }
        }
        html.push_str("</div></div>");
        html
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
