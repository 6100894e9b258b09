//! HTML rendering for the post listing.

use fetcher_store::posts::PostSummary;

const STYLESHEET: &str =
    "https://cdn.jsdelivr.net/npm/bootstrap@3.4.1/dist/css/bootstrap.min.css";

/// Escape text for use in element content and quoted attributes.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

pub fn render_index(term: &str, posts: &[PostSummary]) -> String {
    let term = escape_html(term);
    let mut items = String::new();
    for post in posts {
        let title = post.title.as_deref().map(escape_html).unwrap_or_default();
        let views = post
            .view_count
            .map(|v| format!(" &middot; {v} views"))
            .unwrap_or_default();
        items.push_str(&format!(
            "      <li class=\"list-group-item\">\
             <span class=\"badge\">{score}</span>\
             <a href=\"https://stackoverflow.com/q/{id}\">{title}</a>\
             <small class=\"text-muted\"> {date}{views}</small></li>\n",
            score = post.score,
            id = post.id,
            date = escape_html(&post.creation_date),
        ));
    }
    if posts.is_empty() {
        items.push_str("      <li class=\"list-group-item\">No matching posts.</li>\n");
    }

    format!(
        "<!DOCTYPE html>
<html lang=\"en\">
  <head>
    <meta charset=\"utf-8\">
    <title>Posts about {term}</title>
    <link rel=\"stylesheet\" href=\"{STYLESHEET}\">
  </head>
  <body>
    <div class=\"container\">
    <h1>Posts about {term}</h1>
    <ul class=\"list-group\">
{items}    </ul>
    </div>
  </body>
</html>
"
    )
}
