use scraper::ElementRef;

/// Tags whose subtree never contributes rendered text.
pub(crate) const NON_RENDERED_TAGS: &[&str] = &[
    "script", "style", "template", "noscript", "head", "meta", "link", "title", "svg",
];

/// Reports whether the element is rendered.
///
/// A parsed snapshot carries no computed styles or layout boxes, so this
/// checks the static signals a page can declare: the `hidden` attribute,
/// `aria-hidden`, inline `display`/`visibility`/zero-size styles, and
/// non-rendered tags. The element and all its ancestors must be clear of
/// them. Side-effect-free.
pub fn is_visible(element: ElementRef<'_>) -> bool {
    if element_hidden(element) {
        return false;
    }
    element.ancestors().all(|ancestor| {
        ElementRef::wrap(ancestor).map_or(true, |el| !element_hidden(el))
    })
}

/// Hidden signals on the element itself, ignoring ancestors.
pub(crate) fn element_hidden(element: ElementRef<'_>) -> bool {
    let value = element.value();
    if NON_RENDERED_TAGS.contains(&value.name()) {
        return true;
    }
    if value.attr("hidden").is_some() {
        return true;
    }
    if value.attr("aria-hidden") == Some("true") {
        return true;
    }
    value.attr("style").is_some_and(style_hides)
}

fn style_hides(style: &str) -> bool {
    for declaration in style.split(';') {
        let mut parts = declaration.splitn(2, ':');
        let (Some(prop), Some(val)) = (parts.next(), parts.next()) else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let val = val.trim().to_ascii_lowercase();
        let hides = match prop.as_str() {
            "display" => val == "none",
            "visibility" => val == "hidden",
            "width" | "height" => val == "0" || val == "0px",
            _ => false,
        };
        if hides {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first_div(html: &Html) -> ElementRef<'_> {
        let selector = Selector::parse("div").expect("selector");
        html.select(&selector).next().expect("div present")
    }

    #[test]
    fn plain_element_is_visible() {
        let html = Html::parse_document("<div>text</div>");
        assert!(is_visible(first_div(&html)));
    }

    #[test]
    fn inline_display_none_hides() {
        let html = Html::parse_document(r#"<div style="display: none">text</div>"#);
        assert!(!is_visible(first_div(&html)));
    }

    #[test]
    fn hidden_attribute_hides() {
        let html = Html::parse_document("<div hidden>text</div>");
        assert!(!is_visible(first_div(&html)));
    }

    #[test]
    fn aria_hidden_hides() {
        let html = Html::parse_document(r#"<div aria-hidden="true">text</div>"#);
        assert!(!is_visible(first_div(&html)));
    }

    #[test]
    fn hidden_ancestor_hides_descendants() {
        let html =
            Html::parse_document(r#"<section style="visibility:hidden"><div>inner</div></section>"#);
        assert!(!is_visible(first_div(&html)));
    }

    #[test]
    fn zero_size_style_hides() {
        let html = Html::parse_document(r#"<div style="width:0;height:0">text</div>"#);
        assert!(!is_visible(first_div(&html)));
    }

    #[test]
    fn other_styles_do_not_hide() {
        let html = Html::parse_document(r#"<div style="color: red; width: 10px">text</div>"#);
        assert!(is_visible(first_div(&html)));
    }
}
