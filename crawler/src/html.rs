use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};

/// Text under `el`, skipping anything inside the `hidden` element names.
/// Text nodes are trimmed and joined with single spaces.
pub fn visible_text(el: ElementRef<'_>, hidden: &[&str]) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else { continue };
        if within_hidden(node, el, hidden) {
            continue;
        }
        let t = text.trim();
        if !t.is_empty() {
            parts.push(t);
        }
    }
    parts.join(" ")
}

fn within_hidden(node: NodeRef<'_, Node>, root: ElementRef<'_>, hidden: &[&str]) -> bool {
    std::iter::once(node)
        .chain(node.ancestors())
        .take_while(|a| a.id() != root.id())
        .any(|a| a.value().as_element().is_some_and(|e| hidden.contains(&e.name())))
}

/// Visible text of every `blocks` match inside `container`, one per line.
pub fn block_text(container: ElementRef<'_>, blocks: &Selector, hidden: &[&str]) -> String {
    container
        .select(blocks)
        .filter(|b| !within_hidden(**b, container, hidden))
        .map(|b| visible_text(b, hidden))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First element matching any of `selectors`, tried in order.
pub fn first_match<'a>(doc: &'a Html, selectors: &[&Selector]) -> Option<ElementRef<'a>> {
    selectors.iter().find_map(|s| doc.select(s).next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_elements_are_skipped() {
        let doc = Html::parse_fragment("<div><p>Find <b>max</b></p><script>var x = 1;</script><style>p{}</style></div>");
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        assert_eq!(visible_text(div, &["script", "style"]), "Find max");
    }

    #[test]
    fn blocks_are_joined_by_newline() {
        let doc = Html::parse_fragment("<div><p>one</p><p> </p><pre>two</pre></div>");
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        let blocks = Selector::parse("p, pre").unwrap();
        assert_eq!(block_text(div, &blocks, &[]), "one\ntwo");
    }
}
