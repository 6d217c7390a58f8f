//! Lift `{width="W" height="H"}` annotations onto the image they follow.

use refmark_core::{Document, Transformer};
use refmark_std::{Node, NodeKind, prop};

use crate::patterns::SIZE_ANNOTATION;

/// Width and height from a size annotation anywhere in `text`.
pub fn size_annotation(text: &str) -> Option<(String, String)> {
    let caps = SIZE_ANNOTATION.captures(text)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Lift size annotations within one sibling list.
///
/// An image immediately followed by a text node carrying an annotation
/// takes its `width`/`height`, and that text node is removed. The whole
/// node goes, including any text around the annotation.
///
/// Returns the number of images sized.
pub fn lift_image_sizes(children: &mut Vec<Node>) -> usize {
    let mut sized = 0;
    let mut i = 0;
    while i + 1 < children.len() {
        if children[i].is(NodeKind::Image)
            && children[i + 1].is(NodeKind::Text)
            && let Some((width, height)) = children[i + 1]
                .props
                .get_str(prop::CONTENT)
                .and_then(size_annotation)
        {
            let image = &mut children[i];
            image.props.set(prop::WIDTH, width);
            image.props.set(prop::HEIGHT, height);
            children.remove(i + 1);
            sized += 1;
        }
        i += 1;
    }
    sized
}

/// Tree-wide size lifting, for trees built without the parse-time hook.
pub struct ImageSizes;

impl ImageSizes {
    fn transform_node(node: &mut Node) {
        lift_image_sizes(&mut node.children);
        for child in &mut node.children {
            Self::transform_node(child);
        }
    }
}

impl Transformer for ImageSizes {
    fn name(&self) -> &str {
        "image_sizes"
    }

    fn transform(&self, mut doc: Document) -> Document {
        Self::transform_node(&mut doc.content);
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refmark_std::helpers;

    #[test]
    fn test_lift_exact_annotation() {
        let mut children = vec![
            helpers::image("a.png", "alt"),
            helpers::text(r#"{width="3in" height="50"}"#),
        ];
        assert_eq!(lift_image_sizes(&mut children), 1);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].props.get_str(prop::WIDTH), Some("3in"));
        assert_eq!(children[0].props.get_str(prop::HEIGHT), Some("50"));
    }

    #[test]
    fn test_trailing_text_is_consumed_with_annotation() {
        // The annotation's whole text node goes, not just the matched part.
        let mut children = vec![
            helpers::image("a.png", "alt"),
            helpers::text(r#"{width="10" height="20"} and more"#),
            helpers::text("kept"),
        ];
        lift_image_sizes(&mut children);
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].props.get_str(prop::CONTENT), Some("kept"));
    }

    #[test]
    fn test_no_match_leaves_image_unsized() {
        let mut children = vec![
            helpers::image("a.png", "alt"),
            helpers::text(r#"{width="10"}"#),
        ];
        assert_eq!(lift_image_sizes(&mut children), 0);
        assert_eq!(children.len(), 2);
        assert!(!children[0].props.contains(prop::WIDTH));
    }

    #[test]
    fn test_only_immediate_sibling_counts() {
        let mut children = vec![
            helpers::image("a.png", "alt"),
            helpers::emphasis([helpers::text("x")]),
            helpers::text(r#"{width="1" height="2"}"#),
        ];
        assert_eq!(lift_image_sizes(&mut children), 0);
        assert_eq!(children.len(), 3);
    }

    #[test]
    fn test_consecutive_images() {
        let mut children = vec![
            helpers::image("a.png", "a"),
            helpers::text(r#"{width="1" height="2"}"#),
            helpers::image("b.png", "b"),
            helpers::text(r#"{width="3" height="4"}"#),
        ];
        assert_eq!(lift_image_sizes(&mut children), 2);
        assert_eq!(children.len(), 2);
        assert_eq!(children[1].props.get_str(prop::WIDTH), Some("3"));
    }

    #[test]
    fn test_transformer_descends() {
        let doc = Document::new().with_content(helpers::document([helpers::paragraph([
            helpers::image("a.png", "alt"),
            helpers::text(r#"{width="5px" height="auto"}"#),
        ])]));
        let doc = ImageSizes.transform(doc);
        let para = &doc.content.children[0];
        assert_eq!(para.children.len(), 1);
        assert_eq!(para.children[0].props.get_str(prop::HEIGHT), Some("auto"));
    }
}
