//! Live visual tree the exporters capture, plus the guards that mutate it
//! temporarily.

use crate::application::style::Declarations;

const DEFAULT_SECTION_PADDING: &str = "24px";
const FALLBACK_PADDING_PX: f32 = 24.0;

/// Laid-out size of a node in CSS pixels, as reported by the presentation surface.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Layout {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisualNode {
    pub tag: String,
    pub class_name: String,
    pub style: Declarations,
    pub layout: Layout,
    pub children: Vec<VisualNode>,
}

impl VisualNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_style(mut self, declarations: &str) -> Self {
        self.style = Declarations::parse(declarations);
        self
    }

    pub fn with_layout(mut self, width: f32, height: f32) -> Self {
        self.layout = Layout { width, height };
        self
    }

    pub fn with_children(mut self, children: Vec<VisualNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_separator(&self) -> bool {
        self.tag.eq_ignore_ascii_case("hr")
    }

    /// Padding in pixels from the inline style, 24 when unset or not in `px`.
    pub fn padding_px(&self) -> f32 {
        self.style
            .get("padding")
            .and_then(|value| value.trim().strip_suffix("px"))
            .and_then(|value| value.trim().parse::<f32>().ok())
            .unwrap_or(FALLBACK_PADDING_PX)
    }

    /// Fresh container carrying this node's class and inline style around
    /// `children`. Content is never copied from `self`.
    pub fn section_shell(&self, children: Vec<VisualNode>) -> VisualNode {
        let mut style = self.style.clone();
        if style.get("padding").is_none() {
            style.set("padding", DEFAULT_SECTION_PADDING);
        }
        style.set("width", "100%");
        style.set("max-width", "100%");

        let mut shell = VisualNode {
            tag: "div".to_string(),
            class_name: self.class_name.clone(),
            style,
            layout: Layout::default(),
            children,
        };
        let content: f32 = shell.children.iter().map(|child| child.layout.height).sum();
        shell.layout = Layout {
            width: self.layout.width,
            height: content + 2.0 * shell.padding_px(),
        };
        shell
    }
}

/// Temporarily overrides inline style properties on a node. Every touched
/// property is restored to its original value, or removed if it was unset,
/// when the guard drops.
#[derive(Debug)]
pub struct StyleGuard<'a> {
    node: &'a mut VisualNode,
    saved: Vec<(String, Option<String>)>,
}

impl<'a> StyleGuard<'a> {
    pub fn new(node: &'a mut VisualNode) -> Self {
        Self {
            node,
            saved: Vec::new(),
        }
    }

    pub fn set(&mut self, property: &str, value: impl Into<String>) {
        if !self.saved.iter().any(|(name, _)| name == property) {
            let original = self.node.style.get(property).map(str::to_string);
            self.saved.push((property.to_string(), original));
        }
        self.node.style.set(property, value);
    }

    pub fn node(&self) -> &VisualNode {
        self.node
    }

    pub fn node_mut(&mut self) -> &mut VisualNode {
        self.node
    }
}

impl Drop for StyleGuard<'_> {
    fn drop(&mut self) {
        for (property, original) in self.saved.drain(..).rev() {
            match original {
                Some(value) => self.node.style.set(&property, value),
                None => self.node.style.remove(&property),
            }
        }
    }
}

/// The rendered content subtree together with the off-screen area detached
/// section clones are laid out in while they are captured.
#[derive(Debug, Default)]
pub struct LiveDocument {
    content: VisualNode,
    offscreen: OffscreenStage,
}

impl LiveDocument {
    pub fn new(content: VisualNode) -> Self {
        Self {
            content,
            offscreen: OffscreenStage::default(),
        }
    }

    pub fn content(&self) -> &VisualNode {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut VisualNode {
        &mut self.content
    }

    pub fn offscreen(&self) -> &OffscreenStage {
        &self.offscreen
    }

    pub fn split_mut(&mut self) -> (&mut VisualNode, &mut OffscreenStage) {
        (&mut self.content, &mut self.offscreen)
    }

    pub fn into_content(self) -> VisualNode {
        self.content
    }
}

#[derive(Debug, Default)]
pub struct OffscreenStage {
    nodes: Vec<VisualNode>,
}

impl OffscreenStage {
    /// Attach `node` outside the visible viewport. It is detached again when
    /// the returned handle drops.
    pub fn attach(&mut self, mut node: VisualNode) -> Attached<'_> {
        node.style.set("position", "absolute");
        node.style.set("left", "-9999px");
        node.style.set("top", "0");
        self.nodes.push(node);
        let index = self.nodes.len() - 1;
        Attached { stage: self, index }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Debug)]
pub struct Attached<'a> {
    stage: &'a mut OffscreenStage,
    index: usize,
}

impl Attached<'_> {
    pub fn node(&self) -> &VisualNode {
        &self.stage.nodes[self.index]
    }

    pub fn node_mut(&mut self) -> &mut VisualNode {
        &mut self.stage.nodes[self.index]
    }
}

impl Drop for Attached<'_> {
    fn drop(&mut self) {
        self.stage.nodes.truncate(self.index);
    }
}
