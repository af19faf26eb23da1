//! Splitting rendered content into independently exported sections.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{raster::FixedSize, visual::VisualNode};

/// Upper bound on sections from one export. Extra sections are dropped.
pub const MAX_SECTIONS: usize = 9;

/// Height a child with no measured height is assumed to occupy.
const UNMEASURED_CHILD_HEIGHT: f32 = 50.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    /// Split at horizontal rules; by height when there are none.
    #[default]
    Separator,
    /// Split by height only.
    Auto,
    None,
}

impl SplitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMode::Separator => "separator",
            SplitMode::Auto => "auto",
            SplitMode::None => "none",
        }
    }
}

impl fmt::Display for SplitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SplitMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "separator" | "hr" => Ok(SplitMode::Separator),
            "auto" => Ok(SplitMode::Auto),
            "none" => Ok(SplitMode::None),
            other => Err(format!("unknown split mode `{other}`")),
        }
    }
}

/// Canvas shapes for social image posts, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizePreset {
    /// 3:4 portrait.
    #[default]
    Vertical,
    Square,
    /// Fixed width, intrinsic height.
    Long,
}

impl SizePreset {
    pub const WIDTH_PX: u32 = 360;

    pub fn fixed_size(&self) -> FixedSize {
        let height = match self {
            SizePreset::Vertical => Some(480),
            SizePreset::Square => Some(360),
            SizePreset::Long => None,
        };
        FixedSize {
            width: Self::WIDTH_PX,
            height,
        }
    }
}

impl FromStr for SizePreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "vertical" => Ok(SizePreset::Vertical),
            "square" => Ok(SizePreset::Square),
            "long" => Ok(SizePreset::Long),
            other => Err(format!("unknown size preset `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    /// Capture the content node itself.
    Whole,
    /// Capture a detached container holding a run of the content's children.
    Slice(VisualNode),
}

/// Split `content` into at most [`MAX_SECTIONS`] sections.
///
/// `fixed_height` is the target canvas height in CSS pixels; without one
/// there is no height budget and only separators can split.
pub fn split_sections(
    content: &VisualNode,
    mode: SplitMode,
    fixed_height: Option<u32>,
    margin: u32,
) -> Vec<Section> {
    let has_separator = content.children.iter().any(VisualNode::is_separator);
    let mut sections = match (mode, fixed_height) {
        (SplitMode::Separator, _) if has_separator => split_by_separator(content),
        (SplitMode::Separator | SplitMode::Auto, Some(height)) => {
            split_by_height(content, height, margin)
        }
        _ => vec![Section::Whole],
    };
    sections.truncate(MAX_SECTIONS);
    sections
}

fn split_by_separator(content: &VisualNode) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Vec::new();
    for child in &content.children {
        if child.is_separator() {
            if !current.is_empty() {
                sections.push(Section::Slice(
                    content.section_shell(std::mem::take(&mut current)),
                ));
            }
        } else {
            current.push(child.clone());
        }
    }
    if !current.is_empty() {
        sections.push(Section::Slice(content.section_shell(current)));
    }

    if sections.is_empty() {
        vec![Section::Whole]
    } else {
        sections
    }
}

fn split_by_height(content: &VisualNode, height: u32, margin: u32) -> Vec<Section> {
    if content.children.is_empty() {
        return vec![Section::Whole];
    }

    let budget = height as f32 - 2.0 * margin as f32;
    let mut sections = Vec::new();
    let mut current = Vec::new();
    let mut used = 0.0_f32;

    for child in &content.children {
        let child_height = if child.layout.height > 0.0 {
            child.layout.height
        } else {
            UNMEASURED_CHILD_HEIGHT
        };
        if !current.is_empty() && used + child_height > budget {
            sections.push(Section::Slice(
                content.section_shell(std::mem::take(&mut current)),
            ));
            used = 0.0;
        }
        current.push(child.clone());
        used += child_height;
    }
    if !current.is_empty() {
        sections.push(Section::Slice(content.section_shell(current)));
    }
    sections
}

/// `base` for a lone artifact, `base_<n>` (1-based) otherwise.
pub fn artifact_name(base: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        base.to_string()
    } else {
        format!("{base}_{index}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(tag: &str, height: f32) -> VisualNode {
        VisualNode::new(tag).with_layout(360.0, height)
    }

    fn content(children: Vec<VisualNode>) -> VisualNode {
        VisualNode::new("div")
            .with_class("md-container")
            .with_style("padding: 24px;")
            .with_layout(360.0, 0.0)
            .with_children(children)
    }

    fn slices(sections: &[Section]) -> Vec<&VisualNode> {
        sections
            .iter()
            .map(|section| match section {
                Section::Slice(node) => node,
                Section::Whole => panic!("expected slices"),
            })
            .collect()
    }

    fn concatenated(sections: &[Section]) -> Vec<VisualNode> {
        slices(sections)
            .into_iter()
            .flat_map(|node| node.children.clone())
            .collect()
    }

    #[test]
    fn separator_mode_splits_at_rules_and_drops_them() {
        let children = vec![
            block("h1", 40.0),
            block("p", 20.0),
            block("hr", 1.0),
            block("p", 20.0),
            block("hr", 1.0),
            block("hr", 1.0),
            block("ul", 60.0),
        ];
        let node = content(children.clone());
        let sections = split_sections(&node, SplitMode::Separator, Some(480), 24);

        assert_eq!(sections.len(), 3);
        let expected: Vec<VisualNode> = children.into_iter().filter(|c| !c.is_separator()).collect();
        assert_eq!(concatenated(&sections), expected);
        for shell in slices(&sections) {
            assert_eq!(shell.class_name, "md-container");
            assert_eq!(shell.style.get("padding"), Some("24px"));
        }
    }

    #[test]
    fn separator_mode_without_rules_falls_back_to_height_budget() {
        let children: Vec<VisualNode> = (0..10).map(|_| block("p", 100.0)).collect();
        let node = content(children.clone());
        let sections = split_sections(&node, SplitMode::Separator, Some(480), 24);

        assert!(sections.len() > 1);
        assert_eq!(concatenated(&sections), children);
    }

    #[test]
    fn separator_mode_without_rules_or_height_is_one_section() {
        let node = content(vec![block("p", 100.0), block("p", 100.0)]);
        assert_eq!(
            split_sections(&node, SplitMode::Separator, None, 24),
            vec![Section::Whole]
        );
    }

    #[test]
    fn height_budget_excludes_margins() {
        let node = content(vec![block("p", 200.0), block("p", 200.0), block("p", 100.0)]);
        let sections = split_sections(&node, SplitMode::Auto, Some(480), 24);
        let sizes: Vec<usize> = slices(&sections).iter().map(|s| s.children.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn oversized_child_is_placed_alone() {
        let node = content(vec![block("p", 50.0), block("pre", 2000.0), block("p", 50.0)]);
        let sections = split_sections(&node, SplitMode::Auto, Some(480), 24);
        let sizes: Vec<usize> = slices(&sections).iter().map(|s| s.children.len()).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
        assert!(slices(&sections).iter().all(|s| !s.children.is_empty()));
    }

    #[test]
    fn unmeasured_children_count_as_fifty_pixels() {
        let children: Vec<VisualNode> = (0..9).map(|_| block("p", 0.0)).collect();
        let node = content(children);
        let sections = split_sections(&node, SplitMode::Auto, Some(480), 24);
        let sizes: Vec<usize> = slices(&sections).iter().map(|s| s.children.len()).collect();
        assert_eq!(sizes, vec![8, 1]);
    }

    #[test]
    fn section_count_is_capped() {
        let mut children = Vec::new();
        for _ in 0..12 {
            children.push(block("p", 20.0));
            children.push(block("hr", 1.0));
        }
        let node = content(children);
        let sections = split_sections(&node, SplitMode::Separator, None, 24);
        assert_eq!(sections.len(), MAX_SECTIONS);
    }

    #[test]
    fn none_mode_and_empty_content_are_whole() {
        let node = content(vec![block("p", 900.0), block("p", 900.0)]);
        assert_eq!(
            split_sections(&node, SplitMode::None, Some(480), 24),
            vec![Section::Whole]
        );
        assert_eq!(
            split_sections(&content(Vec::new()), SplitMode::Auto, Some(480), 24),
            vec![Section::Whole]
        );
        assert_eq!(
            split_sections(&content(vec![block("hr", 1.0)]), SplitMode::Separator, None, 24),
            vec![Section::Whole]
        );
    }

    #[test]
    fn names_are_suffixed_only_when_several() {
        assert_eq!(artifact_name("note", 1, 1), "note");
        assert_eq!(artifact_name("note", 2, 3), "note_2");
    }

    #[test]
    fn presets_and_modes_parse() {
        assert_eq!("square".parse::<SizePreset>(), Ok(SizePreset::Square));
        assert_eq!(SizePreset::Long.fixed_size().height, None);
        assert_eq!(SizePreset::Vertical.fixed_size(), FixedSize { width: 360, height: Some(480) });
        assert_eq!("hr".parse::<SplitMode>(), Ok(SplitMode::Separator));
        assert!("diagonal".parse::<SplitMode>().is_err());
    }
}
