//! Display list built from a post layout

use super::layout::{LayoutContent, PostLayout};

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    /// One CSS px outline
    StrokeRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        rgba: (u8, u8, u8, u8),
    },
    Image {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        src: String,
    },
}

/// Flatten layout nodes into paint order (fill before stroke per node)
pub fn build_display_list(layout: &PostLayout) -> Vec<PaintCommand> {
    let mut cmds = Vec::with_capacity(layout.nodes.len());
    for node in &layout.nodes {
        let r = &node.rect;
        match &node.content {
            LayoutContent::Panel { fill, border } => {
                if let Some(fill) = fill {
                    cmds.push(PaintCommand::SolidRect { x: r.x, y: r.y, width: r.width, height: r.height, rgba: fill.rgba() });
                }
                if let Some(border) = border {
                    cmds.push(PaintCommand::StrokeRect { x: r.x, y: r.y, width: r.width, height: r.height, rgba: border.rgba() });
                }
            }
            LayoutContent::Text { text, color } => {
                if !text.trim().is_empty() {
                    cmds.push(PaintCommand::Text { x: r.x, y: r.y, text: text.clone(), rgba: color.rgba() });
                }
            }
            LayoutContent::Image { src } => {
                cmds.push(PaintCommand::Image { x: r.x, y: r.y, width: r.width, height: r.height, src: src.clone() });
            }
        }
    }
    cmds
}
