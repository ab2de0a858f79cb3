use crate::geometry::{Region, Size};
use crate::render::Surface;
use crate::rules::{Rule, RuleSet};
use crate::style::{CellStyle, StyleSpec};
use crate::width::center;

use super::separator::Separator;

/// Leaf element bound to one external process.
#[derive(Debug, Clone)]
pub struct CommandNode {
    pub argv: Vec<String>,
    pub title: Option<String>,
    pub style: StyleSpec,
    pub weight: u16,
    /// Rules in declaration order; each style is already layered on `style`.
    pub rules: Vec<(Rule, StyleSpec)>,
}

impl CommandNode {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            title: None,
            style: StyleSpec::default(),
            weight: 1,
            rules: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_style(mut self, style: StyleSpec) -> Self {
        self.style = style;
        self
    }

    pub fn with_rule(mut self, rule: Rule, style: StyleSpec) -> Self {
        self.rules.push((rule, style));
        self
    }

    /// Resolve the rule list into the classifier used by the line buffer.
    pub fn rule_set(&self) -> RuleSet {
        let mut set = RuleSet::new(self.style.resolve());
        for (rule, style) in &self.rules {
            set.push(rule.clone(), style.resolve());
        }
        set
    }

    /// Short human label used in logs.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.argv.join(" "))
    }
}

/// Container splitting its region among weighted children.
#[derive(Debug, Clone)]
pub struct PanelNode {
    pub split_vertically: bool,
    pub children: Vec<Element>,
    pub style: StyleSpec,
    pub weight: u16,
}

impl PanelNode {
    pub fn new(split_vertically: bool, children: Vec<Element>) -> Self {
        Self {
            split_vertically,
            children,
            style: StyleSpec::default(),
            weight: 1,
        }
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }
}

/// Node of the display tree.
#[derive(Debug, Clone)]
pub enum Element {
    Panel(PanelNode),
    Command(CommandNode),
}

impl Element {
    pub fn weight(&self) -> u16 {
        match self {
            Element::Panel(panel) => panel.weight,
            Element::Command(command) => command.weight,
        }
    }

    pub fn style(&self) -> &StyleSpec {
        match self {
            Element::Panel(panel) => &panel.style,
            Element::Command(command) => &command.style,
        }
    }

    fn collect_commands<'a>(&'a self, out: &mut Vec<&'a CommandNode>) {
        match self {
            Element::Command(command) => out.push(command),
            Element::Panel(panel) => {
                for child in &panel.children {
                    child.collect_commands(out);
                }
            }
        }
    }
}

impl From<CommandNode> for Element {
    fn from(node: CommandNode) -> Self {
        Element::Command(node)
    }
}

impl From<PanelNode> for Element {
    fn from(node: PanelNode) -> Self {
        Element::Panel(node)
    }
}

/// Region assigned to the command with the given tree-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafPlacement {
    pub index: usize,
    pub region: Region,
}

/// Static content drawn by a layout pass, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoration {
    Title {
        row: u16,
        left: u16,
        width: u16,
        text: String,
        style: CellStyle,
    },
    Separator(Separator),
}

/// Result of solving a tree against a surface size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPlan {
    pub leaves: Vec<LeafPlacement>,
    pub decorations: Vec<Decoration>,
    pub separator_style: CellStyle,
}

impl LayoutPlan {
    pub fn region_of(&self, index: usize) -> Option<Region> {
        self.leaves
            .iter()
            .find(|leaf| leaf.index == index)
            .map(|leaf| leaf.region)
    }

    /// Draw titles and separators in the order the solver produced them.
    pub fn paint(&self, surface: &mut Surface) {
        for decoration in &self.decorations {
            match decoration {
                Decoration::Title {
                    row,
                    left,
                    width,
                    text,
                    style,
                } => {
                    let line = center(text, *width as usize);
                    surface.put_str(*row, *left, &line, *style);
                }
                Decoration::Separator(separator) => {
                    separator.paint(surface, self.separator_style);
                }
            }
        }
        surface.mark_dirty();
    }
}

/// The full dashboard description handed over by configuration.
#[derive(Debug, Clone)]
pub struct LayoutTree {
    pub title: Option<String>,
    pub root: Element,
    pub title_style: StyleSpec,
    pub separator_style: StyleSpec,
}

impl LayoutTree {
    pub fn new(root: impl Into<Element>) -> Self {
        Self {
            title: None,
            root: root.into(),
            title_style: StyleSpec::default(),
            separator_style: StyleSpec::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Command leaves in tree order; runner `i` belongs to entry `i`.
    pub fn commands(&self) -> Vec<&CommandNode> {
        let mut out = Vec::new();
        self.root.collect_commands(&mut out);
        out
    }

    /// Solve the tree for a surface of `size`.
    pub fn solve(&self, size: Size) -> LayoutPlan {
        let mut plan = LayoutPlan {
            separator_style: self.separator_style.resolve(),
            ..LayoutPlan::default()
        };
        let mut content = Region::full(size);

        if let Some(title) = &self.title {
            if content.rows > 0 {
                plan.decorations.push(Decoration::Title {
                    row: 0,
                    left: 0,
                    width: size.cols,
                    text: title.clone(),
                    style: self.title_style.resolve(),
                });
            }
            if content.rows > 1 {
                plan.decorations
                    .push(Decoration::Separator(Separator::horizontal(1, 0, size.cols)));
            }
            content = content.shrink_top(2);
        }

        let mut next_index = 0;
        solve_node(&self.root, content, &mut plan, &mut next_index);
        plan
    }
}

fn solve_node(element: &Element, region: Region, plan: &mut LayoutPlan, next_index: &mut usize) {
    match element {
        Element::Command(command) => {
            let mut region = region;
            if let Some(title) = &command.title {
                if region.rows > 0 {
                    plan.decorations.push(Decoration::Title {
                        row: region.top,
                        left: region.left,
                        width: region.cols,
                        text: title.clone(),
                        style: command.style.resolve(),
                    });
                }
                region = region.shrink_top(1);
            }
            plan.leaves.push(LeafPlacement {
                index: *next_index,
                region,
            });
            *next_index += 1;
        }
        Element::Panel(panel) => solve_panel(panel, region, plan, next_index),
    }
}

fn solve_panel(panel: &PanelNode, region: Region, plan: &mut LayoutPlan, next_index: &mut usize) {
    if panel.children.is_empty() {
        return;
    }

    let (axis_start, extent) = if panel.split_vertically {
        (region.top as u32, region.rows as u32)
    } else {
        (region.left as u32, region.cols as u32)
    };
    let axis_end = axis_start + extent;
    let total: u32 = panel
        .children
        .iter()
        .map(|child| child.weight().max(1) as u32)
        .sum();
    let unit = extent / total;

    let last = panel.children.len() - 1;
    let mut offset = 0u32;
    for (idx, child) in panel.children.iter().enumerate() {
        let weight = child.weight().max(1) as u32;
        let mut start = (axis_start + offset * unit).min(axis_end);
        let end = if idx == last {
            axis_end
        } else {
            (start + weight * unit).min(axis_end)
        };

        if idx != 0 && start < axis_end {
            let separator = if panel.split_vertically {
                Separator::horizontal(start as u16, region.left, region.cols)
            } else {
                Separator::vertical(region.top, start as u16, region.rows)
            };
            plan.decorations.push(Decoration::Separator(separator));
            start = (start + 1).min(end);
        }

        let span = end.saturating_sub(start) as u16;
        let child_region = if panel.split_vertically {
            Region::new(span, region.cols, start as u16, region.left)
        } else {
            Region::new(region.rows, span, region.top, start as u16)
        };
        solve_node(child, child_region, plan, next_index);
        offset += weight;
    }
}
