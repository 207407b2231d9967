//! Color groups: ordered palettes written as `<m:colorgroup>` resources.
//!
//! Consumers address colors by position inside a group, so palette order is
//! part of the output: the base color comes first, then override colors in
//! the order they were painted. Each color appears once.
//!
//! Group ids come from a per-document allocator seeded with the largest id
//! already used by any resource, so repeated exports of the same document
//! allocate the same ids.

use hashbrown::HashMap;
use quick_xml::events::{BytesEnd, BytesStart, Event};

use crate::error::PaintResult;
use crate::model::{ModelColorGroup, ModelDocument};
use crate::types::Color;

/// Ordered set of distinct colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorPalette {
    colors: Vec<Color>,
    index: HashMap<Color, usize>,
}

impl ColorPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a color if it is new. Returns its position either way.
    pub fn insert(&mut self, color: Color) -> usize {
        if let Some(&i) = self.index.get(&color) {
            return i;
        }
        let i = self.colors.len();
        self.colors.push(color);
        self.index.insert(color, i);
        i
    }

    pub fn index_of(&self, color: Color) -> Option<usize> {
        self.index.get(&color).copied()
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

impl FromIterator<Color> for ColorPalette {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        let mut palette = Self::new();
        for color in iter {
            palette.insert(color);
        }
        palette
    }
}

/// Hands out resource ids above every id present in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdAllocator {
    next: u32,
}

impl ResourceIdAllocator {
    /// Seed from the ids of existing resources. Ids start at 1.
    pub fn from_existing(ids: impl IntoIterator<Item = u32>) -> Self {
        let max = ids.into_iter().max().unwrap_or(0);
        Self {
            next: max.saturating_add(1).max(1),
        }
    }

    pub fn allocate(&mut self) -> u32 {
        let id = self.next;
        self.next = self.next.saturating_add(1);
        id
    }

    /// The id the next call to [`allocate`](Self::allocate) returns.
    pub fn peek(&self) -> u32 {
        self.next
    }
}

/// Append a color group holding `palette` to the document's resources.
///
/// Declares the materials namespace if needed and returns the new group id.
pub fn add_color_group(document: &mut ModelDocument, palette: &ColorPalette) -> PaintResult<u32> {
    document.ensure_material_namespace()?;
    let prefix = document
        .material_prefix()
        .unwrap_or(crate::model::DEFAULT_MATERIAL_PREFIX)
        .to_string();
    let id = document.allocate_resource_id();

    let group_name = format!("{}:colorgroup", prefix);
    let color_name = format!("{}:color", prefix);

    let mut events = Vec::with_capacity(palette.len() + 2);
    let id_text = id.to_string();
    let mut group = BytesStart::new(group_name.clone());
    group.push_attribute(("id", id_text.as_str()));
    events.push(Event::Start(group));
    for color in palette.colors() {
        let hex = color.to_hex();
        let mut element = BytesStart::new(color_name.clone());
        element.push_attribute(("color", hex.as_str()));
        events.push(Event::Empty(element));
    }
    events.push(Event::End(BytesEnd::new(group_name)));

    document.insert_resource(events)?;
    document.register_color_group(ModelColorGroup {
        id,
        colors: palette.colors().iter().copied().map(Some).collect(),
    });

    tracing::debug!(
        target: "mesh_paint::package",
        id = id,
        colors = palette.len(),
        "Color group added"
    );
    Ok(id)
}
