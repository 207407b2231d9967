//! The 3MF model document: a lossless XML event stream with an index.
//!
//! The document keeps every event the reader produced, whitespace and
//! comments included, and serializes them back unchanged. Edits are limited
//! to the attributes of existing elements and to new resources inserted
//! before `</resources>`. While scanning, the parser records where objects,
//! triangles and color groups live so later edits can address them by index.

use nalgebra::Point3;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::{Reader, Writer};
use std::borrow::Cow;
use std::str::FromStr;

use crate::color_group::ResourceIdAllocator;
use crate::error::{PaintError, PaintResult};
use crate::types::{Color, MeshObject};

/// Namespace of the 3MF materials and properties extension.
pub const MATERIAL_NAMESPACE: &str =
    "http://schemas.microsoft.com/3dmanufacturing/material/2015/02";

/// Prefix tried first when the materials namespace has to be declared.
pub const DEFAULT_MATERIAL_PREFIX: &str = "m";

/// An `<object>` element of the resources section.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    pub(crate) event: usize,
    pub id: Option<String>,
    pub name: Option<String>,
    pub pid: Option<u32>,
    pub pindex: Option<usize>,
    pub has_mesh: bool,
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<ModelTriangle>,
}

impl ModelObject {
    fn new(event: usize) -> Self {
        Self {
            event,
            id: None,
            name: None,
            pid: None,
            pindex: None,
            has_mesh: false,
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// The `name` attribute, or `Object {id}` for unnamed objects.
    pub fn display_name(&self) -> String {
        match (&self.name, &self.id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("Object {}", id),
            (None, None) => "Object".to_string(),
        }
    }

    /// Expand the indexed mesh into a non-indexed [`MeshObject`] in triangle
    /// order, in file units.
    pub fn to_mesh_object(&self) -> PaintResult<MeshObject> {
        let name = self.display_name();
        let mut positions = Vec::with_capacity(self.triangles.len() * 3);
        for (t, triangle) in self.triangles.iter().enumerate() {
            for &v in &triangle.indices {
                let p = self.vertices.get(v as usize).ok_or_else(|| {
                    PaintError::xml(format!(
                        "triangle {} of {:?} references vertex {} but the mesh has {} vertices",
                        t,
                        name,
                        v,
                        self.vertices.len()
                    ))
                })?;
                positions.push(*p);
            }
        }
        MeshObject::new(name, positions)
    }
}

/// A `<triangle>` element.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTriangle {
    pub(crate) event: usize,
    pub indices: [u32; 3],
    pub pid: Option<u32>,
    pub p1: Option<usize>,
}

/// A color group already present in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelColorGroup {
    pub id: u32,
    /// Colors by position; `None` where the literal could not be parsed.
    pub colors: Vec<Option<Color>>,
}

impl ModelColorGroup {
    pub fn color(&self, index: usize) -> Option<Color> {
        self.colors.get(index).copied().flatten()
    }
}

/// Which object an assignment name resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMatch {
    pub index: usize,
    /// True when the name matched nothing and the document's only object
    /// was used instead.
    pub fallback: bool,
}

/// A parsed model document.
#[derive(Debug, Clone)]
pub struct ModelDocument {
    events: Vec<Event<'static>>,
    bom: bool,
    model_root: usize,
    resources: Option<ResourcesSpan>,
    material_prefix: Option<String>,
    declared_prefixes: Vec<String>,
    objects: Vec<ModelObject>,
    color_groups: Vec<ModelColorGroup>,
    ids: ResourceIdAllocator,
}

#[derive(Debug, Clone, Copy)]
enum ResourcesSpan {
    /// `<resources>` whose closing tag sits at `end`.
    Open { end: usize },
    /// `<resources/>` at `at`.
    Empty { at: usize },
}

impl ModelDocument {
    /// Parse model XML. A leading byte-order mark is kept for output.
    pub fn parse(xml: &str) -> PaintResult<Self> {
        let (bom, body) = match xml.strip_prefix('\u{feff}') {
            Some(rest) => (true, rest),
            None => (false, xml),
        };

        let mut reader = Reader::from_str(body);
        let mut scanner = Scanner::default();
        loop {
            scanner.offset = reader.buffer_position() as u64;
            let event = reader.read_event().map_err(|e| {
                PaintError::xml_at(e.to_string(), reader.buffer_position() as u64)
            })?;
            match event {
                Event::Eof => break,
                event => scanner.push(event.into_owned())?,
            }
        }
        scanner.finish(bom)
    }

    /// Serialize the document, byte-identical to the input where unedited.
    pub fn to_xml(&self) -> PaintResult<String> {
        let mut writer = Writer::new(Vec::with_capacity(self.events.len() * 48));
        for event in &self.events {
            writer
                .write_event(event.borrow())
                .map_err(|e| PaintError::xml(format!("failed to serialize model: {}", e)))?;
        }
        let body = String::from_utf8(writer.into_inner())
            .map_err(|e| PaintError::xml(format!("serialized model is not UTF-8: {}", e)))?;
        Ok(if self.bom {
            format!("\u{feff}{}", body)
        } else {
            body
        })
    }

    pub fn objects(&self) -> &[ModelObject] {
        &self.objects
    }

    pub fn object(&self, index: usize) -> Option<&ModelObject> {
        self.objects.get(index)
    }

    pub fn color_groups(&self) -> &[ModelColorGroup] {
        &self.color_groups
    }

    pub fn color_group(&self, id: u32) -> Option<&ModelColorGroup> {
        self.color_groups.iter().find(|g| g.id == id)
    }

    /// Prefix bound to the materials namespace on the root element.
    pub fn material_prefix(&self) -> Option<&str> {
        self.material_prefix.as_deref()
    }

    /// Find the object an assignment name refers to.
    ///
    /// Exactly one object with that name wins. With no match, a document
    /// holding a single object falls back to it. Anything else is ambiguous.
    pub fn find_object(&self, name: &str) -> PaintResult<ObjectMatch> {
        let matches: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.display_name() == name)
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [index] => Ok(ObjectMatch {
                index: *index,
                fallback: false,
            }),
            [] if self.objects.len() == 1 => Ok(ObjectMatch {
                index: 0,
                fallback: true,
            }),
            _ => Err(PaintError::AmbiguousObject {
                name: name.to_string(),
                matches: matches.len(),
                object_count: self.objects.len(),
            }),
        }
    }

    /// Declare the materials namespace on the root element unless some
    /// prefix is already bound to it. Returns whether a declaration was
    /// added.
    pub fn ensure_material_namespace(&mut self) -> PaintResult<bool> {
        if self.material_prefix.is_some() {
            return Ok(false);
        }

        let mut prefix = DEFAULT_MATERIAL_PREFIX.to_string();
        let mut suffix = 1;
        while self.declared_prefixes.contains(&prefix) {
            prefix = format!("{}{}", DEFAULT_MATERIAL_PREFIX, suffix);
            suffix += 1;
        }

        let key = format!("xmlns:{}", prefix);
        set_attributes(
            &mut self.events[self.model_root],
            &[(key.as_str(), MATERIAL_NAMESPACE.to_string())],
            &[],
        )?;
        self.declared_prefixes.push(prefix.clone());
        self.material_prefix = Some(prefix);
        Ok(true)
    }

    /// Next free resource id.
    pub fn allocate_resource_id(&mut self) -> u32 {
        self.ids.allocate()
    }

    /// Insert resource elements at the end of the resources section.
    pub(crate) fn insert_resource(&mut self, events: Vec<Event<'static>>) -> PaintResult<()> {
        let end = match self.resources {
            Some(ResourcesSpan::Open { end }) => end,
            Some(ResourcesSpan::Empty { at }) => {
                let Event::Empty(start) = &self.events[at] else {
                    return Err(PaintError::xml("resources index out of sync"));
                };
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let start = start.clone();
                self.events[at] = Event::Start(start);
                let end = at + 1;
                self.events.insert(end, Event::End(BytesEnd::new(name)));
                // Only untracked build items follow an empty resources element.
                end
            }
            None => return Err(PaintError::xml("model has no <resources> element")),
        };

        let count = events.len();
        self.events.splice(end..end, events);
        self.resources = Some(ResourcesSpan::Open { end: end + count });
        Ok(())
    }

    pub(crate) fn register_color_group(&mut self, group: ModelColorGroup) {
        self.color_groups.push(group);
    }

    /// Point an object's default property at `pindex` of group `pid`.
    pub fn set_object_color(&mut self, object: usize, pid: u32, pindex: usize) -> PaintResult<()> {
        let entry = self
            .objects
            .get_mut(object)
            .ok_or_else(|| PaintError::xml(format!("no object at index {}", object)))?;
        set_attributes(
            &mut self.events[entry.event],
            &[("pid", pid.to_string()), ("pindex", pindex.to_string())],
            &[],
        )?;
        entry.pid = Some(pid);
        entry.pindex = Some(pindex);
        Ok(())
    }

    /// Color one triangle uniformly with `p1` of group `pid`. Per-vertex
    /// `p2`/`p3` are removed so all corners take the same color.
    pub fn set_triangle_color(
        &mut self,
        object: usize,
        triangle: usize,
        pid: u32,
        p1: usize,
    ) -> PaintResult<()> {
        let entry = self
            .objects
            .get_mut(object)
            .and_then(|o| o.triangles.get_mut(triangle))
            .ok_or_else(|| {
                PaintError::xml(format!("no triangle {} in object {}", triangle, object))
            })?;
        set_attributes(
            &mut self.events[entry.event],
            &[("pid", pid.to_string()), ("p1", p1.to_string())],
            &["p2", "p3"],
        )?;
        entry.pid = Some(pid);
        entry.p1 = Some(p1);
        Ok(())
    }
}

/// Event collector that indexes the document while it is read.
#[derive(Default)]
struct Scanner {
    events: Vec<Event<'static>>,
    offset: u64,
    stack: Vec<Vec<u8>>,
    model_root: Option<usize>,
    material_prefix: Option<String>,
    declared_prefixes: Vec<String>,
    resources_depth: Option<usize>,
    resources: Option<ResourcesSpan>,
    resources_closed: bool,
    objects: Vec<ModelObject>,
    object: Option<ModelObject>,
    color_groups: Vec<ModelColorGroup>,
    group: Option<ModelColorGroup>,
    resource_ids: Vec<u32>,
}

impl Scanner {
    fn push(&mut self, event: Event<'static>) -> PaintResult<()> {
        let idx = self.events.len();
        match &event {
            Event::Start(e) => {
                self.open(idx, e, false)?;
                self.stack.push(e.local_name().as_ref().to_vec());
            }
            Event::Empty(e) => self.open(idx, e, true)?,
            Event::End(e) => {
                self.stack.pop();
                self.close(idx, e.local_name().as_ref());
            }
            _ => {}
        }
        self.events.push(event);
        Ok(())
    }

    fn in_resources(&self) -> bool {
        matches!(self.resources, Some(ResourcesSpan::Open { .. })) && !self.resources_closed
    }

    fn open(&mut self, idx: usize, e: &BytesStart<'_>, empty: bool) -> PaintResult<()> {
        let local = e.local_name();
        let name = local.as_ref();

        if self.model_root.is_none() {
            if name != b"model" {
                return Err(PaintError::xml_at(
                    format!(
                        "root element is <{}>, expected <model>",
                        String::from_utf8_lossy(name)
                    ),
                    self.offset,
                ));
            }
            self.model_root = Some(idx);
            self.read_namespaces(e)?;
            return Ok(());
        }

        let parent = self.stack.last().map(Vec::as_slice);
        let depth = self.stack.len();

        if name == b"resources" && parent == Some(b"model".as_slice()) && self.resources.is_none()
        {
            self.resources_depth = Some(depth);
            self.resources = Some(if empty {
                ResourcesSpan::Empty { at: idx }
            } else {
                // End index is filled in when </resources> arrives.
                ResourcesSpan::Open { end: usize::MAX }
            });
            return Ok(());
        }

        if self.in_resources() && self.resources_depth.map(|d| d + 1) == Some(depth) {
            if let Some(id) = attr::<u32>(e, b"id", self.offset).ok().flatten() {
                self.resource_ids.push(id);
            }
            match name {
                b"object" => {
                    let mut object = ModelObject::new(idx);
                    object.id = attr_string(e, b"id", self.offset)?;
                    object.name = attr_string(e, b"name", self.offset)?;
                    object.pid = attr(e, b"pid", self.offset)?;
                    object.pindex = attr(e, b"pindex", self.offset)?;
                    if empty {
                        self.objects.push(object);
                    } else {
                        self.object = Some(object);
                    }
                }
                b"colorgroup" => {
                    let group = ModelColorGroup {
                        id: required(e, b"id", self.offset)?,
                        colors: Vec::new(),
                    };
                    if empty {
                        self.color_groups.push(group);
                    } else {
                        self.group = Some(group);
                    }
                }
                _ => {}
            }
            return Ok(());
        }

        match (name, parent) {
            (b"mesh", Some(b"object")) => {
                if let Some(object) = self.object.as_mut() {
                    object.has_mesh = true;
                }
            }
            (b"vertex", Some(b"vertices")) => {
                if let Some(object) = self.object.as_mut() {
                    let x = required(e, b"x", self.offset)?;
                    let y = required(e, b"y", self.offset)?;
                    let z = required(e, b"z", self.offset)?;
                    object.vertices.push(Point3::new(x, y, z));
                }
            }
            (b"triangle", Some(b"triangles")) => {
                if let Some(object) = self.object.as_mut() {
                    object.triangles.push(ModelTriangle {
                        event: idx,
                        indices: [
                            required(e, b"v1", self.offset)?,
                            required(e, b"v2", self.offset)?,
                            required(e, b"v3", self.offset)?,
                        ],
                        pid: attr(e, b"pid", self.offset)?,
                        p1: attr(e, b"p1", self.offset)?,
                    });
                }
            }
            (b"color", Some(b"colorgroup")) => {
                if let Some(group) = self.group.as_mut() {
                    let color = attr_string(e, b"color", self.offset)?
                        .and_then(|c| Color::from_str(&c).ok());
                    if color.is_none() {
                        tracing::warn!(
                            target: "mesh_paint::package",
                            group = group.id,
                            index = group.colors.len(),
                            "Unreadable color in color group"
                        );
                    }
                    group.colors.push(color);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, idx: usize, name: &[u8]) {
        match name {
            b"object" => {
                if let Some(object) = self.object.take() {
                    self.objects.push(object);
                }
            }
            b"colorgroup" => {
                if let Some(group) = self.group.take() {
                    self.color_groups.push(group);
                }
            }
            b"resources"
                if self.in_resources() && Some(self.stack.len()) == self.resources_depth =>
            {
                self.resources = Some(ResourcesSpan::Open { end: idx });
                self.resources_closed = true;
            }
            _ => {}
        }
    }

    fn read_namespaces(&mut self, root: &BytesStart<'_>) -> PaintResult<()> {
        for attribute in root.attributes() {
            let attribute = attribute
                .map_err(|e| PaintError::xml_at(format!("bad attribute on <model>: {}", e), self.offset))?;
            let Some(prefix) = attribute.key.as_ref().strip_prefix(b"xmlns:") else {
                continue;
            };
            let prefix = String::from_utf8_lossy(prefix).into_owned();
            if attribute.value.as_ref() == MATERIAL_NAMESPACE.as_bytes()
                && self.material_prefix.is_none()
            {
                self.material_prefix = Some(prefix.clone());
            }
            self.declared_prefixes.push(prefix);
        }
        Ok(())
    }

    fn finish(self, bom: bool) -> PaintResult<ModelDocument> {
        if let Some(open) = self.stack.last() {
            return Err(PaintError::xml_at(
                format!("unexpected end of document inside <{}>", String::from_utf8_lossy(open)),
                self.offset,
            ));
        }
        let model_root = self
            .model_root
            .ok_or_else(|| PaintError::xml("missing <model> root element"))?;

        Ok(ModelDocument {
            events: self.events,
            bom,
            model_root,
            resources: self.resources,
            material_prefix: self.material_prefix,
            declared_prefixes: self.declared_prefixes,
            objects: self.objects,
            color_groups: self.color_groups,
            ids: ResourceIdAllocator::from_existing(self.resource_ids),
        })
    }
}

fn attr_string(e: &BytesStart<'_>, key: &[u8], offset: u64) -> PaintResult<Option<String>> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| {
            PaintError::xml_at(
                format!(
                    "bad attribute on <{}>: {}",
                    String::from_utf8_lossy(e.name().as_ref()),
                    err
                ),
                offset,
            )
        })?;
        if attribute.key.as_ref() == key {
            let value = attribute
                .unescape_value()
                .map_err(|err| PaintError::xml_at(err.to_string(), offset))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr<T: FromStr>(e: &BytesStart<'_>, key: &[u8], offset: u64) -> PaintResult<Option<T>> {
    match attr_string(e, key, offset)? {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            PaintError::xml_at(
                format!(
                    "invalid {}={:?} on <{}>",
                    String::from_utf8_lossy(key),
                    raw,
                    String::from_utf8_lossy(e.name().as_ref())
                ),
                offset,
            )
        }),
    }
}

fn required<T: FromStr>(e: &BytesStart<'_>, key: &[u8], offset: u64) -> PaintResult<T> {
    attr(e, key, offset)?.ok_or_else(|| {
        PaintError::xml_at(
            format!(
                "<{}> is missing {}",
                String::from_utf8_lossy(e.name().as_ref()),
                String::from_utf8_lossy(key)
            ),
            offset,
        )
    })
}

/// Rewrite the attributes of a start or empty element: replace or append
/// `updates`, drop `remove`, keep everything else in its original order.
fn set_attributes(
    event: &mut Event<'static>,
    updates: &[(&str, String)],
    remove: &[&str],
) -> PaintResult<()> {
    let (Event::Start(start) | Event::Empty(start)) = event else {
        return Err(PaintError::xml("attribute update on a non-element event"));
    };

    let mut applied = vec![false; updates.len()];
    let mut attributes: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| PaintError::xml(e.to_string()))?;
        let key = attribute.key.as_ref();
        if remove.iter().any(|r| r.as_bytes() == key) {
            continue;
        }
        match updates.iter().position(|(k, _)| k.as_bytes() == key) {
            Some(i) if !applied[i] => {
                applied[i] = true;
                attributes.push((key.to_vec(), updates[i].1.as_bytes().to_vec()));
            }
            Some(_) => {}
            None => attributes.push((key.to_vec(), requote(&attribute.value))),
        }
    }
    for ((key, value), done) in updates.iter().zip(&applied) {
        if !done {
            attributes.push((key.as_bytes().to_vec(), value.as_bytes().to_vec()));
        }
    }

    start.clear_attributes();
    for (key, value) in &attributes {
        start.push_attribute(Attribute {
            key: QName(key.as_slice()),
            value: Cow::Borrowed(value.as_slice()),
        });
    }
    Ok(())
}

/// Raw attribute values are re-emitted inside double quotes, so a value that
/// was single-quoted may need its double quotes escaped.
fn requote(raw: &[u8]) -> Vec<u8> {
    if !raw.contains(&b'"') {
        return raw.to_vec();
    }
    let mut out = Vec::with_capacity(raw.len() + 8);
    for &b in raw {
        if b == b'"' {
            out.extend_from_slice(b"&quot;");
        } else {
            out.push(b);
        }
    }
    out
}
