// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! The runtime property tree. A [`HierarchicalTypeData`] is a shape; a
//! [`PropertyImpl`] is a live instance of one node of that shape, owned by an
//! arena ([`scene_logic_core::pool::Pool`]) that belongs to the `LogicNode`
//! the root was built for. Compound properties (struct/array) carry no value
//! of their own - only their primitive descendants do - but every node in the
//! tree, compound or not, lives in the same arena and is addressed the same
//! way: by [`Handle`].
//!
//! Links cross node boundaries, so they can't be expressed as handles into a
//! single arena; a [`PropertyRef`] names a leaf by `(owning node id, handle in
//! that node's arena)` instead.

use crate::error::{LogicError, LogicResult};
use crate::ids::NodeId;
use crate::type_data::{HierarchicalTypeData, PrimitiveType, TypeData};
use nalgebra::{Vector2, Vector3, Vector4};
use scene_logic_core::pool::{Handle, Pool};
use scene_logic_core::visitor::{Visit, VisitError, VisitResult, Visitor};

/// Who is allowed to write a property, and who reads engine-generated values
/// out of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PropertySemantics {
    ScriptInput,
    ScriptOutput,
    BindingInput,
    AnimationInput,
    AnimationOutput,
    Interface,
}

impl PropertySemantics {
    fn to_tag(self) -> u8 {
        match self {
            PropertySemantics::ScriptInput => 0,
            PropertySemantics::ScriptOutput => 1,
            PropertySemantics::BindingInput => 2,
            PropertySemantics::AnimationInput => 3,
            PropertySemantics::AnimationOutput => 4,
            PropertySemantics::Interface => 5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PropertySemantics::ScriptInput,
            1 => PropertySemantics::ScriptOutput,
            2 => PropertySemantics::BindingInput,
            3 => PropertySemantics::AnimationInput,
            4 => PropertySemantics::AnimationOutput,
            5 => PropertySemantics::Interface,
            _ => return None,
        })
    }
}

impl Default for PropertySemantics {
    fn default() -> Self {
        PropertySemantics::Interface
    }
}

impl Visit for PropertySemantics {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut tag = self.to_tag();
        tag.visit(name, visitor)?;
        if visitor.is_reading() {
            *self = PropertySemantics::from_tag(tag).ok_or(VisitError::NotSupportedFormat)?;
        }
        Ok(())
    }
}

/// The value stored at a primitive leaf. There is deliberately no
/// `Struct`/`Array` variant - compound properties have no value of their own.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    String(String),
    Vec2f(Vector2<f32>),
    Vec3f(Vector3<f32>),
    Vec4f(Vector4<f32>),
    Vec2i(Vector2<i32>),
    Vec3i(Vector3<i32>),
    Vec4i(Vector4<i32>),
}

impl PropertyValue {
    pub fn default_for(tag: PrimitiveType) -> Self {
        match tag {
            PrimitiveType::Bool => PropertyValue::Bool(false),
            PrimitiveType::Int32 => PropertyValue::Int32(0),
            PrimitiveType::Int64 => PropertyValue::Int64(0),
            PrimitiveType::Float => PropertyValue::Float(0.0),
            PrimitiveType::String => PropertyValue::String(String::new()),
            PrimitiveType::Vec2f => PropertyValue::Vec2f(Vector2::zeros()),
            PrimitiveType::Vec3f => PropertyValue::Vec3f(Vector3::zeros()),
            PrimitiveType::Vec4f => PropertyValue::Vec4f(Vector4::zeros()),
            PrimitiveType::Vec2i => PropertyValue::Vec2i(Vector2::zeros()),
            PrimitiveType::Vec3i => PropertyValue::Vec3i(Vector3::zeros()),
            PrimitiveType::Vec4i => PropertyValue::Vec4i(Vector4::zeros()),
            PrimitiveType::Struct | PrimitiveType::Array => {
                panic!("compound types have no value")
            }
        }
    }

    pub fn type_tag(&self) -> PrimitiveType {
        match self {
            PropertyValue::Bool(_) => PrimitiveType::Bool,
            PropertyValue::Int32(_) => PrimitiveType::Int32,
            PropertyValue::Int64(_) => PrimitiveType::Int64,
            PropertyValue::Float(_) => PrimitiveType::Float,
            PropertyValue::String(_) => PrimitiveType::String,
            PropertyValue::Vec2f(_) => PrimitiveType::Vec2f,
            PropertyValue::Vec3f(_) => PrimitiveType::Vec3f,
            PropertyValue::Vec4f(_) => PrimitiveType::Vec4f,
            PropertyValue::Vec2i(_) => PrimitiveType::Vec2i,
            PropertyValue::Vec3i(_) => PrimitiveType::Vec3i,
            PropertyValue::Vec4i(_) => PrimitiveType::Vec4i,
        }
    }
}

impl Visit for PropertyValue {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        let mut tag = if region.is_reading() {
            0u8
        } else {
            self.type_tag().to_tag()
        };
        tag.visit("Tag", &mut region)?;
        if region.is_reading() {
            let tag = PrimitiveType::from_tag(tag).ok_or(VisitError::NotSupportedFormat)?;
            *self = PropertyValue::default_for(tag);
        }
        match self {
            PropertyValue::Bool(v) => v.visit("V", &mut region)?,
            PropertyValue::Int32(v) => v.visit("V", &mut region)?,
            PropertyValue::Int64(v) => v.visit("V", &mut region)?,
            PropertyValue::Float(v) => v.visit("V", &mut region)?,
            PropertyValue::String(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec2f(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec3f(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec4f(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec2i(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec3i(v) => v.visit("V", &mut region)?,
            PropertyValue::Vec4i(v) => v.visit("V", &mut region)?,
        }
        Ok(())
    }
}

/// A typed accessor used by [`PropertyImpl::get`]/[`PropertyImpl::set`] so
/// callers can work in terms of `f32`/`bool`/`Vector3<f32>`/... instead of
/// matching on [`PropertyValue`] by hand.
pub trait PropertyPrimitive: Sized + Clone {
    const TAG: PrimitiveType;
    fn from_value(value: &PropertyValue) -> Option<Self>;
    fn into_value(self) -> PropertyValue;
}

macro_rules! impl_property_primitive {
    ($ty:ty, $variant:ident, $tag:expr) => {
        impl PropertyPrimitive for $ty {
            const TAG: PrimitiveType = $tag;
            fn from_value(value: &PropertyValue) -> Option<Self> {
                match value {
                    PropertyValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
            fn into_value(self) -> PropertyValue {
                PropertyValue::$variant(self)
            }
        }
    };
}

impl_property_primitive!(bool, Bool, PrimitiveType::Bool);
impl_property_primitive!(i32, Int32, PrimitiveType::Int32);
impl_property_primitive!(i64, Int64, PrimitiveType::Int64);
impl_property_primitive!(f32, Float, PrimitiveType::Float);
impl_property_primitive!(String, String, PrimitiveType::String);
impl_property_primitive!(Vector2<f32>, Vec2f, PrimitiveType::Vec2f);
impl_property_primitive!(Vector3<f32>, Vec3f, PrimitiveType::Vec3f);
impl_property_primitive!(Vector4<f32>, Vec4f, PrimitiveType::Vec4f);
impl_property_primitive!(Vector2<i32>, Vec2i, PrimitiveType::Vec2i);
impl_property_primitive!(Vector3<i32>, Vec3i, PrimitiveType::Vec3i);
impl_property_primitive!(Vector4<i32>, Vec4i, PrimitiveType::Vec4i);

/// Addresses one leaf property from the root of its node's tree: a sequence
/// of struct-field names and array indices, exactly what the serialized
/// `Links` section stores to name a link endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PropertyPath(pub Vec<PathSegment>);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    Struct(String),
    Array(usize),
}

impl Visit for PathSegment {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        let mut is_array = if region.is_reading() {
            false
        } else {
            matches!(self, PathSegment::Array(_))
        };
        is_array.visit("IsArray", &mut region)?;
        if is_array {
            let mut index = match self {
                PathSegment::Array(i) => *i as u32,
                _ => 0,
            };
            index.visit("Index", &mut region)?;
            if region.is_reading() {
                *self = PathSegment::Array(index as usize);
            }
        } else {
            let mut field_name = match self {
                PathSegment::Struct(n) => n.clone(),
                _ => String::new(),
            };
            field_name.visit("Name", &mut region)?;
            if region.is_reading() {
                *self = PathSegment::Struct(field_name);
            }
        }
        Ok(())
    }
}

impl Default for PathSegment {
    fn default() -> Self {
        PathSegment::Struct(String::new())
    }
}

impl Visit for PropertyPath {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        self.0.visit(name, visitor)
    }
}

/// Names one leaf property anywhere in the engine: the id of the node that
/// owns it, plus the handle into that node's property arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PropertyRef {
    pub node: NodeId,
    pub handle: Handle<PropertyImpl>,
}

impl PropertyRef {
    pub fn new(node: NodeId, handle: Handle<PropertyImpl>) -> Self {
        Self { node, handle }
    }
}

/// One end of a link, as stored on the *other* end: which property it points
/// to, and whether the link is weak.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub other: PropertyRef,
    pub is_weak: bool,
}

/// One node (leaf or compound) of a live property tree.
#[derive(Clone, Debug)]
pub struct PropertyImpl {
    pub type_data: TypeData,
    pub parent: Option<Handle<PropertyImpl>>,
    pub children: Vec<Handle<PropertyImpl>>,
    pub value: PropertyValue,
    pub semantics: PropertySemantics,
    pub incoming_link: Option<Link>,
    pub outgoing_links: Vec<Link>,
    pub binding_input_has_new_value: bool,
}

impl Default for PropertyImpl {
    fn default() -> Self {
        Self {
            type_data: TypeData::default(),
            parent: None,
            children: Vec::new(),
            value: PropertyValue::Bool(false),
            semantics: PropertySemantics::Interface,
            incoming_link: None,
            outgoing_links: Vec::new(),
            binding_input_has_new_value: false,
        }
    }
}

impl PropertyImpl {
    fn new(type_data: TypeData, semantics: PropertySemantics) -> Self {
        let value = if type_data.type_tag.is_compound() {
            PropertyValue::Bool(false)
        } else {
            PropertyValue::default_for(type_data.type_tag)
        };
        Self {
            type_data,
            parent: None,
            children: Vec::new(),
            value,
            semantics,
            incoming_link: None,
            outgoing_links: Vec::new(),
            binding_input_has_new_value: false,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !self.type_data.type_tag.is_compound()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Read-and-reset the flag a `BindingInput` leaf raises when the host (or
    /// a link) writes it; the owning binding calls this during `update()`.
    pub fn check_for_binding_input_new_value_and_reset(&mut self) -> bool {
        std::mem::replace(&mut self.binding_input_has_new_value, false)
    }
}

/// Builds a fresh, unlinked property (sub)tree matching `shape`, returning the
/// handle of its root. Every descendant is spawned into `pool`.
pub fn build_property_tree(
    pool: &mut Pool<PropertyImpl>,
    shape: &HierarchicalTypeData,
    semantics: PropertySemantics,
) -> Handle<PropertyImpl> {
    build_subtree(pool, shape, semantics, None)
}

fn build_subtree(
    pool: &mut Pool<PropertyImpl>,
    shape: &HierarchicalTypeData,
    semantics: PropertySemantics,
    parent: Option<Handle<PropertyImpl>>,
) -> Handle<PropertyImpl> {
    let handle = pool.spawn(PropertyImpl::new(shape.type_data.clone(), semantics));
    if let Some(parent_handle) = parent {
        pool.borrow_mut(handle).parent = Some(parent_handle);
    }
    if !shape.children.is_empty() {
        let child_handles: Vec<Handle<PropertyImpl>> = shape
            .children
            .iter()
            .map(|child_shape| build_subtree(pool, child_shape, semantics, Some(handle)))
            .collect();
        pool.borrow_mut(handle).children = child_handles;
    }
    handle
}

/// Depth-first list of every primitive-leaf descendant of `root` (`root`
/// itself included if it is a leaf).
pub fn collect_leaf_children(
    pool: &Pool<PropertyImpl>,
    root: Handle<PropertyImpl>,
) -> Vec<Handle<PropertyImpl>> {
    let mut out = Vec::new();
    collect_leaves_rec(pool, root, &mut out);
    out
}

fn collect_leaves_rec(
    pool: &Pool<PropertyImpl>,
    handle: Handle<PropertyImpl>,
    out: &mut Vec<Handle<PropertyImpl>>,
) {
    let prop = pool.borrow(handle);
    if prop.is_leaf() {
        out.push(handle);
    } else {
        for &child in prop.children.clone().iter() {
            collect_leaves_rec(pool, child, out);
        }
    }
}

/// Finds an immediate child by name (linear scan - names are unique among
/// siblings by construction invariant).
pub fn child_by_name(
    pool: &Pool<PropertyImpl>,
    parent: Handle<PropertyImpl>,
    name: &str,
) -> Option<Handle<PropertyImpl>> {
    pool.borrow(parent)
        .children
        .iter()
        .copied()
        .find(|&h| pool.borrow(h).type_data.name == name)
}

pub fn path_of(pool: &Pool<PropertyImpl>, handle: Handle<PropertyImpl>) -> PropertyPath {
    let mut segments = Vec::new();
    let mut current = handle;
    while let Some(parent_handle) = pool.borrow(current).parent {
        let parent = pool.borrow(parent_handle);
        let segment = if parent.type_data.type_tag == PrimitiveType::Array {
            let index = parent
                .children
                .iter()
                .position(|&h| h == current)
                .expect("child must be listed under its parent");
            PathSegment::Array(index)
        } else {
            PathSegment::Struct(pool.borrow(current).type_data.name.clone())
        };
        segments.push(segment);
        current = parent_handle;
    }
    segments.reverse();
    PropertyPath(segments)
}

pub fn resolve_path(
    pool: &Pool<PropertyImpl>,
    root: Handle<PropertyImpl>,
    path: &PropertyPath,
) -> Option<Handle<PropertyImpl>> {
    let mut current = root;
    for segment in &path.0 {
        current = match segment {
            PathSegment::Struct(name) => child_by_name(pool, current, name)?,
            PathSegment::Array(index) => *pool.borrow(current).children.get(*index)?,
        };
    }
    Some(current)
}

/// Typed read of a leaf's value. Fails if `handle` is not a leaf or `T`
/// doesn't match the stored `PropertyValue` variant.
pub fn get_value<T: PropertyPrimitive>(
    pool: &Pool<PropertyImpl>,
    handle: Handle<PropertyImpl>,
) -> LogicResult<T> {
    let prop = pool.borrow(handle);
    if !prop.is_leaf() {
        return Err(LogicError::illegal_argument(format!(
            "property '{}' is not a leaf",
            prop.type_data.name
        )));
    }
    T::from_value(&prop.value).ok_or_else(|| {
        LogicError::illegal_argument(format!(
            "property '{}' does not hold the requested type",
            prop.type_data.name
        ))
    })
}

/// Typed write of a leaf's value. Per spec, writing a value equal to the
/// current one (primitive equality) is a no-op and does not raise
/// `binding_input_has_new_value`, even for `BindingInput` leaves.
pub fn set_value<T: PropertyPrimitive>(
    pool: &mut Pool<PropertyImpl>,
    handle: Handle<PropertyImpl>,
    value: T,
) -> LogicResult<()> {
    let prop = pool.borrow_mut(handle);
    if !prop.is_leaf() {
        return Err(LogicError::illegal_argument(format!(
            "property '{}' is not a leaf",
            prop.type_data.name
        )));
    }
    let new_value = value.into_value();
    if new_value.type_tag() != prop.type_data.type_tag {
        return Err(LogicError::illegal_argument(format!(
            "property '{}' expects {:?}, got {:?}",
            prop.type_data.name,
            prop.type_data.type_tag,
            new_value.type_tag()
        )));
    }
    if prop.value == new_value {
        return Ok(());
    }
    prop.value = new_value;
    if prop.semantics == PropertySemantics::BindingInput {
        prop.binding_input_has_new_value = true;
    }
    Ok(())
}

/// Copies `from`'s current value into `to` without going through a typed
/// accessor - used by the engine's link-propagation step, which only knows
/// both sides are primitive leaves of the same primitive type (link creation
/// already checked that), not which concrete `T`. Returns whether `to`'s
/// value actually changed, which the caller uses to decide whether `to`'s
/// owning node must be marked dirty.
pub fn copy_leaf_value(
    pool: &mut Pool<PropertyImpl>,
    from: Handle<PropertyImpl>,
    to: Handle<PropertyImpl>,
) -> bool {
    let new_value = pool.borrow(from).value.clone();
    let prop = pool.borrow_mut(to);
    if prop.value == new_value {
        return false;
    }
    prop.value = new_value;
    if prop.semantics == PropertySemantics::BindingInput {
        prop.binding_input_has_new_value = true;
    }
    true
}

/// Walks up from `handle` to the root of its tree (the property with no
/// parent) - used to tell whether a leaf lives under a node's input tree or
/// its output tree.
pub fn root_of(pool: &Pool<PropertyImpl>, handle: Handle<PropertyImpl>) -> Handle<PropertyImpl> {
    let mut current = handle;
    while let Some(parent) = pool.borrow(current).parent {
        current = parent;
    }
    current
}

/// A flattened, handle-free mirror of a property (sub)tree, used only for
/// serialization. Header-less per spec: `{ name, type tag, semantics, value
/// (for leaves), children[] }`.
#[derive(Clone, Debug)]
pub struct PropertyTree {
    pub name: String,
    pub type_tag: PrimitiveType,
    pub semantics: PropertySemantics,
    pub value: PropertyValue,
    pub children: Vec<PropertyTree>,
}

impl Default for PropertyTree {
    fn default() -> Self {
        Self {
            name: String::new(),
            type_tag: PrimitiveType::Bool,
            semantics: PropertySemantics::Interface,
            value: PropertyValue::Bool(false),
            children: Vec::new(),
        }
    }
}

impl Visit for PropertyTree {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.name.visit("Name", &mut region)?;
        self.type_tag.visit("Tag", &mut region)?;
        self.semantics.visit("Semantics", &mut region)?;
        self.value.visit("Value", &mut region)?;
        self.children.visit("Children", &mut region)?;
        Ok(())
    }
}

/// Snapshots a live property (sub)tree into its serializable mirror.
pub fn to_property_tree(pool: &Pool<PropertyImpl>, handle: Handle<PropertyImpl>) -> PropertyTree {
    let prop = pool.borrow(handle);
    PropertyTree {
        name: prop.type_data.name.clone(),
        type_tag: prop.type_data.type_tag,
        semantics: prop.semantics,
        value: prop.value.clone(),
        children: prop
            .children
            .iter()
            .map(|&child| to_property_tree(pool, child))
            .collect(),
    }
}

/// Rebuilds a live property (sub)tree from its serializable mirror, spawning
/// every node into `pool`. Returns the new root handle.
pub fn from_property_tree(pool: &mut Pool<PropertyImpl>, tree: &PropertyTree) -> Handle<PropertyImpl> {
    build_from_tree(pool, tree, None)
}

fn build_from_tree(
    pool: &mut Pool<PropertyImpl>,
    tree: &PropertyTree,
    parent: Option<Handle<PropertyImpl>>,
) -> Handle<PropertyImpl> {
    let handle = pool.spawn(PropertyImpl {
        type_data: TypeData::new(tree.name.clone(), tree.type_tag),
        parent,
        children: Vec::new(),
        value: tree.value.clone(),
        semantics: tree.semantics,
        incoming_link: None,
        outgoing_links: Vec::new(),
        binding_input_has_new_value: false,
    });
    let children: Vec<Handle<PropertyImpl>> = tree
        .children
        .iter()
        .map(|child| build_from_tree(pool, child, Some(handle)))
        .collect();
    pool.borrow_mut(handle).children = children;
    handle
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::type_data::HierarchicalTypeData;

    #[test]
    fn set_equal_value_does_not_raise_new_value_flag() {
        let shape = HierarchicalTypeData::make_primitive("x", PrimitiveType::Float);
        let mut pool = Pool::new();
        let handle = build_property_tree(&mut pool, &shape, PropertySemantics::BindingInput);
        set_value(&mut pool, handle, 1.0f32).unwrap();
        pool.borrow_mut(handle).binding_input_has_new_value = false;
        set_value(&mut pool, handle, 1.0f32).unwrap();
        assert!(!pool.borrow(handle).binding_input_has_new_value);
        set_value(&mut pool, handle, 2.0f32).unwrap();
        assert!(pool.borrow(handle).binding_input_has_new_value);
    }

    #[test]
    fn path_round_trip_through_struct_and_array() {
        let shape = HierarchicalTypeData::make_struct_of(
            "root",
            vec![
                HierarchicalTypeData::make_primitive("a", PrimitiveType::Float),
                HierarchicalTypeData::make_array("b", 3, PrimitiveType::Int32),
            ],
        );
        let mut pool = Pool::new();
        let root = build_property_tree(&mut pool, &shape, PropertySemantics::Interface);
        let b = child_by_name(&pool, root, "b").unwrap();
        let b1 = pool.borrow(b).children[1];
        let path = path_of(&pool, b1);
        assert_eq!(
            path,
            PropertyPath(vec![PathSegment::Struct("b".into()), PathSegment::Array(1)])
        );
        assert_eq!(resolve_path(&pool, root, &path), Some(b1));
    }

    #[test]
    fn collect_leaf_children_is_depth_first() {
        let shape = HierarchicalTypeData::make_struct(
            "root",
            vec![
                ("a".to_string(), PrimitiveType::Float),
                ("b".to_string(), PrimitiveType::Int32),
            ],
        );
        let mut pool = Pool::new();
        let root = build_property_tree(&mut pool, &shape, PropertySemantics::Interface);
        let leaves = collect_leaf_children(&pool, root);
        assert_eq!(leaves.len(), 2);
    }
}
