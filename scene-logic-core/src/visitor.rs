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

//! Visitor is a tree-based binary serializer/deserializer.
//!
//! A [`Visitor`] builds up a tree of named *regions*, each holding a set of
//! named *fields*. The same [`Visit::visit`] call is used both when writing
//! (the value is copied into the tree) and when reading (the tree is copied
//! into the value) - the direction is a property of the [`Visitor`], not of
//! the call site. This is what makes the format schema-evolvable: a type can
//! add a new field and simply ignore the [`VisitResult`] of visiting it
//! (`let _ = new_field.visit("NewField", &mut region);`) so that loading an
//! older file - where the field's region/field is absent - leaves the default
//! value in place instead of failing the whole load.

pub mod prelude {
    //! Import this to bring [`Visit`] and friends into scope.
    pub use super::{Visit, VisitError, VisitResult, Visitor};
}

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::{UnitQuaternion, Vector2, Vector3, Vector4};
use std::{
    error::Error,
    fmt::{Display, Formatter},
    io::{self, Cursor, Read, Write},
};
use uuid::Uuid;

/// The leaf value stored in a single field of a visitor region.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Uuid(Uuid),
    String(String),
    Binary(Vec<u8>),
}

struct Field {
    name: String,
    kind: FieldKind,
}

struct Node {
    name: String,
    fields: Vec<Field>,
    children: Vec<Node>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
            children: Vec::new(),
        }
    }

    fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn find_child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|n| n.name == name)
    }

    fn find_child_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|n| n.name == name)
    }
}

/// Error produced while visiting a value. Carries enough context (the name of
/// the offending field/region) to be surfaced directly in a
/// `BinaryVersionMismatch` at the call site.
#[derive(Debug)]
pub enum VisitError {
    RegionDoesNotExist(String),
    FieldDoesNotExist(String),
    FieldAlreadyExists(String),
    RegionAlreadyExists(String),
    TypeMismatch(String),
    Io(io::Error),
    NotSupportedFormat,
    User(String),
}

impl From<io::Error> for VisitError {
    fn from(e: io::Error) -> Self {
        VisitError::Io(e)
    }
}

impl Display for VisitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            VisitError::RegionDoesNotExist(name) => write!(f, "region '{name}' does not exist"),
            VisitError::FieldDoesNotExist(name) => write!(f, "field '{name}' does not exist"),
            VisitError::FieldAlreadyExists(name) => write!(f, "field '{name}' already exists"),
            VisitError::RegionAlreadyExists(name) => write!(f, "region '{name}' already exists"),
            VisitError::TypeMismatch(name) => write!(f, "type mismatch for field '{name}'"),
            VisitError::Io(e) => write!(f, "io error: {e}"),
            VisitError::NotSupportedFormat => write!(f, "unsupported binary format"),
            VisitError::User(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for VisitError {}

pub type VisitResult = Result<(), VisitError>;

/// A tree-based serializer/deserializer. A single instance is used for an
/// entire save or load pass; it is either in writing mode (building the tree
/// up from live values) or reading mode (the tree was just parsed from bytes
/// and values are copied out of it).
pub struct Visitor {
    root: Node,
    /// Path of region names from the root down to the region currently being
    /// visited; re-walked on every field access so the node tree owns no
    /// parent pointers.
    path: Vec<String>,
    reading: bool,
}

impl Default for Visitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor {
    const MAGIC: &'static [u8; 4] = b"SLV1";

    pub fn new() -> Self {
        Self {
            root: Node::new("__root__"),
            path: Vec::new(),
            reading: false,
        }
    }

    pub fn is_reading(&self) -> bool {
        self.reading
    }

    fn current_node_mut(&mut self) -> &mut Node {
        let mut node = &mut self.root;
        for name in &self.path {
            node = node
                .children
                .iter_mut()
                .find(|n| &n.name == name)
                .expect("path invariant violated: region must exist");
        }
        node
    }

    fn current_node(&self) -> &Node {
        let mut node = &self.root;
        for name in &self.path {
            node = node
                .children
                .iter()
                .find(|n| &n.name == name)
                .expect("path invariant violated: region must exist");
        }
        node
    }

    /// Enters a named region, creating it if writing or locating it if
    /// reading. Returns [`VisitError::RegionDoesNotExist`] when reading and
    /// no such region is present - the caller discards this `Result` for an
    /// optional/backward-compatible field.
    pub fn enter_region(&mut self, name: &str) -> Result<RegionGuard<'_>, VisitError> {
        if self.reading {
            if self.current_node().find_child(name).is_none() {
                return Err(VisitError::RegionDoesNotExist(name.to_string()));
            }
        } else if self.current_node().find_child(name).is_some() {
            return Err(VisitError::RegionAlreadyExists(name.to_string()));
        } else {
            self.current_node_mut().children.push(Node::new(name));
        }
        self.path.push(name.to_string());
        Ok(RegionGuard { visitor: self })
    }

    fn leave_region(&mut self) {
        self.path.pop();
    }

    fn add_field(&mut self, name: &str, kind: FieldKind) {
        debug_assert!(
            self.current_node().find_field(name).is_none(),
            "duplicate field '{name}'"
        );
        self.current_node_mut().fields.push(Field {
            name: name.to_string(),
            kind,
        });
    }

    fn get_field(&self, name: &str) -> Result<&FieldKind, VisitError> {
        self.current_node()
            .find_field(name)
            .map(|f| &f.kind)
            .ok_or_else(|| VisitError::FieldDoesNotExist(name.to_string()))
    }

    /// Generic leaf-field visit used by the primitive `Visit` impls below.
    pub fn visit_primitive<T: Copy>(
        &mut self,
        name: &str,
        value: &mut T,
        to_kind: impl FnOnce(T) -> FieldKind,
        from_kind: impl FnOnce(&FieldKind) -> Option<T>,
    ) -> VisitResult {
        if self.reading {
            let kind = self.get_field(name)?;
            *value = from_kind(kind).ok_or_else(|| VisitError::TypeMismatch(name.to_string()))?;
        } else {
            self.add_field(name, to_kind(*value));
        }
        Ok(())
    }

    /// Serializes `root` (after visiting it under a synthetic top-level
    /// region) into a binary blob, prefixed with a magic number and the
    /// schema feature level.
    pub fn save_binary(root: &mut dyn Visit, feature_level: u32) -> Result<Vec<u8>, VisitError> {
        let mut visitor = Self::new();
        visitor.reading = false;
        root.visit("Root", &mut visitor)?;

        let mut bytes = Vec::new();
        bytes.write_all(Self::MAGIC)?;
        bytes.write_u32::<LittleEndian>(feature_level)?;
        write_node(&visitor.root, &mut bytes)?;
        Ok(bytes)
    }

    /// Parses a binary blob produced by [`Self::save_binary`] and visits
    /// `root` in reading mode. Returns the feature level the file was written
    /// with so the caller can reject files from a newer, forward-incompatible
    /// schema before trusting any of its data.
    pub fn load_binary(bytes: &[u8], root: &mut dyn Visit) -> Result<u32, VisitError> {
        let mut cursor = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cursor.read_exact(&mut magic)?;
        if &magic != Self::MAGIC {
            return Err(VisitError::NotSupportedFormat);
        }
        let feature_level = cursor.read_u32::<LittleEndian>()?;

        let root_node = read_node(&mut cursor)?;
        let mut visitor = Self::new();
        visitor.reading = true;
        visitor.root = root_node;
        root.visit("Root", &mut visitor)?;
        Ok(feature_level)
    }
}

/// RAII guard returned by [`Visitor::enter_region`]; leaves the region on
/// drop so nested `?`-early-returns can't leave the cursor stuck inside a
/// region that was never properly closed.
pub struct RegionGuard<'a> {
    visitor: &'a mut Visitor,
}

impl<'a> Drop for RegionGuard<'a> {
    fn drop(&mut self) {
        self.visitor.leave_region();
    }
}

impl<'a> std::ops::Deref for RegionGuard<'a> {
    type Target = Visitor;
    fn deref(&self) -> &Visitor {
        self.visitor
    }
}

impl<'a> std::ops::DerefMut for RegionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Visitor {
        self.visitor
    }
}

fn write_node(node: &Node, out: &mut Vec<u8>) -> VisitResult {
    write_string(&node.name, out)?;
    out.write_u32::<LittleEndian>(node.fields.len() as u32)?;
    for field in &node.fields {
        write_string(&field.name, out)?;
        write_field_kind(&field.kind, out)?;
    }
    out.write_u32::<LittleEndian>(node.children.len() as u32)?;
    for child in &node.children {
        write_node(child, out)?;
    }
    Ok(())
}

fn read_node(cursor: &mut Cursor<&[u8]>) -> Result<Node, VisitError> {
    let name = read_string(cursor)?;
    let mut node = Node::new(&name);
    let field_count = cursor.read_u32::<LittleEndian>()?;
    for _ in 0..field_count {
        let field_name = read_string(cursor)?;
        let kind = read_field_kind(cursor)?;
        node.fields.push(Field {
            name: field_name,
            kind,
        });
    }
    let child_count = cursor.read_u32::<LittleEndian>()?;
    for _ in 0..child_count {
        node.children.push(read_node(cursor)?);
    }
    Ok(node)
}

fn write_string(s: &str, out: &mut Vec<u8>) -> VisitResult {
    out.write_u32::<LittleEndian>(s.len() as u32)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, VisitError> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| VisitError::NotSupportedFormat)
}

const TAG_BOOL: u8 = 0;
const TAG_U8: u8 = 1;
const TAG_I8: u8 = 2;
const TAG_U16: u8 = 3;
const TAG_I16: u8 = 4;
const TAG_U32: u8 = 5;
const TAG_I32: u8 = 6;
const TAG_U64: u8 = 7;
const TAG_I64: u8 = 8;
const TAG_F32: u8 = 9;
const TAG_F64: u8 = 10;
const TAG_UUID: u8 = 11;
const TAG_STRING: u8 = 12;
const TAG_BINARY: u8 = 13;

fn write_field_kind(kind: &FieldKind, out: &mut Vec<u8>) -> VisitResult {
    match kind {
        FieldKind::Bool(v) => {
            out.write_u8(TAG_BOOL)?;
            out.write_u8(*v as u8)?;
        }
        FieldKind::U8(v) => {
            out.write_u8(TAG_U8)?;
            out.write_u8(*v)?;
        }
        FieldKind::I8(v) => {
            out.write_u8(TAG_I8)?;
            out.write_i8(*v)?;
        }
        FieldKind::U16(v) => {
            out.write_u8(TAG_U16)?;
            out.write_u16::<LittleEndian>(*v)?;
        }
        FieldKind::I16(v) => {
            out.write_u8(TAG_I16)?;
            out.write_i16::<LittleEndian>(*v)?;
        }
        FieldKind::U32(v) => {
            out.write_u8(TAG_U32)?;
            out.write_u32::<LittleEndian>(*v)?;
        }
        FieldKind::I32(v) => {
            out.write_u8(TAG_I32)?;
            out.write_i32::<LittleEndian>(*v)?;
        }
        FieldKind::U64(v) => {
            out.write_u8(TAG_U64)?;
            out.write_u64::<LittleEndian>(*v)?;
        }
        FieldKind::I64(v) => {
            out.write_u8(TAG_I64)?;
            out.write_i64::<LittleEndian>(*v)?;
        }
        FieldKind::F32(v) => {
            out.write_u8(TAG_F32)?;
            out.write_f32::<LittleEndian>(*v)?;
        }
        FieldKind::F64(v) => {
            out.write_u8(TAG_F64)?;
            out.write_f64::<LittleEndian>(*v)?;
        }
        FieldKind::Uuid(v) => {
            out.write_u8(TAG_UUID)?;
            out.write_all(v.as_bytes())?;
        }
        FieldKind::String(v) => {
            out.write_u8(TAG_STRING)?;
            write_string(v, out)?;
        }
        FieldKind::Binary(v) => {
            out.write_u8(TAG_BINARY)?;
            out.write_u32::<LittleEndian>(v.len() as u32)?;
            out.write_all(v)?;
        }
    }
    Ok(())
}

fn read_field_kind(cursor: &mut Cursor<&[u8]>) -> Result<FieldKind, VisitError> {
    let tag = cursor.read_u8()?;
    Ok(match tag {
        TAG_BOOL => FieldKind::Bool(cursor.read_u8()? != 0),
        TAG_U8 => FieldKind::U8(cursor.read_u8()?),
        TAG_I8 => FieldKind::I8(cursor.read_i8()?),
        TAG_U16 => FieldKind::U16(cursor.read_u16::<LittleEndian>()?),
        TAG_I16 => FieldKind::I16(cursor.read_i16::<LittleEndian>()?),
        TAG_U32 => FieldKind::U32(cursor.read_u32::<LittleEndian>()?),
        TAG_I32 => FieldKind::I32(cursor.read_i32::<LittleEndian>()?),
        TAG_U64 => FieldKind::U64(cursor.read_u64::<LittleEndian>()?),
        TAG_I64 => FieldKind::I64(cursor.read_i64::<LittleEndian>()?),
        TAG_F32 => FieldKind::F32(cursor.read_f32::<LittleEndian>()?),
        TAG_F64 => FieldKind::F64(cursor.read_f64::<LittleEndian>()?),
        TAG_UUID => {
            let mut bytes = [0u8; 16];
            cursor.read_exact(&mut bytes)?;
            FieldKind::Uuid(Uuid::from_bytes(bytes))
        }
        TAG_STRING => FieldKind::String(read_string(cursor)?),
        TAG_BINARY => {
            let len = cursor.read_u32::<LittleEndian>()? as usize;
            let mut buf = vec![0u8; len];
            cursor.read_exact(&mut buf)?;
            FieldKind::Binary(buf)
        }
        _ => return Err(VisitError::NotSupportedFormat),
    })
}

/// Implemented by every type that can appear in the serialized object graph.
/// The same method is used to write and to read - see the module docs.
pub trait Visit {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult;
}

macro_rules! impl_visit_primitive {
    ($ty:ty, $variant:ident) => {
        impl Visit for $ty {
            fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
                visitor.visit_primitive(
                    name,
                    self,
                    |v| FieldKind::$variant(v),
                    |k| match k {
                        FieldKind::$variant(v) => Some(*v),
                        _ => None,
                    },
                )
            }
        }
    };
}

impl_visit_primitive!(bool, Bool);
impl_visit_primitive!(u8, U8);
impl_visit_primitive!(i8, I8);
impl_visit_primitive!(u16, U16);
impl_visit_primitive!(i16, I16);
impl_visit_primitive!(u32, U32);
impl_visit_primitive!(i32, I32);
impl_visit_primitive!(u64, U64);
impl_visit_primitive!(i64, I64);
impl_visit_primitive!(f32, F32);
impl_visit_primitive!(f64, F64);
impl_visit_primitive!(Uuid, Uuid);

impl Visit for String {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        if visitor.is_reading() {
            match visitor.get_field(name)? {
                FieldKind::String(v) => {
                    *self = v.clone();
                    Ok(())
                }
                _ => Err(VisitError::TypeMismatch(name.to_string())),
            }
        } else {
            visitor.add_field(name, FieldKind::String(self.clone()));
            Ok(())
        }
    }
}

impl Visit for Vector2<f32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        Ok(())
    }
}

impl Visit for Vector3<f32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        self.z.visit("Z", &mut region)?;
        Ok(())
    }
}

impl Visit for Vector4<f32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        self.z.visit("Z", &mut region)?;
        self.w.visit("W", &mut region)?;
        Ok(())
    }
}

impl Visit for Vector2<i32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        Ok(())
    }
}

impl Visit for Vector3<i32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        self.z.visit("Z", &mut region)?;
        Ok(())
    }
}

impl Visit for Vector4<i32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.x.visit("X", &mut region)?;
        self.y.visit("Y", &mut region)?;
        self.z.visit("Z", &mut region)?;
        self.w.visit("W", &mut region)?;
        Ok(())
    }
}

impl Visit for UnitQuaternion<f32> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        let mut raw = Vector4::new(self.i, self.j, self.k, self.w);
        raw.visit("Raw", &mut region)?;
        if region.is_reading() {
            *self = UnitQuaternion::new_normalize(nalgebra::Quaternion::new(
                raw.w, raw.x, raw.y, raw.z,
            ));
        }
        Ok(())
    }
}

/// A homogeneous list of visitable items, serialized as a `Length` field
/// followed by one `ItemN` region per element. Reading replaces the whole
/// vector (it does not try to merge with whatever was already there).
impl<T: Visit + Default> Visit for Vec<T> {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        let mut len = self.len() as u32;
        len.visit("Length", &mut region)?;
        if region.is_reading() {
            self.clear();
            for i in 0..len {
                let mut item = T::default();
                item.visit(&format!("Item{i}"), &mut region)?;
                self.push(item);
            }
        } else {
            for (i, item) in self.iter_mut().enumerate() {
                item.visit(&format!("Item{i}"), &mut region)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_primitives() {
        #[derive(Default)]
        struct Data {
            a: i32,
            b: f32,
            c: bool,
            name: String,
        }
        impl Visit for Data {
            fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
                let mut region = visitor.enter_region(name)?;
                self.a.visit("A", &mut region)?;
                self.b.visit("B", &mut region)?;
                self.c.visit("C", &mut region)?;
                self.name.visit("Name", &mut region)?;
                Ok(())
            }
        }

        let mut original = Data {
            a: 42,
            b: 1.5,
            c: true,
            name: "hello".to_string(),
        };
        let bytes = Visitor::save_binary(&mut original, 1).unwrap();

        let mut loaded = Data::default();
        let level = Visitor::load_binary(&bytes, &mut loaded).unwrap();
        assert_eq!(level, 1);
        assert_eq!(loaded.a, 42);
        assert_eq!(loaded.b, 1.5);
        assert!(loaded.c);
        assert_eq!(loaded.name, "hello");
    }

    #[test]
    fn missing_optional_field_keeps_default() {
        #[derive(Default)]
        struct Old {
            a: i32,
        }
        impl Visit for Old {
            fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
                let mut region = visitor.enter_region(name)?;
                self.a.visit("A", &mut region)?;
                Ok(())
            }
        }

        #[derive(Default)]
        struct New {
            a: i32,
            b: i32,
        }
        impl Visit for New {
            fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
                let mut region = visitor.enter_region(name)?;
                self.a.visit("A", &mut region)?;
                let _ = self.b.visit("B", &mut region); // optional, backward compatibility
                Ok(())
            }
        }

        let mut old = Old { a: 7 };
        let bytes = Visitor::save_binary(&mut old, 1).unwrap();

        let mut new = New { a: 0, b: 99 };
        Visitor::load_binary(&bytes, &mut new).unwrap();
        assert_eq!(new.a, 7);
        assert_eq!(new.b, 99, "absent field must leave the pre-existing default untouched");
    }

    #[test]
    fn vec_round_trip() {
        let mut values: Vec<i32> = vec![1, 2, 3];
        let bytes = Visitor::save_binary(&mut values, 1).unwrap();
        let mut loaded: Vec<i32> = Vec::new();
        Visitor::load_binary(&bytes, &mut loaded).unwrap();
        assert_eq!(loaded, vec![1, 2, 3]);
    }
}
