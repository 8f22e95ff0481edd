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

//! Immutable description of a property's shape: primitive tag, name, and -
//! for compound properties - the ordered list of child shapes. A
//! [`HierarchicalTypeData`] is pure data; it carries no values and is cheap
//! to clone and compare structurally.

use scene_logic_core::visitor::{Visit, VisitResult, Visitor};

/// The primitive tag a leaf property's value is stored as. `Struct` and
/// `Array` are the two compound tags - a property carrying one of them has no
/// value of its own; its value lives in its primitive descendants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    Int32,
    Int64,
    Float,
    String,
    Vec2f,
    Vec3f,
    Vec4f,
    Vec2i,
    Vec3i,
    Vec4i,
    Struct,
    Array,
}

impl PrimitiveType {
    pub fn is_compound(self) -> bool {
        matches!(self, PrimitiveType::Struct | PrimitiveType::Array)
    }

    pub(crate) fn to_tag(self) -> u8 {
        match self {
            PrimitiveType::Bool => 0,
            PrimitiveType::Int32 => 1,
            PrimitiveType::Int64 => 2,
            PrimitiveType::Float => 3,
            PrimitiveType::String => 4,
            PrimitiveType::Vec2f => 5,
            PrimitiveType::Vec3f => 6,
            PrimitiveType::Vec4f => 7,
            PrimitiveType::Vec2i => 8,
            PrimitiveType::Vec3i => 9,
            PrimitiveType::Vec4i => 10,
            PrimitiveType::Struct => 11,
            PrimitiveType::Array => 12,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PrimitiveType::Bool,
            1 => PrimitiveType::Int32,
            2 => PrimitiveType::Int64,
            3 => PrimitiveType::Float,
            4 => PrimitiveType::String,
            5 => PrimitiveType::Vec2f,
            6 => PrimitiveType::Vec3f,
            7 => PrimitiveType::Vec4f,
            8 => PrimitiveType::Vec2i,
            9 => PrimitiveType::Vec3i,
            10 => PrimitiveType::Vec4i,
            11 => PrimitiveType::Struct,
            12 => PrimitiveType::Array,
            _ => return None,
        })
    }
}

impl Default for PrimitiveType {
    fn default() -> Self {
        PrimitiveType::Bool
    }
}

impl Visit for PrimitiveType {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut tag = self.to_tag();
        tag.visit(name, visitor)?;
        if visitor.is_reading() {
            *self = PrimitiveType::from_tag(tag)
                .ok_or_else(|| scene_logic_core::visitor::VisitError::NotSupportedFormat)?;
        }
        Ok(())
    }
}

/// `(name, primitive tag)`. Equality is structural on both fields - two
/// `TypeData` that differ only in name are different types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct TypeData {
    pub name: String,
    pub type_tag: PrimitiveType,
}

impl TypeData {
    pub fn new(name: impl Into<String>, type_tag: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            type_tag,
        }
    }
}

impl Visit for TypeData {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.name.visit("Name", &mut region)?;
        self.type_tag.visit("Tag", &mut region)?;
        Ok(())
    }
}

/// `(typeData, children)`. Order of children is significant - reordering
/// children produces a different type.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct HierarchicalTypeData {
    pub type_data: TypeData,
    pub children: Vec<HierarchicalTypeData>,
}

impl HierarchicalTypeData {
    /// A primitive leaf; always has no children.
    pub fn make_primitive(name: impl Into<String>, tag: PrimitiveType) -> Self {
        assert!(
            !tag.is_compound(),
            "make_primitive requires a primitive tag"
        );
        Self {
            type_data: TypeData::new(name, tag),
            children: Vec::new(),
        }
    }

    /// An `Array` type whose `size` anonymous children all share `element_tag`.
    pub fn make_array(name: impl Into<String>, size: usize, element_tag: PrimitiveType) -> Self {
        let children = (0..size)
            .map(|_| HierarchicalTypeData::make_primitive("", element_tag))
            .collect();
        Self {
            type_data: TypeData::new(name, PrimitiveType::Array),
            children,
        }
    }

    /// A `Struct` type whose children are primitive leaves named in order.
    pub fn make_struct(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, PrimitiveType)>,
    ) -> Self {
        let children = fields
            .into_iter()
            .map(|(field_name, tag)| HierarchicalTypeData::make_primitive(field_name, tag))
            .collect();
        Self {
            type_data: TypeData::new(name, PrimitiveType::Struct),
            children,
        }
    }

    /// A `Struct` whose children are arbitrary (possibly compound) shapes,
    /// used to nest e.g. an animation node's `channelsData` struct-of-structs.
    pub fn make_struct_of(
        name: impl Into<String>,
        children: Vec<HierarchicalTypeData>,
    ) -> Self {
        Self {
            type_data: TypeData::new(name, PrimitiveType::Struct),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        !self.type_data.type_tag.is_compound()
    }
}

impl Visit for HierarchicalTypeData {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.type_data.visit("Type", &mut region)?;
        self.children.visit("Children", &mut region)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn array_children_share_element_tag_and_are_anonymous() {
        let t = HierarchicalTypeData::make_array("values", 3, PrimitiveType::Float);
        assert_eq!(t.children.len(), 3);
        assert!(t.children.iter().all(|c| c.type_data.name.is_empty()
            && c.type_data.type_tag == PrimitiveType::Float));
    }

    #[test]
    fn reordering_struct_fields_changes_equality() {
        let a = HierarchicalTypeData::make_struct(
            "s",
            vec![
                ("x".to_string(), PrimitiveType::Float),
                ("y".to_string(), PrimitiveType::Float),
            ],
        );
        let b = HierarchicalTypeData::make_struct(
            "s",
            vec![
                ("y".to_string(), PrimitiveType::Float),
                ("x".to_string(), PrimitiveType::Float),
            ],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn type_data_name_matters_for_equality() {
        let a = TypeData::new("a", PrimitiveType::Int32);
        let b = TypeData::new("b", PrimitiveType::Int32);
        assert_ne!(a, b);
    }
}
