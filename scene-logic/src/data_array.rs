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

//! Immutable, id-addressed arrays of animation source data. A `DataArray` is
//! never mutated after creation - "editing" it means creating a new one and
//! repointing whatever referenced the old id.

use crate::ids::DataArrayId;
use nalgebra::{Vector2, Vector3, Vector4};
use scene_logic_core::visitor::{Visit, VisitError, VisitResult, Visitor};

/// One element type a `DataArray` can hold.
#[derive(Clone, Debug, PartialEq)]
pub enum DataArrayContent {
    Float(Vec<f32>),
    Int32(Vec<i32>),
    Vec2f(Vec<Vector2<f32>>),
    Vec3f(Vec<Vector3<f32>>),
    Vec4f(Vec<Vector4<f32>>),
    Vec2i(Vec<Vector2<i32>>),
    Vec3i(Vec<Vector3<i32>>),
    Vec4i(Vec<Vector4<i32>>),
    /// Array-of-float elements, e.g. morph target weights; each element is
    /// itself a fixed-size (but array-length-uniform) list of floats.
    ArrayOfFloat(Vec<Vec<f32>>),
}

impl DataArrayContent {
    pub fn len(&self) -> usize {
        match self {
            DataArrayContent::Float(v) => v.len(),
            DataArrayContent::Int32(v) => v.len(),
            DataArrayContent::Vec2f(v) => v.len(),
            DataArrayContent::Vec3f(v) => v.len(),
            DataArrayContent::Vec4f(v) => v.len(),
            DataArrayContent::Vec2i(v) => v.len(),
            DataArrayContent::Vec3i(v) => v.len(),
            DataArrayContent::Vec4i(v) => v.len(),
            DataArrayContent::ArrayOfFloat(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn tag(&self) -> u8 {
        match self {
            DataArrayContent::Float(_) => 0,
            DataArrayContent::Int32(_) => 1,
            DataArrayContent::Vec2f(_) => 2,
            DataArrayContent::Vec3f(_) => 3,
            DataArrayContent::Vec4f(_) => 4,
            DataArrayContent::Vec2i(_) => 5,
            DataArrayContent::Vec3i(_) => 6,
            DataArrayContent::Vec4i(_) => 7,
            DataArrayContent::ArrayOfFloat(_) => 8,
        }
    }

    fn empty_for_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => DataArrayContent::Float(Vec::new()),
            1 => DataArrayContent::Int32(Vec::new()),
            2 => DataArrayContent::Vec2f(Vec::new()),
            3 => DataArrayContent::Vec3f(Vec::new()),
            4 => DataArrayContent::Vec4f(Vec::new()),
            5 => DataArrayContent::Vec2i(Vec::new()),
            6 => DataArrayContent::Vec3i(Vec::new()),
            7 => DataArrayContent::Vec4i(Vec::new()),
            8 => DataArrayContent::ArrayOfFloat(Vec::new()),
            _ => return None,
        })
    }

    /// Reads element `index` as a float, for element types that are plain
    /// floats (used by the timestamps channel, which is always `Float`).
    pub fn as_float_slice(&self) -> Option<&[f32]> {
        match self {
            DataArrayContent::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl Visit for DataArrayContent {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        let mut tag = if region.is_reading() { 0 } else { self.tag() };
        tag.visit("Tag", &mut region)?;
        if region.is_reading() {
            *self = DataArrayContent::empty_for_tag(tag).ok_or(VisitError::NotSupportedFormat)?;
        }
        match self {
            DataArrayContent::Float(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Int32(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec2f(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec3f(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec4f(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec2i(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec3i(v) => v.visit("Data", &mut region)?,
            DataArrayContent::Vec4i(v) => v.visit("Data", &mut region)?,
            DataArrayContent::ArrayOfFloat(v) => v.visit("Data", &mut region)?,
        }
        Ok(())
    }
}

/// An immutable, id-addressed array of animation source data.
#[derive(Clone, Debug, PartialEq)]
pub struct DataArray {
    pub id: DataArrayId,
    pub name: String,
    pub content: DataArrayContent,
}

impl DataArray {
    pub fn new(id: DataArrayId, name: impl Into<String>, content: DataArrayContent) -> Self {
        Self {
            id,
            name: name.into(),
            content,
        }
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl Default for DataArray {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            content: DataArrayContent::Float(Vec::new()),
        }
    }
}

impl Visit for DataArray {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.name.visit("Name", &mut region)?;
        self.id.visit("Id", &mut region)?;
        self.content.visit("Content", &mut region)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_array_round_trip() {
        let mut original = DataArray::new(
            7,
            "timestamps",
            DataArrayContent::Float(vec![0.0, 1.0, 2.0]),
        );
        let bytes = Visitor::save_binary(&mut original, 1).unwrap();
        let mut loaded = DataArray::default();
        Visitor::load_binary(&bytes, &mut loaded).unwrap();
        assert_eq!(loaded, original);
    }
}
