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

//! Binding nodes mirror part of an external scene-graph object's writable
//! state as inputs and push changes to it during `update()`. The renderer
//! that owns the actual objects is out of scope; each binding kind talks to
//! its object only through a small trait, implemented by the host. A binding
//! holds its external object behind `Rc<RefCell<dyn Trait>>` rather than a
//! borrowed reference - the engine stores every node in one long-lived map,
//! so a borrow with a lifetime parameter would have to infect `Engine`
//! itself, and the host is expected to share the same object with other
//! subsystems (the renderer) while the binding holds it.
//!
//! `TimerNode` lives here too: the bindings table in the source this crate
//! is modeled on lists it alongside true bindings, even though it has no
//! external object of its own.

use crate::error::{LogicError, LogicResult};
use crate::property::{
    get_value, set_value, PropertyImpl, PropertyPrimitive, PropertySemantics,
};
use crate::type_data::{HierarchicalTypeData, PrimitiveType};
use nalgebra::{Vector2, Vector3, Vector4};
use scene_logic_core::pool::{Handle, Pool};
use std::cell::RefCell;
use std::rc::Rc;

/// Reads a leaf's new-value flag and, if it was set, its current value,
/// resetting the flag. Every binding's `update()` uses this to decide which
/// of its inputs actually changed since the flag was last consumed.
fn take_new_value<T: PropertyPrimitive>(
    pool: &mut Pool<PropertyImpl>,
    handle: Handle<PropertyImpl>,
) -> LogicResult<Option<T>> {
    let had_new_value = pool
        .borrow_mut(handle)
        .check_for_binding_input_new_value_and_reset();
    if had_new_value {
        Ok(Some(get_value::<T>(pool, handle)?))
    } else {
        Ok(None)
    }
}

/// Seeds a leaf's value directly from the external object at construction,
/// bypassing `set_value` so the write does not itself raise
/// `binding_input_has_new_value` - per spec, the first `update()` after
/// construction must be a no-op unless the host wrote inputs in between.
fn seed<T: PropertyPrimitive>(pool: &mut Pool<PropertyImpl>, handle: Handle<PropertyImpl>, value: T) {
    pool.borrow_mut(handle).value = value.into_value();
}

fn child(pool: &Pool<PropertyImpl>, root: Handle<PropertyImpl>, name: &str) -> Handle<PropertyImpl> {
    crate::property::child_by_name(pool, root, name)
        .unwrap_or_else(|| panic!("binding input tree is missing field '{name}'"))
}

// ---------------------------------------------------------------------------
// NodeBinding
// ---------------------------------------------------------------------------

/// The subset of an external scene node's state a `NodeBinding` mirrors.
/// `rotation` is Euler angles in radians, matching the property's `Vec3f`
/// tag - there is no quaternion primitive type in this engine's type system.
/// `visibility` is a tri-state (0 = hidden, 1 = visible, 2 = inherited),
/// distinct from `enabled`, which controls whether the node updates at all.
pub trait ExternalSceneNode {
    fn translation(&self) -> Vector3<f32>;
    fn set_translation(&mut self, value: Vector3<f32>);
    fn rotation(&self) -> Vector3<f32>;
    fn set_rotation(&mut self, value: Vector3<f32>);
    fn scale(&self) -> Vector3<f32>;
    fn set_scale(&mut self, value: Vector3<f32>);
    fn visibility(&self) -> i32;
    fn set_visibility(&mut self, value: i32);
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, value: bool);
}

pub struct NodeBindingState {
    external: Rc<RefCell<dyn ExternalSceneNode>>,
}

impl NodeBindingState {
    /// Rebuilds the state half of a binding around an already-resolved
    /// external object, bypassing the seed-from-current-state step - used
    /// when loading, where the saved property tree is authoritative and the
    /// external object's current state is irrelevant.
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalSceneNode>>) -> Self {
        Self { external }
    }
}

/// Builds the `{translation, rotation, scale, visibility, enabled}` input
/// tree for a `NodeBinding`, seeded from `external`'s current state.
pub fn build_node_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalSceneNode>>,
) -> (Handle<PropertyImpl>, NodeBindingState) {
    let shape = HierarchicalTypeData::make_struct_of(
        "Inputs",
        vec![
            HierarchicalTypeData::make_primitive("translation", PrimitiveType::Vec3f),
            HierarchicalTypeData::make_primitive("rotation", PrimitiveType::Vec3f),
            HierarchicalTypeData::make_primitive("scale", PrimitiveType::Vec3f),
            HierarchicalTypeData::make_primitive("visibility", PrimitiveType::Int32),
            HierarchicalTypeData::make_primitive("enabled", PrimitiveType::Bool),
        ],
    );
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    {
        let obj = external.borrow();
        seed(pool, child(pool, inputs, "translation"), obj.translation());
        seed(pool, child(pool, inputs, "rotation"), obj.rotation());
        seed(pool, child(pool, inputs, "scale"), obj.scale());
        seed(pool, child(pool, inputs, "visibility"), obj.visibility());
        seed(pool, child(pool, inputs, "enabled"), obj.enabled());
    }
    (inputs, NodeBindingState { external })
}

pub fn update_node_binding(
    state: &mut NodeBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let mut obj = state.external.borrow_mut();
    if let Some(v) = take_new_value::<Vector3<f32>>(pool, child(pool, inputs, "translation"))? {
        obj.set_translation(v);
    }
    if let Some(v) = take_new_value::<Vector3<f32>>(pool, child(pool, inputs, "rotation"))? {
        obj.set_rotation(v);
    }
    if let Some(v) = take_new_value::<Vector3<f32>>(pool, child(pool, inputs, "scale"))? {
        obj.set_scale(v);
    }
    if let Some(v) = take_new_value::<i32>(pool, child(pool, inputs, "visibility"))? {
        obj.set_visibility(v);
    }
    if let Some(v) = take_new_value::<bool>(pool, child(pool, inputs, "enabled"))? {
        obj.set_enabled(v);
    }
    let _ = name;
    Ok(())
}

// ---------------------------------------------------------------------------
// CameraBinding
// ---------------------------------------------------------------------------

/// A camera's frustum, as either a perspective or an orthographic
/// projection. Mirrors the source's `Perspective`/`Orthographic` projection
/// split rather than forcing both sets of parameters to always mean
/// something - `left`/`right`/`top`/`bottom`/`fov` are perspective-only,
/// `vertical_size` is orthographic-only, `near`/`far` apply to both.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraFrustum {
    pub is_orthographic: bool,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
    pub near: f32,
    pub far: f32,
    pub vertical_size: f32,
}

pub trait ExternalCamera {
    fn viewport_origin(&self) -> Vector2<i32>;
    fn viewport_size(&self) -> Vector2<i32>;
    fn set_viewport(&mut self, origin: Vector2<i32>, size: Vector2<i32>);
    fn frustum(&self) -> CameraFrustum;
    fn set_frustum(&mut self, frustum: CameraFrustum);
}

pub struct CameraBindingState {
    external: Rc<RefCell<dyn ExternalCamera>>,
}

impl CameraBindingState {
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalCamera>>) -> Self {
        Self { external }
    }
}

fn camera_frustum_shape() -> HierarchicalTypeData {
    HierarchicalTypeData::make_struct(
        "frustum",
        vec![
            ("isOrthographic".to_string(), PrimitiveType::Bool),
            ("left".to_string(), PrimitiveType::Float),
            ("right".to_string(), PrimitiveType::Float),
            ("top".to_string(), PrimitiveType::Float),
            ("bottom".to_string(), PrimitiveType::Float),
            ("near".to_string(), PrimitiveType::Float),
            ("far".to_string(), PrimitiveType::Float),
            ("verticalSize".to_string(), PrimitiveType::Float),
        ],
    )
}

pub fn build_camera_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalCamera>>,
) -> (Handle<PropertyImpl>, CameraBindingState) {
    let shape = HierarchicalTypeData::make_struct_of(
        "Inputs",
        vec![
            HierarchicalTypeData::make_primitive("viewportOrigin", PrimitiveType::Vec2i),
            HierarchicalTypeData::make_primitive("viewportSize", PrimitiveType::Vec2i),
            camera_frustum_shape(),
        ],
    );
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    {
        let obj = external.borrow();
        seed(pool, child(pool, inputs, "viewportOrigin"), obj.viewport_origin());
        seed(pool, child(pool, inputs, "viewportSize"), obj.viewport_size());
        let frustum_root = child(pool, inputs, "frustum");
        let f = obj.frustum();
        seed(pool, child(pool, frustum_root, "isOrthographic"), f.is_orthographic);
        seed(pool, child(pool, frustum_root, "left"), f.left);
        seed(pool, child(pool, frustum_root, "right"), f.right);
        seed(pool, child(pool, frustum_root, "top"), f.top);
        seed(pool, child(pool, frustum_root, "bottom"), f.bottom);
        seed(pool, child(pool, frustum_root, "near"), f.near);
        seed(pool, child(pool, frustum_root, "far"), f.far);
        seed(pool, child(pool, frustum_root, "verticalSize"), f.vertical_size);
    }
    (inputs, CameraBindingState { external })
}

pub fn update_camera_binding(
    state: &mut CameraBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let mut obj = state.external.borrow_mut();

    let origin_handle = child(pool, inputs, "viewportOrigin");
    let size_handle = child(pool, inputs, "viewportSize");
    let new_origin = take_new_value::<Vector2<i32>>(pool, origin_handle)?;
    let new_size = take_new_value::<Vector2<i32>>(pool, size_handle)?;
    if new_origin.is_some() || new_size.is_some() {
        let origin = new_origin.unwrap_or_else(|| obj.viewport_origin());
        let size = new_size.unwrap_or_else(|| obj.viewport_size());
        obj.set_viewport(origin, size);
    }

    let frustum_root = child(pool, inputs, "frustum");
    let fields = [
        "isOrthographic",
        "left",
        "right",
        "top",
        "bottom",
        "near",
        "far",
        "verticalSize",
    ];
    let mut any_new = false;
    for field in fields {
        let handle = child(pool, frustum_root, field);
        if pool.borrow(handle).binding_input_has_new_value {
            any_new = true;
        }
    }
    if any_new {
        let mut f = obj.frustum();
        if let Some(v) = take_new_value::<bool>(pool, child(pool, frustum_root, "isOrthographic"))? {
            f.is_orthographic = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "left"))? {
            f.left = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "right"))? {
            f.right = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "top"))? {
            f.top = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "bottom"))? {
            f.bottom = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "near"))? {
            f.near = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "far"))? {
            f.far = v;
        }
        if let Some(v) = take_new_value::<f32>(pool, child(pool, frustum_root, "verticalSize"))? {
            f.vertical_size = v;
        }
        obj.set_frustum(f);
    }
    let _ = name;
    Ok(())
}

// ---------------------------------------------------------------------------
// AppearanceBinding
// ---------------------------------------------------------------------------

/// One uniform exposed by an effect: its name and primitive type, used to
/// build the binding's input shape. The actual value storage lives on the
/// external object; the binding only mirrors it.
#[derive(Clone, Debug)]
pub struct UniformDescriptor {
    pub name: String,
    pub tag: PrimitiveType,
}

/// Dynamic (name-indexed) uniform access, since the set of exposed uniforms
/// is a property of the effect the binding is constructed against, not known
/// at compile time.
pub trait ExternalAppearance {
    fn uniform(&self, name: &str) -> crate::property::PropertyValue;
    fn set_uniform(&mut self, name: &str, value: crate::property::PropertyValue) -> LogicResult<()>;
}

pub struct AppearanceBindingState {
    external: Rc<RefCell<dyn ExternalAppearance>>,
    uniforms: Vec<String>,
}

impl AppearanceBindingState {
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalAppearance>>, uniforms: Vec<String>) -> Self {
        Self { external, uniforms }
    }
}

pub fn build_appearance_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalAppearance>>,
    uniforms: Vec<UniformDescriptor>,
) -> (Handle<PropertyImpl>, AppearanceBindingState) {
    let fields: Vec<HierarchicalTypeData> = uniforms
        .iter()
        .map(|u| HierarchicalTypeData::make_primitive(u.name.clone(), u.tag))
        .collect();
    let shape = HierarchicalTypeData::make_struct_of("Inputs", fields);
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    let names: Vec<String> = uniforms.into_iter().map(|u| u.name).collect();
    {
        let obj = external.borrow();
        for uniform_name in &names {
            let handle = child(pool, inputs, uniform_name);
            pool.borrow_mut(handle).value = obj.uniform(uniform_name);
        }
    }
    (
        inputs,
        AppearanceBindingState {
            external,
            uniforms: names,
        },
    )
}

pub fn update_appearance_binding(
    state: &mut AppearanceBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let mut obj = state.external.borrow_mut();
    for uniform_name in &state.uniforms {
        let handle = child(pool, inputs, uniform_name);
        let had_new_value = pool
            .borrow_mut(handle)
            .check_for_binding_input_new_value_and_reset();
        if had_new_value {
            let value = pool.borrow(handle).value.clone();
            obj.set_uniform(uniform_name, value).map_err(|e| {
                LogicError::runtime(format!(
                    "binding '{name}': external object rejected uniform '{uniform_name}': {e}"
                ))
            })?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RenderPassBinding
// ---------------------------------------------------------------------------

pub trait ExternalRenderPass {
    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, value: bool);
    fn render_order(&self) -> i32;
    fn set_render_order(&mut self, value: i32);
    fn clear_color(&self) -> Vector4<f32>;
    fn set_clear_color(&mut self, value: Vector4<f32>);
    fn render_once(&self) -> bool;
    fn set_render_once(&mut self, value: bool);
}

pub struct RenderPassBindingState {
    external: Rc<RefCell<dyn ExternalRenderPass>>,
}

impl RenderPassBindingState {
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalRenderPass>>) -> Self {
        Self { external }
    }
}

pub fn build_render_pass_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalRenderPass>>,
) -> (Handle<PropertyImpl>, RenderPassBindingState) {
    let shape = HierarchicalTypeData::make_struct_of(
        "Inputs",
        vec![
            HierarchicalTypeData::make_primitive("enabled", PrimitiveType::Bool),
            HierarchicalTypeData::make_primitive("renderOrder", PrimitiveType::Int32),
            HierarchicalTypeData::make_primitive("clearColor", PrimitiveType::Vec4f),
            HierarchicalTypeData::make_primitive("renderOnce", PrimitiveType::Bool),
        ],
    );
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    {
        let obj = external.borrow();
        seed(pool, child(pool, inputs, "enabled"), obj.enabled());
        seed(pool, child(pool, inputs, "renderOrder"), obj.render_order());
        seed(pool, child(pool, inputs, "clearColor"), obj.clear_color());
        seed(pool, child(pool, inputs, "renderOnce"), obj.render_once());
    }
    (inputs, RenderPassBindingState { external })
}

pub fn update_render_pass_binding(
    state: &mut RenderPassBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let mut obj = state.external.borrow_mut();
    if let Some(v) = take_new_value::<bool>(pool, child(pool, inputs, "enabled"))? {
        obj.set_enabled(v);
    }
    if let Some(v) = take_new_value::<i32>(pool, child(pool, inputs, "renderOrder"))? {
        obj.set_render_order(v);
    }
    if let Some(v) = take_new_value::<Vector4<f32>>(pool, child(pool, inputs, "clearColor"))? {
        obj.set_clear_color(v);
    }
    if let Some(v) = take_new_value::<bool>(pool, child(pool, inputs, "renderOnce"))? {
        obj.set_render_once(v);
    }
    let _ = name;
    Ok(())
}

// ---------------------------------------------------------------------------
// RenderBufferBinding
// ---------------------------------------------------------------------------

pub trait ExternalRenderBuffer {
    fn width(&self) -> i32;
    fn height(&self) -> i32;
    fn sample_count(&self) -> i32;
    /// Applies the combination atomically; the external object is free to
    /// reject a combination it can't realize (e.g. `width == 0`).
    fn set_dimensions(&mut self, width: i32, height: i32, sample_count: i32) -> Result<(), String>;
}

pub struct RenderBufferBindingState {
    external: Rc<RefCell<dyn ExternalRenderBuffer>>,
}

impl RenderBufferBindingState {
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalRenderBuffer>>) -> Self {
        Self { external }
    }
}

pub fn build_render_buffer_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalRenderBuffer>>,
) -> (Handle<PropertyImpl>, RenderBufferBindingState) {
    let shape = HierarchicalTypeData::make_struct(
        "Inputs",
        vec![
            ("width".to_string(), PrimitiveType::Int32),
            ("height".to_string(), PrimitiveType::Int32),
            ("sampleCount".to_string(), PrimitiveType::Int32),
        ],
    );
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    {
        let obj = external.borrow();
        seed(pool, child(pool, inputs, "width"), obj.width());
        seed(pool, child(pool, inputs, "height"), obj.height());
        seed(pool, child(pool, inputs, "sampleCount"), obj.sample_count());
    }
    (inputs, RenderBufferBindingState { external })
}

pub fn update_render_buffer_binding(
    state: &mut RenderBufferBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let width_handle = child(pool, inputs, "width");
    let height_handle = child(pool, inputs, "height");
    let sample_count_handle = child(pool, inputs, "sampleCount");
    let new_width = take_new_value::<i32>(pool, width_handle)?;
    let new_height = take_new_value::<i32>(pool, height_handle)?;
    let new_sample_count = take_new_value::<i32>(pool, sample_count_handle)?;
    if new_width.is_none() && new_height.is_none() && new_sample_count.is_none() {
        return Ok(());
    }

    let mut obj = state.external.borrow_mut();
    let width = new_width.unwrap_or_else(|| obj.width());
    let height = new_height.unwrap_or_else(|| obj.height());
    let sample_count = new_sample_count.unwrap_or_else(|| obj.sample_count());
    if width < 0 || height < 0 || sample_count < 0 {
        return Err(LogicError::runtime(format!(
            "binding '{name}': render buffer dimensions must be non-negative, got ({width}, {height}, {sample_count})"
        )));
    }
    obj.set_dimensions(width, height, sample_count).map_err(|e| {
        LogicError::runtime(format!(
            "binding '{name}': external object rejected render buffer dimensions ({width}, {height}, {sample_count}): {e}"
        ))
    })
}

// ---------------------------------------------------------------------------
// MeshNodeBinding
// ---------------------------------------------------------------------------

pub trait ExternalMeshNode {
    fn set_vertex_offset(&mut self, value: i32);
    fn set_index_offset(&mut self, value: i32);
    fn set_index_count(&mut self, value: i32);
    fn set_instance_count(&mut self, value: i32);
}

pub struct MeshNodeBindingState {
    external: Rc<RefCell<dyn ExternalMeshNode>>,
}

impl MeshNodeBindingState {
    pub(crate) fn from_external(external: Rc<RefCell<dyn ExternalMeshNode>>) -> Self {
        Self { external }
    }
}

/// `indexCount` defaults to `-1` ("not set") rather than `0`: per spec, if it
/// is never set by the host (or by load), the mesh's own externally
/// computed index count must not be overwritten. `-1` is never a legal
/// applied value (all four fields must be `>= 0`), so it can't collide with
/// a real write.
const INDEX_COUNT_UNSET: i32 = -1;

pub fn build_mesh_node_binding(
    pool: &mut Pool<PropertyImpl>,
    external: Rc<RefCell<dyn ExternalMeshNode>>,
) -> (Handle<PropertyImpl>, MeshNodeBindingState) {
    let shape = HierarchicalTypeData::make_struct(
        "Inputs",
        vec![
            ("vertexOffset".to_string(), PrimitiveType::Int32),
            ("indexOffset".to_string(), PrimitiveType::Int32),
            ("indexCount".to_string(), PrimitiveType::Int32),
            ("instanceCount".to_string(), PrimitiveType::Int32),
        ],
    );
    let inputs = crate::property::build_property_tree(pool, &shape, PropertySemantics::BindingInput);
    seed(pool, child(pool, inputs, "vertexOffset"), 0i32);
    seed(pool, child(pool, inputs, "indexOffset"), 0i32);
    seed(pool, child(pool, inputs, "indexCount"), INDEX_COUNT_UNSET);
    seed(pool, child(pool, inputs, "instanceCount"), 1i32);
    (inputs, MeshNodeBindingState { external })
}

pub fn update_mesh_node_binding(
    state: &mut MeshNodeBindingState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    name: &str,
) -> LogicResult<()> {
    let mut values = Vec::with_capacity(4);
    for field in ["vertexOffset", "indexOffset", "indexCount", "instanceCount"] {
        let handle = child(pool, inputs, field);
        if let Some(v) = take_new_value::<i32>(pool, handle)? {
            values.push((field, v));
        }
    }
    if values.is_empty() {
        return Ok(());
    }
    for (field, value) in &values {
        if *field != "indexCount" && *value < 0 {
            return Err(LogicError::runtime(format!(
                "binding '{name}': '{field}' must be non-negative, got {value}"
            )));
        }
    }
    let mut obj = state.external.borrow_mut();
    for (field, value) in values {
        match field {
            "vertexOffset" => obj.set_vertex_offset(value),
            "indexOffset" => obj.set_index_offset(value),
            "indexCount" => {
                if value >= 0 {
                    obj.set_index_count(value);
                }
            }
            "instanceCount" => obj.set_instance_count(value),
            _ => unreachable!(),
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// TimerNode
// ---------------------------------------------------------------------------

/// A source of monotonic time, injectable so tests don't depend on the
/// wall clock.
pub trait Clock {
    fn now_micros(&self) -> i64;
}

/// The default clock, backed by [`std::time::SystemTime`].
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0)
    }
}

pub struct TimerState {
    clock: Box<dyn Clock>,
}

impl TimerState {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self { clock }
    }
}

pub fn build_timer(
    pool: &mut Pool<PropertyImpl>,
    clock: Box<dyn Clock>,
) -> (Handle<PropertyImpl>, Handle<PropertyImpl>, TimerState) {
    let input_shape = HierarchicalTypeData::make_struct(
        "Inputs",
        vec![("ticker_us".to_string(), PrimitiveType::Int64)],
    );
    let output_shape =
        HierarchicalTypeData::make_struct("Outputs", vec![("value".to_string(), PrimitiveType::Int64)]);
    let inputs = crate::property::build_property_tree(pool, &input_shape, PropertySemantics::ScriptInput);
    let outputs =
        crate::property::build_property_tree(pool, &output_shape, PropertySemantics::ScriptOutput);
    (inputs, outputs, TimerState::new(clock))
}

/// `ticker_us == 0` samples the clock; any other value passes straight
/// through, letting a host drive the timer deterministically (e.g. replaying
/// a recorded session) without touching the wall clock.
pub fn update_timer(
    state: &mut TimerState,
    pool: &mut Pool<PropertyImpl>,
    inputs: Handle<PropertyImpl>,
    outputs: Handle<PropertyImpl>,
) -> LogicResult<()> {
    let ticker_us = get_value::<i64>(pool, child(pool, inputs, "ticker_us"))?;
    let value = if ticker_us == 0 {
        state.clock.now_micros()
    } else {
        ticker_us
    };
    set_value(pool, child(pool, outputs, "value"), value)
}

#[cfg(test)]
mod test {
    use super::*;

    struct FakeSceneNode {
        translation: Vector3<f32>,
        rotation: Vector3<f32>,
        scale: Vector3<f32>,
        visibility: i32,
        enabled: bool,
    }

    impl ExternalSceneNode for FakeSceneNode {
        fn translation(&self) -> Vector3<f32> {
            self.translation
        }
        fn set_translation(&mut self, value: Vector3<f32>) {
            self.translation = value;
        }
        fn rotation(&self) -> Vector3<f32> {
            self.rotation
        }
        fn set_rotation(&mut self, value: Vector3<f32>) {
            self.rotation = value;
        }
        fn scale(&self) -> Vector3<f32> {
            self.scale
        }
        fn set_scale(&mut self, value: Vector3<f32>) {
            self.scale = value;
        }
        fn visibility(&self) -> i32 {
            self.visibility
        }
        fn set_visibility(&mut self, value: i32) {
            self.visibility = value;
        }
        fn enabled(&self) -> bool {
            self.enabled
        }
        fn set_enabled(&mut self, value: bool) {
            self.enabled = value;
        }
    }

    #[test]
    fn first_update_after_construction_is_a_no_op() {
        let mut pool = Pool::new();
        let external = Rc::new(RefCell::new(FakeSceneNode {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            visibility: 1,
            enabled: true,
        }));
        let (inputs, mut state) = build_node_binding(&mut pool, external.clone());
        update_node_binding(&mut state, &mut pool, inputs, "node").unwrap();
        assert_eq!(external.borrow().translation, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn binding_idempotence_applies_once_then_no_op() {
        let mut pool = Pool::new();
        let external = Rc::new(RefCell::new(FakeSceneNode {
            translation: Vector3::zeros(),
            rotation: Vector3::zeros(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            visibility: 1,
            enabled: true,
        }));
        let (inputs, mut state) = build_node_binding(&mut pool, external.clone());
        let translation_handle = child(&pool, inputs, "translation");
        set_value(&mut pool, translation_handle, Vector3::new(5.0, 0.0, 0.0)).unwrap();

        update_node_binding(&mut state, &mut pool, inputs, "node").unwrap();
        assert_eq!(external.borrow().translation, Vector3::new(5.0, 0.0, 0.0));

        external.borrow_mut().translation = Vector3::zeros();
        update_node_binding(&mut state, &mut pool, inputs, "node").unwrap();
        assert_eq!(external.borrow().translation, Vector3::zeros());
    }

    struct FixedClock(i64);
    impl Clock for FixedClock {
        fn now_micros(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn timer_samples_clock_only_when_ticker_is_zero() {
        let mut pool = Pool::new();
        let (inputs, outputs, mut state) = build_timer(&mut pool, Box::new(FixedClock(42)));
        update_timer(&mut state, &mut pool, inputs, outputs).unwrap();
        assert_eq!(get_value::<i64>(&pool, child(&pool, outputs, "value")).unwrap(), 42);

        set_value(&mut pool, child(&pool, inputs, "ticker_us"), 1000i64).unwrap();
        update_timer(&mut state, &mut pool, inputs, outputs).unwrap();
        assert_eq!(get_value::<i64>(&pool, child(&pool, outputs, "value")).unwrap(), 1000);
    }

    #[test]
    fn mesh_node_binding_never_overwrites_index_count_until_set() {
        struct FakeMesh {
            index_count: i32,
        }
        impl ExternalMeshNode for FakeMesh {
            fn set_vertex_offset(&mut self, _value: i32) {}
            fn set_index_offset(&mut self, _value: i32) {}
            fn set_index_count(&mut self, value: i32) {
                self.index_count = value;
            }
            fn set_instance_count(&mut self, _value: i32) {}
        }

        let mut pool = Pool::new();
        let external = Rc::new(RefCell::new(FakeMesh { index_count: 99 }));
        let (inputs, mut state) = build_mesh_node_binding(&mut pool, external.clone());
        update_mesh_node_binding(&mut state, &mut pool, inputs, "mesh").unwrap();
        assert_eq!(external.borrow().index_count, 99);

        set_value(&mut pool, child(&pool, inputs, "indexCount"), 10i32).unwrap();
        update_mesh_node_binding(&mut state, &mut pool, inputs, "mesh").unwrap();
        assert_eq!(external.borrow().index_count, 10);
    }
}
