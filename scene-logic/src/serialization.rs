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

//! Binary save/load for a whole [`Engine`]. A save walks every node into one
//! of a handful of flat, `Visit`-able records (a header plus whatever is
//! specific to that node kind); a load rebuilds each node through the same
//! construction path `create_*` uses and then overwrites the freshly built
//! property tree with the one that was saved, so a loaded node ends up
//! indistinguishable from one built fresh and then fed the same values.
//!
//! Bindings and timers have no durable value of their own beyond their
//! inputs (and, for timers, outputs) - the external scene object a binding
//! wraps is never serialized, only a `(name, objectId, objectType)` reference
//! to it, which [`Resolver`] turns back into a live handle at load time.

use crate::animation::{AnimationChannel, AnimationState};
use crate::bindings::{
    AppearanceBindingState, CameraBindingState, ExternalAppearance, ExternalCamera,
    ExternalMeshNode, ExternalRenderBuffer, ExternalRenderPass, ExternalSceneNode,
    MeshNodeBindingState, NodeBindingState, RenderBufferBindingState, RenderPassBindingState,
    SystemClock, TimerState,
};
use crate::data_array::DataArray;
use crate::engine::Engine;
use crate::error::{LogicError, LogicResult};
use crate::ids::{DataArrayId, NodeId};
use crate::node::{LogicNode, LogicNodeCommon, NodeKind};
use crate::property::{
    from_property_tree, path_of, to_property_tree, PropertyTree,
};
use crate::type_data::{HierarchicalTypeData, PrimitiveType};
use fxhash::FxHashMap;
use scene_logic_core::log::Log;
use scene_logic_core::pool::Pool;
use scene_logic_core::visitor::{Visit, VisitResult, Visitor};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

/// The schema version this build of the crate writes and fully understands.
/// A file written at a higher level is rejected outright rather than risk
/// silently dropping data the writer considered load-bearing.
pub const CURRENT_FEATURE_LEVEL: u32 = 1;

/// Tunables for [`Engine::save_to_file`].
#[derive(Clone, Copy, Debug)]
pub struct SaveConfig {
    pub feature_level: u32,
    /// Collapse `DataArray`s with byte-identical content into a single
    /// stored copy, remapping every `AnimationChannel` id that referenced a
    /// duplicate. Mirrors the script-bytecode dedup the source this crate is
    /// modeled on applies on save; here the payload being deduplicated is
    /// animation source data instead of compiled scripts.
    pub dedup_data_arrays: bool,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            feature_level: CURRENT_FEATURE_LEVEL,
            dedup_data_arrays: true,
        }
    }
}

/// Tunables for [`Engine::load_from_file`].
pub struct LoadConfig<'a> {
    pub resolver: &'a dyn Resolver,
}

/// Which kind of external scene object a binding's saved reference names.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExternalObjectKind {
    SceneNode,
    Camera,
    Appearance,
    RenderPass,
    RenderBuffer,
    MeshNode,
}

impl ExternalObjectKind {
    fn to_tag(self) -> u8 {
        match self {
            ExternalObjectKind::SceneNode => 0,
            ExternalObjectKind::Camera => 1,
            ExternalObjectKind::Appearance => 2,
            ExternalObjectKind::RenderPass => 3,
            ExternalObjectKind::RenderBuffer => 4,
            ExternalObjectKind::MeshNode => 5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => ExternalObjectKind::SceneNode,
            1 => ExternalObjectKind::Camera,
            2 => ExternalObjectKind::Appearance,
            3 => ExternalObjectKind::RenderPass,
            4 => ExternalObjectKind::RenderBuffer,
            5 => ExternalObjectKind::MeshNode,
            _ => return None,
        })
    }
}

impl Default for ExternalObjectKind {
    fn default() -> Self {
        ExternalObjectKind::SceneNode
    }
}

impl Visit for ExternalObjectKind {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut tag = self.to_tag();
        tag.visit(name, visitor)?;
        if visitor.is_reading() {
            *self = ExternalObjectKind::from_tag(tag)
                .ok_or(scene_logic_core::visitor::VisitError::NotSupportedFormat)?;
        }
        Ok(())
    }
}

/// Re-binds a saved `(name, objectId)` reference to the live external object
/// it named when the file was written. The host owns the actual scene graph,
/// so only it can answer this; a resolver that can't find an object should
/// return a [`LogicError::resource`] rather than panic.
pub trait Resolver {
    fn resolve_scene_node(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalSceneNode>>>;
    fn resolve_camera(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalCamera>>>;
    fn resolve_appearance(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalAppearance>>>;
    fn resolve_render_pass(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderPass>>>;
    fn resolve_render_buffer(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderBuffer>>>;
    fn resolve_mesh_node(&self, name: &str, object_id: u64) -> LogicResult<Rc<RefCell<dyn ExternalMeshNode>>>;
}

// ---------------------------------------------------------------------------
// On-disk records
// ---------------------------------------------------------------------------

/// `{ name, id, userIdHigh, userIdLow }`, common to every saved object.
#[derive(Clone, Debug, Default)]
struct ObjectHeader {
    name: String,
    id: NodeId,
    user_id_high: u64,
    user_id_low: u64,
}

impl Visit for ObjectHeader {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.name.visit("Name", &mut region)?;
        self.id.visit("Id", &mut region)?;
        self.user_id_high.visit("UserIdHigh", &mut region)?;
        self.user_id_low.visit("UserIdLow", &mut region)?;
        Ok(())
    }
}

impl ObjectHeader {
    fn of(node: &LogicNode) -> Self {
        Self {
            name: node.common.name.clone(),
            id: node.common.id,
            user_id_high: node.common.user_id.0,
            user_id_low: node.common.user_id.1,
        }
    }

    fn into_common(self) -> LogicNodeCommon {
        LogicNodeCommon {
            name: self.name,
            id: self.id,
            user_id: (self.user_id_high, self.user_id_low),
            // Every node, loaded or newly created, must run at least once.
            dirty: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct SerializedAnimationNode {
    header: ObjectHeader,
    channels: Vec<AnimationChannel>,
    expose_data_as_properties: bool,
    inputs: PropertyTree,
    outputs: PropertyTree,
}

impl Visit for SerializedAnimationNode {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.header.visit("Header", &mut region)?;
        self.channels.visit("Channels", &mut region)?;
        self.expose_data_as_properties
            .visit("ExposeDataAsProperties", &mut region)?;
        self.inputs.visit("Inputs", &mut region)?;
        self.outputs.visit("Outputs", &mut region)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct SerializedTimerNode {
    header: ObjectHeader,
    inputs: PropertyTree,
    outputs: PropertyTree,
}

impl Visit for SerializedTimerNode {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.header.visit("Header", &mut region)?;
        self.inputs.visit("Inputs", &mut region)?;
        self.outputs.visit("Outputs", &mut region)?;
        Ok(())
    }
}

/// Shared shape for all six binding kinds: a header, a reference to the
/// external object the binding mirrors, and its saved input tree. The
/// reference is resolved back to a live object by [`Resolver`] at load time.
#[derive(Clone, Debug, Default)]
struct SerializedBinding {
    header: ObjectHeader,
    object_id: u64,
    object_kind: ExternalObjectKind,
    inputs: PropertyTree,
}

impl Visit for SerializedBinding {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.header.visit("Header", &mut region)?;
        self.object_id.visit("ObjectId", &mut region)?;
        self.object_kind.visit("ObjectKind", &mut region)?;
        self.inputs.visit("Inputs", &mut region)?;
        Ok(())
    }
}

/// `{ sourceNodeId, sourcePath, targetNodeId, targetPath, isWeak }`.
#[derive(Clone, Debug, Default)]
struct SerializedLink {
    source_node_id: NodeId,
    source_path: crate::property::PropertyPath,
    target_node_id: NodeId,
    target_path: crate::property::PropertyPath,
    is_weak: bool,
}

impl Visit for SerializedLink {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.source_node_id.visit("SourceNodeId", &mut region)?;
        self.source_path.visit("SourcePath", &mut region)?;
        self.target_node_id.visit("TargetNodeId", &mut region)?;
        self.target_path.visit("TargetPath", &mut region)?;
        self.is_weak.visit("IsWeak", &mut region)?;
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct SceneFile {
    data_arrays: Vec<DataArray>,
    animation_nodes: Vec<SerializedAnimationNode>,
    timer_nodes: Vec<SerializedTimerNode>,
    node_bindings: Vec<SerializedBinding>,
    camera_bindings: Vec<SerializedBinding>,
    appearance_bindings: Vec<SerializedBinding>,
    render_pass_bindings: Vec<SerializedBinding>,
    render_buffer_bindings: Vec<SerializedBinding>,
    mesh_node_bindings: Vec<SerializedBinding>,
    links: Vec<SerializedLink>,
}

impl Visit for SceneFile {
    fn visit(&mut self, name: &str, visitor: &mut Visitor) -> VisitResult {
        let mut region = visitor.enter_region(name)?;
        self.data_arrays.visit("DataArrays", &mut region)?;
        self.animation_nodes.visit("AnimationNodes", &mut region)?;
        self.timer_nodes.visit("TimerNodes", &mut region)?;
        self.node_bindings.visit("NodeBindings", &mut region)?;
        self.camera_bindings.visit("CameraBindings", &mut region)?;
        self.appearance_bindings.visit("AppearanceBindings", &mut region)?;
        self.render_pass_bindings.visit("RenderPassBindings", &mut region)?;
        self.render_buffer_bindings.visit("RenderBufferBindings", &mut region)?;
        self.mesh_node_bindings.visit("MeshNodeBindings", &mut region)?;
        self.links.visit("Links", &mut region)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Collapses byte-identical `DataArray`s into one surviving copy (keeping the
/// lowest id among duplicates for determinism) and returns the surviving set
/// plus a map from every original id to the id it should be referenced by.
fn dedup_data_arrays(
    data_arrays: &FxHashMap<DataArrayId, DataArray>,
    dedup: bool,
) -> LogicResult<(Vec<DataArray>, FxHashMap<DataArrayId, DataArrayId>)> {
    let mut sorted: Vec<&DataArray> = data_arrays.values().collect();
    sorted.sort_by_key(|a| a.id);

    if !dedup {
        let id_map = sorted.iter().map(|a| (a.id, a.id)).collect();
        return Ok((sorted.into_iter().cloned().collect(), id_map));
    }

    let mut by_bytes: FxHashMap<Vec<u8>, DataArrayId> = FxHashMap::default();
    let mut kept = Vec::new();
    let mut id_map = FxHashMap::default();
    for array in sorted {
        let mut content = array.content.clone();
        let bytes = Visitor::save_binary(&mut content, 1)
            .map_err(|e| LogicError::runtime(format!("failed to hash DataArray '{}': {e}", array.name)))?;
        match by_bytes.get(&bytes) {
            Some(&kept_id) => {
                id_map.insert(array.id, kept_id);
            }
            None => {
                by_bytes.insert(bytes, array.id);
                id_map.insert(array.id, array.id);
                kept.push(array.clone());
            }
        }
    }
    Ok((kept, id_map))
}

fn remap_channel(channel: &AnimationChannel, id_map: &FxHashMap<DataArrayId, DataArrayId>) -> AnimationChannel {
    let remap = |id: DataArrayId| *id_map.get(&id).unwrap_or(&id);
    AnimationChannel {
        name: channel.name.clone(),
        timestamps_id: remap(channel.timestamps_id),
        keyframes_id: remap(channel.keyframes_id),
        interpolation: channel.interpolation,
        tangents_in_id: channel.tangents_in_id.map(remap),
        tangents_out_id: channel.tangents_out_id.map(remap),
    }
}

/// Every output leaf's outgoing links, flattened into `Links` entries. Only
/// outputs are walked - a link always runs output-to-input, so every link in
/// the engine shows up exactly once this way.
fn collect_links(engine: &Engine) -> Vec<SerializedLink> {
    let mut links = Vec::new();
    let mut node_ids: Vec<NodeId> = engine.nodes().map(|(&id, _)| id).collect();
    node_ids.sort_unstable();
    for node_id in node_ids {
        let node = engine.node(node_id).expect("id just listed by nodes()");
        for &out_handle in node.output_leaves().iter() {
            let prop = node.properties.borrow(out_handle);
            for link in &prop.outgoing_links {
                let target_node = engine
                    .node(link.other.node)
                    .expect("link target must still exist while the source does");
                links.push(SerializedLink {
                    source_node_id: node_id,
                    source_path: path_of(&node.properties, out_handle),
                    target_node_id: link.other.node,
                    target_path: path_of(&target_node.properties, link.other.handle),
                    is_weak: link.is_weak,
                });
            }
        }
    }
    links
}

fn build_scene_file(engine: &Engine, config: &SaveConfig) -> LogicResult<SceneFile> {
    let (data_arrays, id_map) = dedup_data_arrays(engine.data_arrays(), config.dedup_data_arrays)?;

    let mut file = SceneFile {
        data_arrays,
        links: collect_links(engine),
        ..SceneFile::default()
    };

    let mut node_ids: Vec<NodeId> = engine.nodes().map(|(&id, _)| id).collect();
    node_ids.sort_unstable();
    for node_id in node_ids {
        let node = engine.node(node_id).expect("id just listed by nodes()");
        let header = ObjectHeader::of(node);
        match &node.kind {
            NodeKind::Animation(state) => {
                file.animation_nodes.push(SerializedAnimationNode {
                    header,
                    channels: state.channels.iter().map(|c| remap_channel(c, &id_map)).collect(),
                    expose_data_as_properties: state.expose_data_as_properties,
                    inputs: to_property_tree(&node.properties, node.inputs.expect("animation node has inputs")),
                    outputs: to_property_tree(&node.properties, node.outputs.expect("animation node has outputs")),
                });
            }
            NodeKind::Timer(_) => {
                file.timer_nodes.push(SerializedTimerNode {
                    header,
                    inputs: to_property_tree(&node.properties, node.inputs.expect("timer has inputs")),
                    outputs: to_property_tree(&node.properties, node.outputs.expect("timer has outputs")),
                });
            }
            NodeKind::NodeBinding(_) => file.node_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::SceneNode,
            )),
            NodeKind::CameraBinding(_) => file.camera_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::Camera,
            )),
            NodeKind::AppearanceBinding(_) => file.appearance_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::Appearance,
            )),
            NodeKind::RenderPassBinding(_) => file.render_pass_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::RenderPass,
            )),
            NodeKind::RenderBufferBinding(_) => file.render_buffer_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::RenderBuffer,
            )),
            NodeKind::MeshNodeBinding(_) => file.mesh_node_bindings.push(binding_record(
                node,
                header,
                0,
                ExternalObjectKind::MeshNode,
            )),
        }
    }

    Ok(file)
}

/// Builds a binding's saved record. `object_id` is always `0`: this crate has
/// no notion of a stable numeric id for the host's scene objects, only the
/// node's own name, which [`Resolver`] is free to use as the lookup key
/// instead. Kept as an explicit field (rather than dropped) because the
/// format this mirrors addresses external objects by id, and a host that
/// does assign stable ids to its scene objects can populate it by
/// overriding the binding's name-based resolution with id-aware logic in
/// its own `Resolver` implementation.
fn binding_record(
    node: &LogicNode,
    header: ObjectHeader,
    object_id: u64,
    object_kind: ExternalObjectKind,
) -> SerializedBinding {
    SerializedBinding {
        header,
        object_id,
        object_kind,
        inputs: to_property_tree(&node.properties, node.inputs.expect("binding has inputs")),
    }
}

/// Serializes `engine` and writes the result to `path`.
pub fn save_to_file(engine: &Engine, path: impl AsRef<Path>, config: &SaveConfig) -> LogicResult<()> {
    let bytes = save_to_bytes(engine, config)?;
    std::fs::write(path, bytes).map_err(|e| LogicError::runtime(format!("failed to write scene file: {e}")))
}

/// Serializes `engine` to a byte buffer without touching the filesystem.
pub fn save_to_bytes(engine: &Engine, config: &SaveConfig) -> LogicResult<Vec<u8>> {
    let mut file = build_scene_file(engine, config)?;
    Visitor::save_binary(&mut file, config.feature_level)
        .map_err(|e| LogicError::runtime(format!("failed to serialize engine: {e}")))
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn tree_matches_shape(tree: &PropertyTree, shape: &HierarchicalTypeData) -> bool {
    if tree.name != shape.type_data.name || tree.type_tag != shape.type_data.type_tag {
        return false;
    }
    match shape.type_data.type_tag {
        PrimitiveType::Struct => {
            tree.children.len() == shape.children.len()
                && shape.children.iter().all(|child_shape| {
                    tree.children
                        .iter()
                        .find(|c| c.name == child_shape.type_data.name)
                        .is_some_and(|c| tree_matches_shape(c, child_shape))
                })
        }
        PrimitiveType::Array => {
            tree.children.len() == shape.children.len()
                && tree
                    .children
                    .iter()
                    .zip(&shape.children)
                    .all(|(c, s)| c.type_tag == s.type_data.type_tag)
        }
        _ => true,
    }
}

fn require_fields(tree: &PropertyTree, fields: &[&str], owner: &str) -> LogicResult<()> {
    for field in fields {
        if !tree.children.iter().any(|c| &c.name == field) {
            return Err(LogicError::binary_version_mismatch(format!(
                "binding '{owner}': saved inputs are missing field '{field}'"
            )));
        }
    }
    Ok(())
}

fn require_object_kind(
    serialized: &SerializedBinding,
    expected: ExternalObjectKind,
) -> LogicResult<()> {
    if serialized.object_kind != expected {
        return Err(LogicError::binary_version_mismatch(format!(
            "binding '{}': expected a {expected:?} object reference, found {:?}",
            serialized.header.name, serialized.object_kind
        )));
    }
    Ok(())
}

fn load_animation_node(
    serialized: SerializedAnimationNode,
    data_arrays: &FxHashMap<DataArrayId, DataArray>,
) -> LogicResult<LogicNode> {
    let name = serialized.header.name.clone();
    let state = AnimationState::new(serialized.channels, serialized.expose_data_as_properties, data_arrays, &name)?;

    if !tree_matches_shape(&serialized.inputs, &state.input_shape()) {
        return Err(LogicError::binary_version_mismatch(format!(
            "animation node '{name}': saved input properties don't match its channel layout"
        )));
    }
    if !tree_matches_shape(&serialized.outputs, &state.output_shape()) {
        return Err(LogicError::binary_version_mismatch(format!(
            "animation node '{name}': saved output properties don't match its channel layout"
        )));
    }

    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    let outputs = from_property_tree(&mut properties, &serialized.outputs);

    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: Some(outputs),
        kind: NodeKind::Animation(state),
    })
}

fn load_timer_node(serialized: SerializedTimerNode) -> LogicResult<LogicNode> {
    require_fields(&serialized.inputs, &["ticker_us"], &serialized.header.name)?;
    require_fields(&serialized.outputs, &["value"], &serialized.header.name)?;

    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    let outputs = from_property_tree(&mut properties, &serialized.outputs);

    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: Some(outputs),
        kind: NodeKind::Timer(TimerState::new(Box::new(SystemClock))),
    })
}

fn load_node_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::SceneNode)?;
    let name = serialized.header.name.clone();
    require_fields(
        &serialized.inputs,
        &["translation", "rotation", "scale", "visibility", "enabled"],
        &name,
    )?;
    let external = resolver.resolve_scene_node(&name, serialized.object_id)?;
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::NodeBinding(NodeBindingState::from_external(external)),
    })
}

fn load_camera_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::Camera)?;
    let name = serialized.header.name.clone();
    require_fields(&serialized.inputs, &["viewportOrigin", "viewportSize", "frustum"], &name)?;
    let external = resolver.resolve_camera(&name, serialized.object_id)?;
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::CameraBinding(CameraBindingState::from_external(external)),
    })
}

fn load_appearance_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::Appearance)?;
    let name = serialized.header.name.clone();
    let external = resolver.resolve_appearance(&name, serialized.object_id)?;
    let uniforms: Vec<String> = serialized.inputs.children.iter().map(|c| c.name.clone()).collect();
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::AppearanceBinding(AppearanceBindingState::from_external(external, uniforms)),
    })
}

fn load_render_pass_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::RenderPass)?;
    let name = serialized.header.name.clone();
    require_fields(&serialized.inputs, &["enabled", "renderOrder", "clearColor", "renderOnce"], &name)?;
    let external = resolver.resolve_render_pass(&name, serialized.object_id)?;
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::RenderPassBinding(RenderPassBindingState::from_external(external)),
    })
}

fn load_render_buffer_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::RenderBuffer)?;
    let name = serialized.header.name.clone();
    require_fields(&serialized.inputs, &["width", "height", "sampleCount"], &name)?;
    let external = resolver.resolve_render_buffer(&name, serialized.object_id)?;
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::RenderBufferBinding(RenderBufferBindingState::from_external(external)),
    })
}

fn load_mesh_node_binding(serialized: SerializedBinding, resolver: &dyn Resolver) -> LogicResult<LogicNode> {
    require_object_kind(&serialized, ExternalObjectKind::MeshNode)?;
    let name = serialized.header.name.clone();
    require_fields(
        &serialized.inputs,
        &["vertexOffset", "indexOffset", "indexCount", "instanceCount"],
        &name,
    )?;
    let external = resolver.resolve_mesh_node(&name, serialized.object_id)?;
    let mut properties = Pool::new();
    let inputs = from_property_tree(&mut properties, &serialized.inputs);
    Ok(LogicNode {
        common: serialized.header.into_common(),
        properties,
        inputs: Some(inputs),
        outputs: None,
        kind: NodeKind::MeshNodeBinding(MeshNodeBindingState::from_external(external)),
    })
}

fn restore_links(engine: &mut Engine, links: Vec<SerializedLink>) -> LogicResult<()> {
    for link in links {
        let out = engine.resolve_output(link.source_node_id, &link.source_path).ok_or_else(|| {
            LogicError::binary_version_mismatch(format!(
                "link source (node {}) has no property at the saved path",
                link.source_node_id
            ))
        })?;
        let input = engine.resolve_input(link.target_node_id, &link.target_path).ok_or_else(|| {
            LogicError::binary_version_mismatch(format!(
                "link target (node {}) has no property at the saved path",
                link.target_node_id
            ))
        })?;
        let result = if link.is_weak {
            engine.link_weak(out, input)
        } else {
            engine.link(out, input)
        };
        result.map_err(|e| LogicError::binary_version_mismatch(format!("failed to restore link: {e}")))?;
    }
    Ok(())
}

/// Parses a buffer produced by [`save_to_bytes`] into a fresh [`Engine`].
pub fn load_from_bytes(bytes: &[u8], config: &LoadConfig) -> LogicResult<Engine> {
    let mut file = SceneFile::default();
    let feature_level = Visitor::load_binary(bytes, &mut file)
        .map_err(|e| LogicError::binary_version_mismatch(format!("failed to parse scene file: {e}")))?;
    if feature_level > CURRENT_FEATURE_LEVEL {
        return Err(LogicError::binary_version_mismatch(format!(
            "file was written at feature level {feature_level}, this build only understands up to {CURRENT_FEATURE_LEVEL}"
        )));
    }
    if feature_level < CURRENT_FEATURE_LEVEL {
        Log::info(format!(
            "loading a scene file written at feature level {feature_level}; missing fields will take their defaults (current level is {CURRENT_FEATURE_LEVEL})"
        ));
    }

    let mut engine = Engine::new();
    for array in file.data_arrays {
        engine.load_insert_data_array(array);
    }
    let data_arrays = engine.data_arrays().clone();

    for anim in file.animation_nodes {
        engine.load_insert_node(load_animation_node(anim, &data_arrays)?);
    }
    for timer in file.timer_nodes {
        engine.load_insert_node(load_timer_node(timer)?);
    }
    for binding in file.node_bindings {
        engine.load_insert_node(load_node_binding(binding, config.resolver)?);
    }
    for binding in file.camera_bindings {
        engine.load_insert_node(load_camera_binding(binding, config.resolver)?);
    }
    for binding in file.appearance_bindings {
        engine.load_insert_node(load_appearance_binding(binding, config.resolver)?);
    }
    for binding in file.render_pass_bindings {
        engine.load_insert_node(load_render_pass_binding(binding, config.resolver)?);
    }
    for binding in file.render_buffer_bindings {
        engine.load_insert_node(load_render_buffer_binding(binding, config.resolver)?);
    }
    for binding in file.mesh_node_bindings {
        engine.load_insert_node(load_mesh_node_binding(binding, config.resolver)?);
    }

    restore_links(&mut engine, file.links)?;

    Ok(engine)
}

/// Reads `path` and parses it into a fresh [`Engine`].
pub fn load_from_file(path: impl AsRef<Path>, config: &LoadConfig) -> LogicResult<Engine> {
    let bytes =
        std::fs::read(path).map_err(|e| LogicError::runtime(format!("failed to read scene file: {e}")))?;
    load_from_bytes(&bytes, config)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::animation::Interpolation;
    use crate::bindings::CameraFrustum;
    use crate::data_array::DataArrayContent;
    use crate::property::{PathSegment, PropertyPath};
    use nalgebra::{Vector2, Vector3, Vector4};

    struct NoopResolver;
    impl Resolver for NoopResolver {
        fn resolve_scene_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalSceneNode>>> {
            Err(LogicError::resource("no scene nodes registered"))
        }
        fn resolve_camera(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalCamera>>> {
            Err(LogicError::resource("no cameras registered"))
        }
        fn resolve_appearance(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalAppearance>>> {
            Err(LogicError::resource("no appearances registered"))
        }
        fn resolve_render_pass(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderPass>>> {
            Err(LogicError::resource("no render passes registered"))
        }
        fn resolve_render_buffer(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderBuffer>>> {
            Err(LogicError::resource("no render buffers registered"))
        }
        fn resolve_mesh_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalMeshNode>>> {
            Err(LogicError::resource("no mesh nodes registered"))
        }
    }

    struct FakeSceneNode {
        translation: Vector3<f32>,
    }
    impl ExternalSceneNode for FakeSceneNode {
        fn translation(&self) -> Vector3<f32> {
            self.translation
        }
        fn set_translation(&mut self, value: Vector3<f32>) {
            self.translation = value;
        }
        fn rotation(&self) -> Vector3<f32> {
            Vector3::zeros()
        }
        fn set_rotation(&mut self, _value: Vector3<f32>) {}
        fn scale(&self) -> Vector3<f32> {
            Vector3::new(1.0, 1.0, 1.0)
        }
        fn set_scale(&mut self, _value: Vector3<f32>) {}
        fn visibility(&self) -> i32 {
            1
        }
        fn set_visibility(&mut self, _value: i32) {}
        fn enabled(&self) -> bool {
            true
        }
        fn set_enabled(&mut self, _value: bool) {}
    }

    struct OneSceneNodeResolver(Rc<RefCell<FakeSceneNode>>);
    impl Resolver for OneSceneNodeResolver {
        fn resolve_scene_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalSceneNode>>> {
            Ok(self.0.clone())
        }
        fn resolve_camera(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalCamera>>> {
            Err(LogicError::resource("not used in this test"))
        }
        fn resolve_appearance(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalAppearance>>> {
            Err(LogicError::resource("not used in this test"))
        }
        fn resolve_render_pass(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderPass>>> {
            Err(LogicError::resource("not used in this test"))
        }
        fn resolve_render_buffer(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderBuffer>>> {
            Err(LogicError::resource("not used in this test"))
        }
        fn resolve_mesh_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalMeshNode>>> {
            Err(LogicError::resource("not used in this test"))
        }
    }

    fn linear_channel(engine: &mut Engine, name: &str) -> AnimationChannel {
        let ts = engine.create_data_array("ts", DataArrayContent::Float(vec![0.0, 1.0]));
        let kf = engine.create_data_array("kf", DataArrayContent::Float(vec![0.0, 1.0]));
        AnimationChannel {
            name: name.to_string(),
            timestamps_id: ts,
            keyframes_id: kf,
            interpolation: Interpolation::Linear,
            tangents_in_id: None,
            tangents_out_id: None,
        }
    }

    #[test]
    fn round_trip_preserves_animation_progress_and_links() {
        let mut engine = Engine::new();
        let source_channel = linear_channel(&mut engine, "a");
        let source = engine.create_animation_node("source", vec![source_channel], false).unwrap();
        let sink_channel = linear_channel(&mut engine, "b");
        let sink = engine.create_animation_node("sink", vec![sink_channel], false).unwrap();

        let source_progress = engine
            .resolve_input(source, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.set_property(source_progress, 0.75f32).unwrap();
        let out_a = engine
            .resolve_output(source, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let sink_progress = engine
            .resolve_input(sink, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link(out_a, sink_progress).unwrap();
        engine.update().unwrap();

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &NoopResolver }).unwrap();

        let loaded_source = loaded.find_node_by_name("source").unwrap();
        let loaded_sink = loaded.find_node_by_name("sink").unwrap();
        let loaded_progress = loaded
            .resolve_input(loaded_source, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        let progress: f32 = loaded.get_property(loaded_progress).unwrap();
        assert!((progress - 0.75).abs() < 1e-6);

        let loaded_sink_out = loaded
            .resolve_output(loaded_sink, &PropertyPath(vec![PathSegment::Struct("b".into())]))
            .unwrap();
        let value: f32 = loaded.get_property(loaded_sink_out).unwrap();
        assert!((value - 0.75).abs() < 1e-6, "saved link must be restored: got {value}");
    }

    #[test]
    fn dedup_collapses_byte_identical_data_arrays_and_remaps_channel_ids() {
        let mut engine = Engine::new();
        let ts_a = engine.create_data_array("ts_a", DataArrayContent::Float(vec![0.0, 1.0]));
        let ts_b = engine.create_data_array("ts_b", DataArrayContent::Float(vec![0.0, 1.0]));
        let kf = engine.create_data_array("kf", DataArrayContent::Float(vec![0.0, 1.0]));
        assert_ne!(ts_a, ts_b, "two distinct DataArrays with identical content");

        let channel = AnimationChannel {
            name: "v".to_string(),
            timestamps_id: ts_a,
            keyframes_id: kf,
            interpolation: Interpolation::Linear,
            tangents_in_id: None,
            tangents_out_id: None,
        };
        engine.create_animation_node("anim", vec![channel], false).unwrap();

        let (kept, id_map) = dedup_data_arrays(engine.data_arrays(), true).unwrap();
        assert_eq!(kept.len(), 2, "ts_a/ts_b collapse to one, kf stays distinct: {kept:?}");
        assert_eq!(id_map[&ts_a], id_map[&ts_b]);
    }

    #[test]
    fn load_rejects_a_file_from_a_newer_feature_level() {
        let engine = Engine::new();
        let mut file = build_scene_file(&engine, &SaveConfig::default()).unwrap();
        let bytes = Visitor::save_binary(&mut file, CURRENT_FEATURE_LEVEL + 1).unwrap();
        let err = load_from_bytes(&bytes, &LoadConfig { resolver: &NoopResolver }).unwrap_err();
        assert!(matches!(err, LogicError::BinaryVersionMismatch(_)));
    }

    #[test]
    fn node_binding_round_trips_through_a_resolver() {
        let mut engine = Engine::new();
        let external = Rc::new(RefCell::new(FakeSceneNode {
            translation: Vector3::new(1.0, 2.0, 3.0),
        }));
        let binding = engine.create_node_binding("node", external.clone());
        let translation = engine
            .resolve_input(binding, &PropertyPath(vec![PathSegment::Struct("translation".into())]))
            .unwrap();
        engine.set_property(translation, Vector3::new(4.0, 5.0, 6.0)).unwrap();
        engine.update().unwrap();

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let resolver = OneSceneNodeResolver(external.clone());
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &resolver }).unwrap();

        let loaded_binding = loaded.find_node_by_name("node").unwrap();
        let loaded_translation = loaded
            .resolve_input(loaded_binding, &PropertyPath(vec![PathSegment::Struct("translation".into())]))
            .unwrap();
        let value: Vector3<f32> = loaded.get_property(loaded_translation).unwrap();
        assert_eq!(value, Vector3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn appearance_binding_derives_its_uniform_set_from_the_saved_tree() {
        struct FakeAppearance {
            intensity: f32,
        }
        impl ExternalAppearance for FakeAppearance {
            fn uniform(&self, name: &str) -> crate::property::PropertyValue {
                assert_eq!(name, "intensity");
                crate::property::PropertyValue::Float(self.intensity)
            }
            fn set_uniform(&mut self, name: &str, value: crate::property::PropertyValue) -> LogicResult<()> {
                assert_eq!(name, "intensity");
                if let crate::property::PropertyValue::Float(v) = value {
                    self.intensity = v;
                }
                Ok(())
            }
        }
        struct OneAppearanceResolver(Rc<RefCell<FakeAppearance>>);
        impl Resolver for OneAppearanceResolver {
            fn resolve_scene_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalSceneNode>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_camera(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalCamera>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_appearance(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalAppearance>>> {
                Ok(self.0.clone())
            }
            fn resolve_render_pass(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderPass>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_render_buffer(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderBuffer>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_mesh_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalMeshNode>>> {
                Err(LogicError::resource("not used"))
            }
        }

        let mut engine = Engine::new();
        let external = Rc::new(RefCell::new(FakeAppearance { intensity: 1.0 }));
        let uniforms = vec![crate::bindings::UniformDescriptor {
            name: "intensity".to_string(),
            tag: PrimitiveType::Float,
        }];
        let binding = engine.create_appearance_binding("fx", external.clone(), uniforms);
        let intensity = engine
            .resolve_input(binding, &PropertyPath(vec![PathSegment::Struct("intensity".into())]))
            .unwrap();
        engine.set_property(intensity, 2.5f32).unwrap();
        engine.update().unwrap();

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let resolver = OneAppearanceResolver(external.clone());
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &resolver }).unwrap();
        assert_eq!(external.borrow().intensity, 2.5);

        let loaded_binding = loaded.find_node_by_name("fx").unwrap();
        let loaded_intensity = loaded
            .resolve_input(loaded_binding, &PropertyPath(vec![PathSegment::Struct("intensity".into())]))
            .unwrap();
        let value: f32 = loaded.get_property(loaded_intensity).unwrap();
        assert_eq!(value, 2.5);
    }

    #[test]
    fn loading_a_truncated_animation_channel_layout_fails_with_version_mismatch() {
        // Two channels at save time, but the loader is handed a record with
        // only the first channel - simulating a file hand-edited or produced
        // by a future writer that dropped a channel this build still expects.
        let mut engine = Engine::new();
        let a = linear_channel(&mut engine, "a");
        let b = linear_channel(&mut engine, "b");
        engine.create_animation_node("anim", vec![a, b], false).unwrap();

        let mut file = build_scene_file(&engine, &SaveConfig::default()).unwrap();
        let mut anim_record = file.animation_nodes.remove(0);
        anim_record.channels.truncate(1);
        file.animation_nodes.push(anim_record);
        let bytes = Visitor::save_binary(&mut file, CURRENT_FEATURE_LEVEL).unwrap();

        let err = load_from_bytes(&bytes, &LoadConfig { resolver: &NoopResolver }).unwrap_err();
        assert!(matches!(err, LogicError::BinaryVersionMismatch(_)));
    }

    #[test]
    fn timer_node_round_trips_its_ticker_value() {
        struct FixedClock;
        impl crate::bindings::Clock for FixedClock {
            fn now_micros(&self) -> i64 {
                0
            }
        }
        let mut engine = Engine::new();
        let timer = engine.create_timer_node_with_clock("timer", Box::new(FixedClock));
        let ticker = engine
            .resolve_input(timer, &PropertyPath(vec![PathSegment::Struct("ticker_us".into())]))
            .unwrap();
        engine.set_property(ticker, 4_200_000i64).unwrap();
        engine.update().unwrap();

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &NoopResolver }).unwrap();
        let loaded_timer = loaded.find_node_by_name("timer").unwrap();
        let loaded_ticker = loaded
            .resolve_input(loaded_timer, &PropertyPath(vec![PathSegment::Struct("ticker_us".into())]))
            .unwrap();
        let value: i64 = loaded.get_property(loaded_ticker).unwrap();
        assert_eq!(value, 4_200_000);
    }

    #[test]
    fn camera_binding_round_trips_its_frustum() {
        struct FakeCamera {
            frustum: CameraFrustum,
        }
        impl ExternalCamera for FakeCamera {
            fn viewport_origin(&self) -> Vector2<i32> {
                Vector2::zeros()
            }
            fn viewport_size(&self) -> Vector2<i32> {
                Vector2::new(1920, 1080)
            }
            fn set_viewport(&mut self, _origin: Vector2<i32>, _size: Vector2<i32>) {}
            fn frustum(&self) -> CameraFrustum {
                self.frustum
            }
            fn set_frustum(&mut self, frustum: CameraFrustum) {
                self.frustum = frustum;
            }
        }
        struct OneCameraResolver(Rc<RefCell<FakeCamera>>);
        impl Resolver for OneCameraResolver {
            fn resolve_scene_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalSceneNode>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_camera(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalCamera>>> {
                Ok(self.0.clone())
            }
            fn resolve_appearance(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalAppearance>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_render_pass(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderPass>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_render_buffer(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalRenderBuffer>>> {
                Err(LogicError::resource("not used"))
            }
            fn resolve_mesh_node(&self, _: &str, _: u64) -> LogicResult<Rc<RefCell<dyn ExternalMeshNode>>> {
                Err(LogicError::resource("not used"))
            }
        }

        let mut engine = Engine::new();
        let external = Rc::new(RefCell::new(FakeCamera {
            frustum: CameraFrustum {
                is_orthographic: false,
                left: -1.0,
                right: 1.0,
                top: 1.0,
                bottom: -1.0,
                near: 0.1,
                far: 100.0,
                vertical_size: 0.0,
            },
        }));
        let binding = engine.create_camera_binding("cam", external.clone());
        let far = engine.child_of(binding, engine.input_root(binding).unwrap(), "frustum").unwrap();
        let far = engine.child_of(binding, far, "far").unwrap();
        engine
            .set_property(crate::property::PropertyRef::new(binding, far), 500.0f32)
            .unwrap();
        engine.update().unwrap();
        assert_eq!(external.borrow().frustum.far, 500.0);

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let resolver = OneCameraResolver(external.clone());
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &resolver }).unwrap();
        let loaded_binding = loaded.find_node_by_name("cam").unwrap();
        let frustum_root = loaded
            .child_of(loaded_binding, loaded.input_root(loaded_binding).unwrap(), "frustum")
            .unwrap();
        let loaded_far = loaded.child_of(loaded_binding, frustum_root, "far").unwrap();
        let value: f32 = loaded
            .get_property(crate::property::PropertyRef::new(loaded_binding, loaded_far))
            .unwrap();
        assert_eq!(value, 500.0);
    }

    #[test]
    fn weak_links_round_trip_with_their_flag_intact() {
        let mut engine = Engine::new();
        let a_channel = linear_channel(&mut engine, "a");
        let a = engine.create_animation_node("a", vec![a_channel], false).unwrap();
        let b_channel = linear_channel(&mut engine, "b");
        let b = engine.create_animation_node("b", vec![b_channel], false).unwrap();

        let out_a = engine
            .resolve_output(a, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let progress_b = engine
            .resolve_input(b, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link_weak(out_a, progress_b).unwrap();

        let bytes = save_to_bytes(&engine, &SaveConfig::default()).unwrap();
        let loaded = load_from_bytes(&bytes, &LoadConfig { resolver: &NoopResolver }).unwrap();
        let loaded_a = loaded.find_node_by_name("a").unwrap();
        let loaded_b = loaded.find_node_by_name("b").unwrap();
        // Weak links never enter the dependency graph; a cycle through a
        // weak link back to its own source must still resolve.
        let out_b = loaded
            .resolve_output(loaded_b, &PropertyPath(vec![PathSegment::Struct("b".into())]))
            .unwrap();
        let progress_a = loaded
            .resolve_input(loaded_a, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        let mut loaded = loaded;
        loaded.link(out_b, progress_a).unwrap();
        assert!(loaded.update().is_ok());
    }

    #[test]
    fn ancillary_vector_types_implement_visit_as_expected() {
        // Smoke test that the nalgebra vector Visit impls this module leans
        // on for bindings round-trip, independent of the engine machinery.
        let mut v = Vector4::new(1.0f32, 2.0, 3.0, 4.0);
        let bytes = Visitor::save_binary(&mut v, 1).unwrap();
        let mut loaded = Vector4::new(0.0f32, 0.0, 0.0, 0.0);
        Visitor::load_binary(&bytes, &mut loaded).unwrap();
        assert_eq!(loaded, Vector4::new(1.0, 2.0, 3.0, 4.0));
    }
}
