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

//! [`Engine`] is the single entry point the host talks to: it owns every
//! `LogicNode` and `DataArray`, validates and applies links between them, and
//! drives the per-tick update. `LogicNodeDependencies` only knows about node
//! identities; the property-level bookkeeping a link/unlink/destroy touches
//! lives here because it needs simultaneous access to two nodes' property
//! arenas at once.

use crate::animation::{AnimationChannel, AnimationState};
use crate::bindings::{
    self, Clock, ExternalAppearance, ExternalCamera, ExternalMeshNode, ExternalRenderBuffer,
    ExternalRenderPass, ExternalSceneNode, SystemClock, UniformDescriptor,
};
use crate::data_array::{DataArray, DataArrayContent};
use crate::dependencies::LogicNodeDependencies;
use crate::error::{LogicError, LogicResult};
use crate::ids::{DataArrayId, NodeId};
use crate::node::{LogicNode, LogicNodeCommon, NodeKind, UpdateContext};
use crate::property::{
    child_by_name, get_value, root_of, set_value, PropertyImpl, PropertyPath, PropertyPrimitive,
    PropertyRef, PropertySemantics,
};
use fxhash::FxHashMap;
use scene_logic_core::log::Log;
use scene_logic_core::pool::{Handle, Pool};
use std::cell::RefCell;
use std::rc::Rc;

/// Owns the whole scene-logic graph for one scene. Nothing outside this type
/// ever sees a raw `Pool`/arena handle across a node boundary - the public
/// surface deals in [`NodeId`] and [`PropertyRef`].
#[derive(Default)]
pub struct Engine {
    nodes: FxHashMap<NodeId, LogicNode>,
    data_arrays: FxHashMap<DataArrayId, DataArray>,
    deps: LogicNodeDependencies,
    next_node_id: NodeId,
    next_data_array_id: DataArrayId,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            data_arrays: FxHashMap::default(),
            deps: LogicNodeDependencies::new(),
            next_node_id: 1,
            next_data_array_id: 1,
        }
    }

    fn alloc_node_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn insert_node(&mut self, node: LogicNode) -> NodeId {
        let id = node.id();
        self.deps.add_node(id);
        self.nodes.insert(id, node);
        id
    }

    /// Inserts a node that was rebuilt from a saved file, keeping its
    /// original id rather than allocating a new one, and advances the id
    /// counter past it so later `create_*` calls never collide with it.
    pub(crate) fn load_insert_node(&mut self, node: LogicNode) {
        let id = node.id();
        self.next_node_id = self.next_node_id.max(id + 1);
        self.insert_node(node);
    }

    /// Same idea as [`Self::load_insert_node`], for `DataArray`s.
    pub(crate) fn load_insert_data_array(&mut self, array: DataArray) {
        self.next_data_array_id = self.next_data_array_id.max(array.id + 1);
        self.data_arrays.insert(array.id, array);
    }

    // -----------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------

    pub fn create_data_array(
        &mut self,
        name: impl Into<String>,
        content: DataArrayContent,
    ) -> DataArrayId {
        let id = self.next_data_array_id;
        self.next_data_array_id += 1;
        self.data_arrays.insert(id, DataArray::new(id, name, content));
        id
    }

    pub fn create_animation_node(
        &mut self,
        name: impl Into<String>,
        channels: Vec<AnimationChannel>,
        expose_data_as_properties: bool,
    ) -> LogicResult<NodeId> {
        let name = name.into();
        let state = AnimationState::new(channels, expose_data_as_properties, &self.data_arrays, &name)?;
        let id = self.alloc_node_id();
        let mut properties = Pool::new();
        let inputs = crate::property::build_property_tree(
            &mut properties,
            &state.input_shape(),
            PropertySemantics::AnimationInput,
        );
        let outputs = crate::property::build_property_tree(
            &mut properties,
            &state.output_shape(),
            PropertySemantics::AnimationOutput,
        );
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: Some(outputs),
            kind: NodeKind::Animation(state),
        };
        Ok(self.insert_node(node))
    }

    pub fn create_node_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalSceneNode>>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_node_binding(&mut properties, external);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::NodeBinding(state),
        };
        self.insert_node(node)
    }

    pub fn create_camera_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalCamera>>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_camera_binding(&mut properties, external);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::CameraBinding(state),
        };
        self.insert_node(node)
    }

    pub fn create_appearance_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalAppearance>>,
        uniforms: Vec<UniformDescriptor>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_appearance_binding(&mut properties, external, uniforms);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::AppearanceBinding(state),
        };
        self.insert_node(node)
    }

    pub fn create_render_pass_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalRenderPass>>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_render_pass_binding(&mut properties, external);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::RenderPassBinding(state),
        };
        self.insert_node(node)
    }

    pub fn create_render_buffer_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalRenderBuffer>>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_render_buffer_binding(&mut properties, external);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::RenderBufferBinding(state),
        };
        self.insert_node(node)
    }

    pub fn create_mesh_node_binding(
        &mut self,
        name: impl Into<String>,
        external: Rc<RefCell<dyn ExternalMeshNode>>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, state) = bindings::build_mesh_node_binding(&mut properties, external);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: None,
            kind: NodeKind::MeshNodeBinding(state),
        };
        self.insert_node(node)
    }

    /// Creates a timer node backed by the real wall clock. Use
    /// [`Self::create_timer_node_with_clock`] in tests that need a
    /// deterministic time source.
    pub fn create_timer_node(&mut self, name: impl Into<String>) -> NodeId {
        self.create_timer_node_with_clock(name, Box::new(SystemClock))
    }

    pub fn create_timer_node_with_clock(
        &mut self,
        name: impl Into<String>,
        clock: Box<dyn Clock>,
    ) -> NodeId {
        let mut properties = Pool::new();
        let (inputs, outputs, state) = bindings::build_timer(&mut properties, clock);
        let id = self.alloc_node_id();
        let node = LogicNode {
            common: LogicNodeCommon::new(name, id),
            properties,
            inputs: Some(inputs),
            outputs: Some(outputs),
            kind: NodeKind::Timer(state),
        };
        self.insert_node(node)
    }

    // -----------------------------------------------------------------
    // Destruction
    // -----------------------------------------------------------------

    /// Removes a node and every link touching it. Per spec, destroying a
    /// node is not itself an error if other nodes still hold links to it -
    /// those links are simply torn down along with it.
    pub fn destroy(&mut self, id: NodeId) -> LogicResult<()> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| LogicError::illegal_argument(format!("no such LogicNode (id {id})")))?;

        let mut outgoing = Vec::new(); // (target, is_weak)
        let mut incoming = Vec::new(); // (this_leaf, source, is_weak)
        for &leaf in node.input_leaves().iter().chain(node.output_leaves().iter()) {
            let prop = node.properties.borrow(leaf);
            if let Some(link) = prop.incoming_link {
                incoming.push((leaf, link.other, link.is_weak));
            }
            for link in &prop.outgoing_links {
                outgoing.push((link.other, link.is_weak));
            }
        }

        for (target, weak) in &outgoing {
            if let Some(target_node) = self.nodes.get_mut(&target.node) {
                target_node.properties.borrow_mut(target.handle).incoming_link = None;
            }
            if !weak {
                self.deps.remove_edge(id, target.node);
            }
        }
        for (this_leaf, source, weak) in &incoming {
            if let Some(source_node) = self.nodes.get_mut(&source.node) {
                let prop = source_node.properties.borrow_mut(source.handle);
                prop.outgoing_links
                    .retain(|l| l.other != PropertyRef::new(id, *this_leaf));
            }
            if !weak {
                self.deps.remove_edge(source.node, id);
            }
        }

        self.deps.remove_node(id);
        self.nodes.remove(&id);
        Ok(())
    }

    // -----------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------

    pub fn link(&mut self, out: PropertyRef, input: PropertyRef) -> LogicResult<()> {
        self.link_impl(out, input, false)
    }

    pub fn link_weak(&mut self, out: PropertyRef, input: PropertyRef) -> LogicResult<()> {
        self.link_impl(out, input, true)
    }

    fn link_impl(&mut self, out: PropertyRef, input: PropertyRef, weak: bool) -> LogicResult<()> {
        if !self.nodes.contains_key(&out.node) || !self.nodes.contains_key(&input.node) {
            return Err(LogicError::illegal_argument("LogicNode not in this engine"));
        }
        if out.node == input.node {
            return Err(LogicError::illegal_argument(
                "cannot link two properties of the same node",
            ));
        }

        {
            let out_node = self.nodes.get(&out.node).unwrap();
            let input_node = self.nodes.get(&input.node).unwrap();
            let out_prop = out_node.properties.borrow(out.handle);
            let input_prop = input_node.properties.borrow(input.handle);

            let out_is_output = out_node.outputs == Some(root_of(&out_node.properties, out.handle));
            if !out_is_output {
                return Err(LogicError::illegal_argument(format!(
                    "'{}' is not an output property",
                    out_prop.type_data.name
                )));
            }
            let input_is_input = input_node.inputs == Some(root_of(&input_node.properties, input.handle));
            if !input_is_input {
                return Err(LogicError::illegal_argument(format!(
                    "'{}' is not an input property",
                    input_prop.type_data.name
                )));
            }

            if out_prop.type_data.type_tag != input_prop.type_data.type_tag {
                return Err(LogicError::illegal_argument(format!(
                    "cannot link '{:?}' to '{:?}'",
                    out_prop.type_data.type_tag, input_prop.type_data.type_tag
                )));
            }
            if !out_prop.is_leaf() || !input_prop.is_leaf() {
                return Err(LogicError::illegal_argument(
                    "Can't link properties of complex types directly",
                ));
            }
            if let Some(existing) = input_prop.incoming_link {
                return Err(LogicError::illegal_argument(format!(
                    "'{}' is already linked from node {}",
                    input_prop.type_data.name, existing.other.node
                )));
            }
        }

        self.with_two_nodes_mut(out.node, input.node, |out_node, input_node| {
            out_node.properties.borrow_mut(out.handle).outgoing_links.push(crate::property::Link {
                other: input,
                is_weak: weak,
            });
            input_node.properties.borrow_mut(input.handle).incoming_link =
                Some(crate::property::Link { other: out, is_weak: weak });
            out_node.set_dirty(true);
            input_node.set_dirty(true);
        });

        if !weak {
            self.deps.add_edge(out.node, input.node);
        }
        Ok(())
    }

    pub fn unlink(&mut self, out: PropertyRef, input: PropertyRef) -> LogicResult<()> {
        let is_weak = {
            let input_node = self
                .nodes
                .get(&input.node)
                .ok_or_else(|| LogicError::illegal_argument("LogicNode not in this engine"))?;
            let prop = input_node.properties.borrow(input.handle);
            if !prop.is_leaf() {
                return Err(LogicError::illegal_argument(
                    "Can't unlink properties of complex types directly",
                ));
            }
            let link = prop
                .incoming_link
                .ok_or_else(|| LogicError::illegal_argument(format!("'{}' is not linked", prop.type_data.name)))?;
            if link.other != out {
                return Err(LogicError::illegal_argument(format!(
                    "'{}' is currently linked from node {}, not {}",
                    prop.type_data.name, link.other.node, out.node
                )));
            }
            link.is_weak
        };

        if out.node == input.node {
            let node = self.nodes.get_mut(&input.node).unwrap();
            node.properties.borrow_mut(input.handle).incoming_link = None;
            node.properties
                .borrow_mut(out.handle)
                .outgoing_links
                .retain(|l| l.other != input);
        } else {
            self.with_two_nodes_mut(out.node, input.node, |out_node, input_node| {
                input_node.properties.borrow_mut(input.handle).incoming_link = None;
                out_node
                    .properties
                    .borrow_mut(out.handle)
                    .outgoing_links
                    .retain(|l| l.other != input);
            });
        }

        if !is_weak {
            self.deps.remove_edge(out.node, input.node);
        }
        Ok(())
    }

    /// Adds a scheduling-only dependency from `binding` to `node`, with no
    /// corresponding property link. Some bindings need to run after a node
    /// they don't read a value from - e.g. a `RenderPassBinding` that must be
    /// updated only once the `MeshNodeBinding`s feeding its render pass have
    /// settled. Idempotent: adding the same edge twice is not an error.
    pub fn add_binding_dependency(&mut self, binding: NodeId, node: NodeId) -> LogicResult<()> {
        if !self.nodes.contains_key(&binding) || !self.nodes.contains_key(&node) {
            return Err(LogicError::illegal_argument("LogicNode not in this engine"));
        }
        self.deps.add_edge(binding, node);
        Ok(())
    }

    /// Removes a dependency added by [`Self::add_binding_dependency`].
    /// Removing one that isn't present is not an error.
    pub fn remove_binding_dependency(&mut self, binding: NodeId, node: NodeId) -> LogicResult<()> {
        if !self.nodes.contains_key(&binding) || !self.nodes.contains_key(&node) {
            return Err(LogicError::illegal_argument("LogicNode not in this engine"));
        }
        self.deps.remove_edge(binding, node);
        Ok(())
    }

    /// Mutably borrows two distinct nodes at once by temporarily removing
    /// both from the map - `FxHashMap` has no safe "two distinct mutable
    /// borrows" accessor, and `a != b` is guaranteed by every caller.
    fn with_two_nodes_mut(&mut self, a: NodeId, b: NodeId, f: impl FnOnce(&mut LogicNode, &mut LogicNode)) {
        debug_assert_ne!(a, b, "with_two_nodes_mut requires distinct nodes");
        let mut node_a = self.nodes.remove(&a).expect("node must exist");
        let mut node_b = self.nodes.remove(&b).expect("node must exist");
        f(&mut node_a, &mut node_b);
        self.nodes.insert(a, node_a);
        self.nodes.insert(b, node_b);
    }

    // -----------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------

    /// Runs one tick: topologically sorts the node graph, then for each node
    /// in order, propagates linked inputs, runs `update()` if dirty, and
    /// clears the dirty flag. Stops at (and returns) the first runtime error;
    /// nodes later in the order are skipped for this tick.
    pub fn update(&mut self) -> LogicResult<()> {
        let order = self.deps.get_topologically_sorted_nodes()?.to_vec();

        for node_id in order {
            if !self.nodes.contains_key(&node_id) {
                continue;
            }

            // 2a. A fresh BindingInput write (or an always-dirty Timer) forces
            // the node dirty even before any link has propagated a value.
            let force_dirty = {
                let node = self.nodes.get(&node_id).unwrap();
                node.kind.is_always_dirty()
                    || (node.kind.is_binding()
                        && node
                            .input_leaves()
                            .iter()
                            .any(|&h| node.properties.borrow(h).binding_input_has_new_value))
            };
            if force_dirty {
                self.nodes.get_mut(&node_id).unwrap().set_dirty(true);
            }

            // 2b. Copy every linked input's current value from its source.
            let input_leaves = self.nodes.get(&node_id).unwrap().input_leaves();
            for leaf in input_leaves {
                let incoming = self.nodes.get(&node_id).unwrap().properties.borrow(leaf).incoming_link;
                let Some(link) = incoming else { continue };
                let source_value = self
                    .nodes
                    .get(&link.other.node)
                    .map(|n| n.properties.borrow(link.other.handle).value.clone())
                    .ok_or_else(|| LogicError::runtime("link source node no longer exists"))?;

                let node = self.nodes.get_mut(&node_id).unwrap();
                let changed = {
                    let prop = node.properties.borrow_mut(leaf);
                    if prop.value == source_value {
                        false
                    } else {
                        prop.value = source_value;
                        if prop.semantics == PropertySemantics::BindingInput {
                            prop.binding_input_has_new_value = true;
                        }
                        true
                    }
                };
                if changed {
                    node.set_dirty(true);
                }
            }

            // 2c. Run update() if dirty; stop the tick on the first error.
            if self.nodes.get(&node_id).unwrap().is_dirty() {
                let ctx = UpdateContext {
                    data_arrays: &self.data_arrays,
                };
                let node = self.nodes.get_mut(&node_id).unwrap();
                let name = node.common.name.clone();
                if let Err(e) = node.update(&ctx) {
                    Log::err(format!("node '{name}' (id {node_id}) failed to update: {e}"));
                    return Err(e);
                }
            }

            // 2d. Clear the dirty flag.
            self.nodes.get_mut(&node_id).unwrap().set_dirty(false);
        }

        Ok(())
    }

    // -----------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> Option<&LogicNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &LogicNode)> {
        self.nodes.iter()
    }

    pub fn data_arrays(&self) -> &FxHashMap<DataArrayId, DataArray> {
        &self.data_arrays
    }

    pub fn data_array(&self, id: DataArrayId) -> Option<&DataArray> {
        self.data_arrays.get(&id)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.common.name == name)
            .map(|(&id, _)| id)
    }

    pub fn find_data_array_by_name(&self, name: &str) -> Option<DataArrayId> {
        self.data_arrays
            .iter()
            .find(|(_, array)| array.name == name)
            .map(|(&id, _)| id)
    }

    pub fn set_user_id(&mut self, id: NodeId, user_id: (u64, u64)) -> LogicResult<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| LogicError::illegal_argument(format!("no such LogicNode (id {id})")))?;
        node.common.user_id = user_id;
        Ok(())
    }

    pub fn input_root(&self, id: NodeId) -> Option<Handle<PropertyImpl>> {
        self.nodes.get(&id).and_then(|n| n.inputs)
    }

    pub fn output_root(&self, id: NodeId) -> Option<Handle<PropertyImpl>> {
        self.nodes.get(&id).and_then(|n| n.outputs)
    }

    pub fn child_of(&self, id: NodeId, parent: Handle<PropertyImpl>, name: &str) -> Option<Handle<PropertyImpl>> {
        let node = self.nodes.get(&id)?;
        child_by_name(&node.properties, parent, name)
    }

    pub fn resolve_input(&self, id: NodeId, path: &PropertyPath) -> Option<PropertyRef> {
        let node = self.nodes.get(&id)?;
        crate::property::resolve_path(&node.properties, node.inputs?, path).map(|h| PropertyRef::new(id, h))
    }

    pub fn resolve_output(&self, id: NodeId, path: &PropertyPath) -> Option<PropertyRef> {
        let node = self.nodes.get(&id)?;
        crate::property::resolve_path(&node.properties, node.outputs?, path).map(|h| PropertyRef::new(id, h))
    }

    pub fn get_property<T: PropertyPrimitive>(&self, prop: PropertyRef) -> LogicResult<T> {
        let node = self
            .nodes
            .get(&prop.node)
            .ok_or_else(|| LogicError::illegal_argument("LogicNode not in this engine"))?;
        get_value(&node.properties, prop.handle)
    }

    /// Writes a leaf property from outside the engine (the host driving a
    /// `ScriptInput`/`BindingInput`, typically). Marks the owning node dirty
    /// when the value actually changed, same as a linked-input propagation.
    pub fn set_property<T: PropertyPrimitive>(&mut self, prop: PropertyRef, value: T) -> LogicResult<()> {
        let node = self
            .nodes
            .get_mut(&prop.node)
            .ok_or_else(|| LogicError::illegal_argument("LogicNode not in this engine"))?;
        let before = node.properties.borrow(prop.handle).value.clone();
        set_value(&mut node.properties, prop.handle, value)?;
        let after = node.properties.borrow(prop.handle).value.clone();
        if before != after {
            node.set_dirty(true);
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------

    /// Serializes the whole graph - nodes, `DataArray`s, and links - to a
    /// byte buffer, then writes it to `path`.
    pub fn save_to_file(
        &self,
        path: impl AsRef<std::path::Path>,
        config: &crate::serialization::SaveConfig,
    ) -> LogicResult<()> {
        crate::serialization::save_to_file(self, path, config)
    }

    /// Replaces this engine's entire graph with the one stored at `path`,
    /// re-resolving every binding's external object through
    /// `config.resolver`. Leaves `self` untouched if loading fails.
    pub fn load_from_file(
        &mut self,
        path: impl AsRef<std::path::Path>,
        config: &crate::serialization::LoadConfig,
    ) -> LogicResult<()> {
        *self = crate::serialization::load_from_file(path, config)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::animation::Interpolation;
    use crate::property::PathSegment;
    use nalgebra::Vector3;

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
    fn link_requires_both_nodes_to_belong_to_this_engine() {
        let mut engine = Engine::new();
        let channel = linear_channel(&mut engine, "value");
        let anim = engine.create_animation_node("anim", vec![channel], false).unwrap();
        let bogus = PropertyRef::new(9999, Handle::NONE);
        let out = engine
            .resolve_output(anim, &PropertyPath(vec![PathSegment::Struct("value".into())]))
            .unwrap();
        assert!(engine.link(out, bogus).is_err());
    }

    #[test]
    fn link_rejects_same_node() {
        let mut engine = Engine::new();
        let channel = linear_channel(&mut engine, "value");
        let anim = engine.create_animation_node("anim", vec![channel], false).unwrap();
        let out = engine
            .resolve_output(anim, &PropertyPath(vec![PathSegment::Struct("value".into())]))
            .unwrap();
        let input = engine
            .resolve_input(anim, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        assert!(engine.link(out, input).is_err());
    }

    #[test]
    fn link_rejects_mismatched_primitive_type() {
        let mut engine = Engine::new();
        let channel = linear_channel(&mut engine, "value");
        let anim = engine.create_animation_node("anim", vec![channel], false).unwrap();
        let out = engine
            .resolve_output(anim, &PropertyPath(vec![PathSegment::Struct("value".into())]))
            .unwrap();

        struct NoopNode;
        impl ExternalSceneNode for NoopNode {
            fn translation(&self) -> Vector3<f32> {
                Vector3::zeros()
            }
            fn set_translation(&mut self, _value: Vector3<f32>) {}
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
        let node_binding =
            engine.create_node_binding("node", Rc::new(RefCell::new(NoopNode)));
        // `value` (a Float output) can't link into `visibility` (an Int32
        // input) on the same binding - it is not a leaf-to-leaf match.
        let visibility = engine
            .resolve_input(node_binding, &PropertyPath(vec![PathSegment::Struct("visibility".into())]))
            .unwrap();
        assert!(engine.link(out, visibility).is_err());
    }

    #[test]
    fn link_rejects_second_incoming_link_on_same_input() {
        let mut engine = Engine::new();
        let channel_a = linear_channel(&mut engine, "a");
        let channel_b = linear_channel(&mut engine, "b");
        let channel_c = linear_channel(&mut engine, "c");
        let anim_a = engine.create_animation_node("anim_a", vec![channel_a], false).unwrap();
        let anim_b = engine.create_animation_node("anim_b", vec![channel_b], false).unwrap();
        let anim_c = engine.create_animation_node("anim_c", vec![channel_c], false).unwrap();

        let out_a = engine
            .resolve_output(anim_a, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let out_b = engine
            .resolve_output(anim_b, &PropertyPath(vec![PathSegment::Struct("b".into())]))
            .unwrap();
        let progress_c = engine
            .resolve_input(anim_c, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();

        engine.link(out_a, progress_c).unwrap();
        assert!(engine.link(out_b, progress_c).is_err());
    }

    #[test]
    fn linking_reorders_the_topological_sort() {
        let mut engine = Engine::new();
        let channel_a = linear_channel(&mut engine, "a");
        let anim_a = engine.create_animation_node("anim_a", vec![channel_a], false).unwrap();
        let channel_b = linear_channel(&mut engine, "b");
        let anim_b = engine.create_animation_node("anim_b", vec![channel_b], false).unwrap();

        let out_a = engine
            .resolve_output(anim_a, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let progress_b = engine
            .resolve_input(anim_b, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link(out_a, progress_b).unwrap();
        engine.update().unwrap();

        let out_b = engine
            .resolve_output(anim_b, &PropertyPath(vec![PathSegment::Struct("b".into())]))
            .unwrap();
        let progress_a = engine
            .resolve_input(anim_a, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.unlink(out_a, progress_b).unwrap();
        engine.link(out_b, progress_a).unwrap();
        // Must not report a cycle: anim_a no longer feeds anim_b.
        assert!(engine.update().is_ok());
    }

    #[test]
    fn update_propagates_linked_value_and_marks_target_dirty() {
        let mut engine = Engine::new();
        let channel_a = linear_channel(&mut engine, "a");
        let channel_b = linear_channel(&mut engine, "b");
        let source = engine.create_animation_node("source", vec![channel_a], false).unwrap();
        let sink = engine.create_animation_node("sink", vec![channel_b], false).unwrap();

        let source_progress = engine
            .resolve_input(source, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.set_property(source_progress, 0.5f32).unwrap();

        let out_a = engine
            .resolve_output(source, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let sink_progress = engine
            .resolve_input(sink, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link(out_a, sink_progress).unwrap();
        engine.update().unwrap();

        let sink_out = engine
            .resolve_output(sink, &PropertyPath(vec![PathSegment::Struct("b".into())]))
            .unwrap();
        let value: f32 = engine.get_property(sink_out).unwrap();
        assert!((value - 0.25).abs() < 1e-5, "got {value}");
    }

    #[test]
    fn destroy_clears_links_on_both_ends() {
        let mut engine = Engine::new();
        let channel_a = linear_channel(&mut engine, "a");
        let channel_b = linear_channel(&mut engine, "b");
        let source = engine.create_animation_node("source", vec![channel_a], false).unwrap();
        let sink = engine.create_animation_node("sink", vec![channel_b], false).unwrap();
        let out_a = engine
            .resolve_output(source, &PropertyPath(vec![PathSegment::Struct("a".into())]))
            .unwrap();
        let sink_progress = engine
            .resolve_input(sink, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link(out_a, sink_progress).unwrap();

        engine.destroy(source).unwrap();
        assert!(engine.node(source).is_none());
        let sink_node = engine.node(sink).unwrap();
        let progress_handle = sink_node.inputs.unwrap();
        let progress_handle = child_by_name(&sink_node.properties, progress_handle, "progress").unwrap();
        assert!(sink_node.properties.borrow(progress_handle).incoming_link.is_none());
    }

    #[test]
    fn timer_always_runs_even_without_input_change() {
        struct FixedClock(i64);
        impl Clock for FixedClock {
            fn now_micros(&self) -> i64 {
                self.0
            }
        }
        let mut engine = Engine::new();
        let timer = engine.create_timer_node_with_clock("timer", Box::new(FixedClock(123)));
        engine.update().unwrap();
        let value = engine
            .resolve_output(timer, &PropertyPath(vec![PathSegment::Struct("value".into())]))
            .unwrap();
        let v: i64 = engine.get_property(value).unwrap();
        assert_eq!(v, 123);

        // Second tick, nothing wrote any input - the timer must still fire
        // because it is always dirty.
        engine.update().unwrap();
        let v: i64 = engine.get_property(value).unwrap();
        assert_eq!(v, 123);
    }

    #[test]
    fn cycle_through_strong_links_is_reported_as_update_failure() {
        let mut engine = Engine::new();
        let channel_a = linear_channel(&mut engine, "out");
        let channel_b = linear_channel(&mut engine, "out");
        let a = engine.create_animation_node("a", vec![channel_a], false).unwrap();
        let b = engine.create_animation_node("b", vec![channel_b], false).unwrap();
        let out_a = engine
            .resolve_output(a, &PropertyPath(vec![PathSegment::Struct("out".into())]))
            .unwrap();
        let progress_b = engine
            .resolve_input(b, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        let out_b = engine
            .resolve_output(b, &PropertyPath(vec![PathSegment::Struct("out".into())]))
            .unwrap();
        let progress_a = engine
            .resolve_input(a, &PropertyPath(vec![PathSegment::Struct("progress".into())]))
            .unwrap();
        engine.link(out_a, progress_b).unwrap();
        engine.link(out_b, progress_a).unwrap();
        assert!(engine.update().is_err());
    }

    #[test]
    fn binding_dependency_orders_a_binding_after_a_node_with_no_property_link() {
        let mut engine = Engine::new();
        let channel = linear_channel(&mut engine, "out");
        let anim = engine.create_animation_node("anim", vec![channel], false).unwrap();

        struct NoopNode;
        impl ExternalSceneNode for NoopNode {
            fn translation(&self) -> Vector3<f32> {
                Vector3::zeros()
            }
            fn set_translation(&mut self, _value: Vector3<f32>) {}
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
        let binding = engine.create_node_binding("binding", Rc::new(RefCell::new(NoopNode)));

        engine.add_binding_dependency(binding, anim).unwrap();
        let order = engine.deps.get_topologically_sorted_nodes().unwrap().to_vec();
        let anim_pos = order.iter().position(|&id| id == anim).unwrap();
        let binding_pos = order.iter().position(|&id| id == binding).unwrap();
        assert!(anim_pos < binding_pos);

        engine.remove_binding_dependency(binding, anim).unwrap();
        assert!(!engine.deps.has_edge(binding, anim));
    }

    #[test]
    fn binding_dependency_rejects_unknown_node() {
        let mut engine = Engine::new();
        let channel = linear_channel(&mut engine, "out");
        let anim = engine.create_animation_node("anim", vec![channel], false).unwrap();
        assert!(engine.add_binding_dependency(anim, 9999).is_err());
    }
}
