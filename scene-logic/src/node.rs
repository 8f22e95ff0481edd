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

//! `LogicNode` is the unit of computation in the engine. The source this is
//! modeled on reaches for virtual dispatch over a `LogicNode` base class;
//! here a plain sum type ([`NodeKind`]) stands in for the polymorphism, with
//! [`LogicNode::update`] matching on it.

use crate::animation::AnimationState;
use crate::bindings::{
    AppearanceBindingState, CameraBindingState, MeshNodeBindingState, NodeBindingState,
    RenderBufferBindingState, RenderPassBindingState, TimerState,
};
use crate::data_array::DataArray;
use crate::error::LogicResult;
use crate::ids::{DataArrayId, NodeId};
use crate::property::{collect_leaf_children, PropertyImpl};
use fxhash::FxHashMap;
use scene_logic_core::pool::{Handle, Pool};

/// Everything `update()` needs to read that isn't owned by the node itself.
pub struct UpdateContext<'a> {
    pub data_arrays: &'a FxHashMap<DataArrayId, DataArray>,
}

/// Fields shared by every node kind, mirroring the source's `LogicNode` base
/// class.
#[derive(Clone, Debug)]
pub struct LogicNodeCommon {
    pub name: String,
    pub id: NodeId,
    pub user_id: (u64, u64),
    pub dirty: bool,
}

impl LogicNodeCommon {
    pub fn new(name: impl Into<String>, id: NodeId) -> Self {
        Self {
            name: name.into(),
            id,
            user_id: (0, 0),
            // Every node must execute at least once after creation.
            dirty: true,
        }
    }
}

/// Stands in for the source's virtual-inheritance node hierarchy.
pub enum NodeKind {
    Animation(AnimationState),
    NodeBinding(NodeBindingState),
    CameraBinding(CameraBindingState),
    AppearanceBinding(AppearanceBindingState),
    RenderPassBinding(RenderPassBindingState),
    RenderBufferBinding(RenderBufferBindingState),
    MeshNodeBinding(MeshNodeBindingState),
    Timer(TimerState),
}

impl NodeKind {
    /// True for every binding kind (mirrors an external scene object). The
    /// engine's scheduler treats bindings specially in step 2a of the update
    /// loop: a fresh `BindingInput` write forces the node dirty even before
    /// any link has propagated a value. `Timer` has no external object and is
    /// not a binding in this sense, despite appearing in the bindings table.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            NodeKind::NodeBinding(_)
                | NodeKind::CameraBinding(_)
                | NodeKind::AppearanceBinding(_)
                | NodeKind::RenderPassBinding(_)
                | NodeKind::RenderBufferBinding(_)
                | NodeKind::MeshNodeBinding(_)
        )
    }

    /// True only for `Timer`. A timer samples a monotonic clock that moves on
    /// its own, independent of any input write, so the scheduler must run it
    /// every tick regardless of its dirty flag - unlike every other node
    /// kind, which only runs when dirtied by a write or an incoming link.
    pub fn is_always_dirty(&self) -> bool {
        matches!(self, NodeKind::Timer(_))
    }
}

pub struct LogicNode {
    pub common: LogicNodeCommon,
    pub properties: Pool<PropertyImpl>,
    pub inputs: Option<Handle<PropertyImpl>>,
    pub outputs: Option<Handle<PropertyImpl>>,
    pub kind: NodeKind,
}

impl LogicNode {
    pub fn id(&self) -> NodeId {
        self.common.id
    }

    pub fn is_dirty(&self) -> bool {
        self.common.dirty
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.common.dirty = dirty;
    }

    pub fn input_leaves(&self) -> Vec<Handle<PropertyImpl>> {
        match self.inputs {
            Some(root) => collect_leaf_children(&self.properties, root),
            None => Vec::new(),
        }
    }

    pub fn output_leaves(&self) -> Vec<Handle<PropertyImpl>> {
        match self.outputs {
            Some(root) => collect_leaf_children(&self.properties, root),
            None => Vec::new(),
        }
    }

    /// True iff any primitive descendant of the input or output tree is
    /// linked (incoming or outgoing).
    pub fn is_linked(&self) -> bool {
        self.input_leaves()
            .into_iter()
            .chain(self.output_leaves())
            .any(|h| {
                let p = self.properties.borrow(h);
                p.incoming_link.is_some() || !p.outgoing_links.is_empty()
            })
    }

    /// Dispatches to the concrete node kind's update logic. Consumes current
    /// inputs, produces outputs; must be deterministic for the same inputs.
    pub fn update(&mut self, ctx: &UpdateContext) -> LogicResult<()> {
        match &mut self.kind {
            NodeKind::Animation(state) => crate::animation::update(
                state,
                &mut self.properties,
                self.inputs.expect("animation node always has inputs"),
                self.outputs.expect("animation node always has outputs"),
                ctx.data_arrays,
            ),
            NodeKind::NodeBinding(state) => crate::bindings::update_node_binding(
                state,
                &mut self.properties,
                self.inputs.expect("binding always has inputs"),
                &self.common.name,
            ),
            NodeKind::CameraBinding(state) => crate::bindings::update_camera_binding(
                state,
                &mut self.properties,
                self.inputs.expect("binding always has inputs"),
                &self.common.name,
            ),
            NodeKind::AppearanceBinding(state) => crate::bindings::update_appearance_binding(
                state,
                &mut self.properties,
                self.inputs.expect("binding always has inputs"),
                &self.common.name,
            ),
            NodeKind::RenderPassBinding(state) => crate::bindings::update_render_pass_binding(
                state,
                &mut self.properties,
                self.inputs.expect("binding always has inputs"),
                &self.common.name,
            ),
            NodeKind::RenderBufferBinding(state) => {
                crate::bindings::update_render_buffer_binding(
                    state,
                    &mut self.properties,
                    self.inputs.expect("binding always has inputs"),
                    &self.common.name,
                )
            }
            NodeKind::MeshNodeBinding(state) => crate::bindings::update_mesh_node_binding(
                state,
                &mut self.properties,
                self.inputs.expect("binding always has inputs"),
                &self.common.name,
            ),
            NodeKind::Timer(state) => crate::bindings::update_timer(
                state,
                &mut self.properties,
                self.inputs.expect("timer always has inputs"),
                self.outputs.expect("timer always has outputs"),
            ),
        }
    }
}
